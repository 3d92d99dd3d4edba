//! Shared `/proc` enumeration helpers used by both discovery strategies.

use std::fs;
use std::path::PathBuf;

/// Lists every numeric `/proc/<pid>` entry currently visible.
///
/// Races with process exit are inherent here: a PID returned by this scan
/// may vanish before the caller inspects it further, so callers treat a
/// missing `/proc/<pid>/...` file as "skip this PID", not as an error.
pub fn list_pids() -> std::io::Result<Vec<i32>> {
    let mut pids = Vec::new();
    for entry in fs::read_dir("/proc")? {
        let entry = entry?;
        if let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse().ok()) {
            pids.push(pid);
        }
    }
    Ok(pids)
}

/// Reads the kernel-truncated command name for `pid` (`/proc/<pid>/comm`),
/// trimmed of its trailing newline. Returns `None` if the process is gone
/// or unreadable rather than erroring, so scans degrade gracefully.
pub fn read_comm(pid: i32) -> Option<String> {
    let raw = fs::read_to_string(format!("/proc/{pid}/comm")).ok()?;
    Some(raw.trim_end_matches('\n').to_owned())
}

/// Lists `(fd_number, symlink_target)` pairs for every open file
/// descriptor of `pid`. Returns an empty vec (not an error) when the
/// directory can't be read, e.g. the process exited mid-scan or we lack
/// permission to inspect another user's process.
pub fn list_fd_targets(pid: i32) -> Vec<(i32, String)> {
    let dir = PathBuf::from(format!("/proc/{pid}/fd"));
    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let fd: i32 = entry.file_name().to_str()?.parse().ok()?;
            let target = fs::read_link(entry.path()).ok()?;
            Some((fd, target.to_string_lossy().into_owned()))
        })
        .collect()
}

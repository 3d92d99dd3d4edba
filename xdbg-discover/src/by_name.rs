//! Discovery by exact process-name match (§4.8 "By name").

use crate::error::DiscoverError;
use crate::proc_table;

/// Finds the single process whose compact command name exactly matches
/// `name`. Errors if zero or more than one process matches.
pub fn find_by_name(name: &str) -> Result<i32, DiscoverError> {
    let pids = proc_table::list_pids()?;
    let matches: Vec<i32> = pids
        .into_iter()
        .filter(|&pid| proc_table::read_comm(pid).as_deref() == Some(name))
        .collect();

    match matches.len() {
        0 => Err(DiscoverError::NotFound(name.to_owned())),
        1 => Ok(matches[0]),
        _ => Err(DiscoverError::Ambiguous {
            query: name.to_owned(),
            pids: matches,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_name_resolves_to_at_least_one_pid() {
        let Some(name) = crate::proc_table::read_comm(std::process::id() as i32) else {
            return; // not on a /proc-backed platform in this sandbox
        };
        // We can't assert uniqueness (the test binary name may repeat
        // across parallel test processes), only that lookup doesn't error
        // out as NotFound for a name we know is running right now.
        let result = find_by_name(&name);
        assert!(!matches!(result, Err(DiscoverError::NotFound(_))));
    }

    #[test]
    fn unknown_name_is_not_found() {
        let result = find_by_name("xdbg-definitely-not-a-real-process-name");
        assert!(matches!(result, Err(DiscoverError::NotFound(_))));
    }
}

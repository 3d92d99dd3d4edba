//! Control CLI for the embedded debug service (§6).
//!
//! `toggle` talks to the target process directly via a signal; every
//! other subcommand dials its Unix socket and issues one registered
//! command per invocation (or, for `interactive`, one per line).

mod error;
mod repl;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use error::CliError;

#[derive(Parser, Debug)]
#[command(name = "xdbgctl", version, about = "Control CLI for the xdbg runtime debug service")]
struct Cli {
    /// Path to the debug server's control socket.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Dial and per-request timeout.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
    timeout: Duration,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send SIGUSR1 to toggle the debug listener on or off.
    Toggle {
        /// Target process by PID; wins over `--name` and default discovery.
        #[arg(long, conflicts_with = "name")]
        pid: Option<i32>,
        /// Target process by its compact command name.
        #[arg(long)]
        name: Option<String>,
    },

    /// Ask the server to disarm its listener (`exec exit`).
    Disable,

    /// Run an arbitrary registered command.
    Exec {
        /// Registered command name.
        cmd: String,
        /// Positional arguments for the command.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Report whether the server is reachable.
    Status,

    /// Read-eval-print loop issuing one command per line.
    #[command(visible_alias = "i", alias = "repl")]
    Interactive,

    /// Shortcut for `exec setlog`.
    Setlog {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Shortcut for `exec stack`.
    Stack {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Shortcut for `exec freemem`.
    Freemem {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Shortcut for `exec pprof`.
    Pprof {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Shortcut for `exec breaker`.
    Breaker {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Shortcut for `exec limit`.
    Limit {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Shortcut for `exec cache`.
    Cache {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Shortcut for `exec config`.
    Config {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .without_time()
        .try_init()
        .ok();

    let cli = Cli::parse();

    let exit_code = tokio::select! {
        result = dispatch(cli) => match result {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("xdbgctl: {err}");
                err.exit_code()
            }
        },
        () = wait_for_second_sigint() => 130,
    };
    std::process::exit(exit_code);
}

/// Resolves after a second `SIGINT`. The first press only warns — the
/// in-flight request or REPL keeps running until it finishes on its own
/// or the operator presses `Ctrl+C` again to force an exit.
async fn wait_for_second_sigint() {
    let Ok(()) = tokio::signal::ctrl_c().await else {
        return;
    };
    eprintln!("xdbgctl: interrupted, press Ctrl+C again to force exit");
    tokio::signal::ctrl_c().await.ok();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let socket = cli.socket.unwrap_or_else(xdbg::default_socket_path);
    let timeout = cli.timeout;

    match cli.command {
        Command::Toggle { pid, name } => toggle(&socket, pid, name),
        Command::Disable => exec_command(&socket, timeout, "exit", Vec::new()).await,
        Command::Exec { cmd, args } => exec_command(&socket, timeout, &cmd, args).await,
        Command::Status => status(&socket, timeout).await,
        Command::Interactive => interactive(&socket, timeout).await,
        Command::Setlog { args } => exec_command(&socket, timeout, "setlog", args).await,
        Command::Stack { args } => exec_command(&socket, timeout, "stack", args).await,
        Command::Freemem { args } => exec_command(&socket, timeout, "freemem", args).await,
        Command::Pprof { args } => exec_command(&socket, timeout, "pprof", args).await,
        Command::Breaker { args } => exec_command(&socket, timeout, "breaker", args).await,
        Command::Limit { args } => exec_command(&socket, timeout, "limit", args).await,
        Command::Cache { args } => exec_command(&socket, timeout, "cache", args).await,
        Command::Config { args } => exec_command(&socket, timeout, "config", args).await,
    }
}

/// Dials `socket`, rejecting sockets not owned by the caller or a
/// privileged uid (§9 Open Question (a); `xdbgctl` enables the check by
/// default). A metadata lookup failure here is left to
/// [`xdbg::Client::connect`], which reports it as an invalid socket path.
async fn connect(socket: &Path, timeout: Duration) -> Result<xdbg::Client, CliError> {
    if !xdbg::owner_is_caller_or_privileged(socket).unwrap_or(true) {
        return Err(CliError::runtime(format!(
            "{} is not owned by you or a privileged user; refusing to connect",
            socket.display()
        )));
    }
    Ok(xdbg::Client::connect(socket, timeout).await?)
}

async fn exec_command(socket: &Path, timeout: Duration, name: &str, args: Vec<String>) -> Result<(), CliError> {
    let client = connect(socket, timeout).await?;
    let response = client.execute(name, args).await?;
    print_response(&response);
    if response.success {
        Ok(())
    } else {
        Err(CliError::runtime(response.error.unwrap_or_else(|| "command failed".to_owned())))
    }
}

async fn status(socket: &Path, timeout: Duration) -> Result<(), CliError> {
    let online = async {
        let client = connect(socket, timeout).await?;
        client.ping().await.map_err(CliError::from)
    };

    match online.await {
        Ok(true) => {
            println!("status: online\n  socket: {}", socket.display());
            Ok(())
        }
        Ok(false) => {
            println!("status: offline\n  socket: {}\n  error: server reported a failed ping", socket.display());
            Err(CliError::runtime("server reported a failed ping"))
        }
        Err(err) => {
            println!("status: offline\n  socket: {}\n  error: {err}", socket.display());
            Err(err)
        }
    }
}

async fn interactive(socket: &Path, timeout: Duration) -> Result<(), CliError> {
    let client = connect(socket, timeout).await?;
    repl::run(&client).await
}

/// Resolves the target PID (an explicit `--pid` always wins), then sends
/// `SIGUSR1` and reports what the post-signal liveness recheck found.
fn toggle(socket: &Path, pid: Option<i32>, name: Option<String>) -> Result<(), CliError> {
    let pid = match (pid, name) {
        (Some(pid), _) => pid,
        (None, Some(name)) => xdbg_discover::find_by_name(&name)?,
        (None, None) => xdbg_discover::find_by_socket(socket)?,
    };

    match xdbg_discover::send_and_verify(pid, nix::sys::signal::Signal::SIGUSR1) {
        Ok(xdbg_discover::SignalOutcome::Delivered) => {
            println!("sent SIGUSR1 to pid {pid}");
            Ok(())
        }
        Ok(xdbg_discover::SignalOutcome::ProcessExited) => {
            let hint = match xdbg_discover::detect_container() {
                xdbg_discover::ContainerHint::Containerized => {
                    " (it may have been running as PID 1 in its container, which terminates on an unhandled signal)"
                }
                xdbg_discover::ContainerHint::Bare => "",
            };
            Err(CliError::runtime(format!(
                "process {pid} exited shortly after receiving the signal; unable to confirm whether it toggled or terminated{hint}"
            )))
        }
        Err(err) => Err(err.into()),
    }
}

pub(crate) fn print_response(response: &xdbg_proto::Response) {
    if response.success {
        if let Some(output) = &response.output {
            println!("{output}");
        }
        if response.truncated {
            let note = response
                .original_size
                .map(|n| format!(" ({n} bytes before truncation)"))
                .unwrap_or_default();
            eprintln!("(output truncated{note})");
        }
    } else if let Some(error) = &response.error {
        eprintln!("{error}");
    }
}

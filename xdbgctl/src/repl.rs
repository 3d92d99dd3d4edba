//! Line parser and loop for `xdbgctl interactive` (§6).
//!
//! Splitting is space-only — a literal tab is not a word separator and
//! is carried into whatever token it falls inside, since it's common to
//! paste tab-separated text from a terminal. `"` and `'` group a run of
//! characters into one word (and can abut unquoted text to build a
//! single token); `\` escapes the character that follows it, inside or
//! outside a quote. An unterminated quote or a trailing, unescaped
//! backslash is a parse error, not a panic.

use std::io::{self, Write as _};

use tokio::io::{AsyncBufReadExt as _, BufReader};

use crate::error::CliError;

/// Splits one REPL line into words per the quoting rules above.
pub fn parse_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' {
                    match chars.next() {
                        Some(escaped) => current.push(escaped),
                        None => return Err("trailing backslash with nothing to escape".to_owned()),
                    }
                } else if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                ' ' => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                '"' | '\'' => {
                    quote = Some(c);
                    in_token = true;
                }
                '\\' => {
                    in_token = true;
                    match chars.next() {
                        Some(escaped) => current.push(escaped),
                        None => return Err("trailing backslash with nothing to escape".to_owned()),
                    }
                }
                _ => {
                    in_token = true;
                    current.push(c);
                }
            },
        }
    }

    if quote.is_some() {
        return Err(format!("unterminated quote ({})", quote.unwrap()));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Reads lines from stdin until `quit`, `exit`, or EOF, dispatching each
/// non-empty line as `exec <word> [args...]`.
pub async fn run(client: &xdbg::Client) -> Result<(), CliError> {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        print!("xdbg> ");
        io::stdout().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => return Err(CliError::runtime(format!("reading stdin: {err}"))),
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }

        let words = match parse_line(trimmed) {
            Ok(words) => words,
            Err(err) => {
                eprintln!("parse error: {err}");
                continue;
            }
        };
        let Some((command, args)) = words.split_first() else {
            continue;
        };

        match client.execute(command.clone(), args.to_vec()).await {
            Ok(response) => crate::print_response(&response),
            Err(err) => eprintln!("{err}"),
        }
    }

    Ok(())
}

use crate::clock::Clock;
use crate::quota::time_until_next_reset;
use crate::session::{ChatSession, SendOutcome};
use crate::types::Environment;
use log::{debug, info};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const HELP: &[&str] = &[
    "Type a question and press Enter to send it.",
    "/env test|production  switch webhook environment",
    "/status               show remaining quota and reset countdown",
    "/quit                 leave the chat",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    SetEnvironment(Environment),
    Status,
    Help,
    Quit,
    Invalid(String),
}

pub fn parse_line(line: &str) -> Command {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("quit" | "exit"), _) => Command::Quit,
        (Some("help"), _) => Command::Help,
        (Some("status"), _) => Command::Status,
        (Some("env"), Some(arg)) => match arg.parse::<Environment>() {
            Ok(env) => Command::SetEnvironment(env),
            Err(e) => Command::Invalid(e),
        },
        (Some("env"), None) => Command::Invalid("usage: /env test|production".into()),
        _ => Command::Invalid(format!("unknown command '{}'; try /help", trimmed)),
    }
}

/// Reads lines until EOF or `/quit`, feeding each one to the session.
/// Returns how many messages were answered.
pub async fn run_interactive<R>(session: &ChatSession, input: R) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    info!("Starting interactive chat");
    session.start();
    let mut lines = input.lines();
    let mut answered = 0usize;
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Command::Send(text) => {
                if let SendOutcome::Rendered { .. } = session.submit(&text).await {
                    answered += 1;
                }
            }
            Command::SetEnvironment(env) => session.set_environment(env),
            Command::Status => session.show_status(),
            Command::Help => {
                for line in HELP {
                    session.notice(line);
                }
            }
            Command::Quit => break,
            Command::Invalid(msg) => session.notice(&msg),
        }
    }
    debug!("Interactive chat finished; {} replies", answered);
    Ok(answered)
}

/// Prints the time to the next reset once per second until it reaches zero,
/// or after `ticks` updates when given.
pub async fn run_countdown<W: Write>(
    clock: &dyn Clock,
    mut out: W,
    ticks: Option<u64>,
) -> std::io::Result<()> {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut printed = 0u64;
    loop {
        interval.tick().await;
        let countdown = time_until_next_reset(&clock.now());
        write!(out, "\rQuota resets in {}", countdown)?;
        out.flush()?;
        printed += 1;
        if countdown.is_zero() || ticks.is_some_and(|t| printed >= t) {
            break;
        }
    }
    writeln!(out)?;
    Ok(())
}

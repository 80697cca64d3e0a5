use crate::quota::{Countdown, QuotaLevel, QuotaStatus};
use crate::types::{ChatTurn, Environment, Sender};
use log::warn;
use std::io::Write;

pub const EXHAUSTED_PROMPT: &str = "Daily query limit reached. Try again tomorrow.";

/// Presentation surface driven by the chat session. Turns arrive in order and
/// are only ever appended.
pub trait ChatView: Send {
    fn render_turn(&mut self, turn: &ChatTurn);
    fn show_loading(&mut self, loading: bool);
    fn show_quota(&mut self, status: &QuotaStatus);
    fn show_environment(&mut self, environment: Environment);
    fn show_rate_limit_notice(&mut self, limit: u32, countdown: Countdown);
    fn show_notice(&mut self, message: &str);
}

pub fn char_count(len: usize, max: usize) -> String {
    format!("{}/{} characters", len, max)
}

/// Line-oriented view over any writer (stdout in the binary).
pub struct TerminalView<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            warn!("Failed to write to terminal: {}", e);
        }
    }
}

impl<W: Write + Send> ChatView for TerminalView<W> {
    fn render_turn(&mut self, turn: &ChatTurn) {
        let who = match (turn.sender, turn.is_error) {
            (Sender::User, _) => "You",
            (Sender::Assistant, false) => "AI",
            (Sender::Assistant, true) => "AI (error)",
        };
        let line = format!("[{}] {}: {}", turn.timestamp.format("%H:%M"), who, turn.text);
        self.line(&line);
    }

    fn show_loading(&mut self, loading: bool) {
        if loading {
            self.line("... thinking");
        }
    }

    fn show_quota(&mut self, status: &QuotaStatus) {
        let line = match status.level() {
            QuotaLevel::Normal => status.to_string(),
            QuotaLevel::Low => format!("{} (running low)", status),
            QuotaLevel::Exhausted => format!("{}. {}", status, EXHAUSTED_PROMPT),
        };
        self.line(&line);
    }

    fn show_environment(&mut self, environment: Environment) {
        let line = format!("Environment: {}", environment.label());
        self.line(&line);
    }

    fn show_rate_limit_notice(&mut self, limit: u32, countdown: Countdown) {
        let line = format!(
            "Daily limit of {} queries reached. Your quota resets in {}.",
            limit, countdown
        );
        self.line(&line);
    }

    fn show_notice(&mut self, message: &str) {
        let line = format!("! {}", message);
        self.line(&line);
    }
}

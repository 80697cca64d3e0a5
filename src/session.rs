use crate::clock::Clock;
use crate::config::Config;
use crate::error::{ChatError, StorageError};
use crate::http::{self, WebhookPayload};
use crate::quota::{Countdown, DailyQuota, QuotaRecord, QuotaStatus};
use crate::storage::KeyValueStore;
use crate::types::{ChatTurn, EndpointConfig, Environment};
use crate::view::{char_count, ChatView};
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const MAX_MESSAGE_CHARS: usize = 500;
pub const ERROR_REPLY: &str =
    "Sorry, I encountered an error while processing your request. Please try again later.";

/// How a single submit ended. Every variant leaves the session idle again.
#[derive(Debug)]
pub enum SendOutcome {
    /// Blank input; nothing charged, nothing sent.
    Ignored,
    /// Refused before reaching the network; nothing charged.
    Rejected(ChatError),
    /// Reply received and rendered; the attempt stays charged.
    Rendered { reply: String },
    /// The webhook call failed; the attempt was released.
    RolledBack(ChatError),
}

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// Marks a send as in flight; clears the flag on every exit path.
struct SendingGuard<'a>(&'a AtomicBool);

impl<'a> SendingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Rate-limited messenger: owns the quota, the endpoint toggle, the HTTP
/// client and the view, and runs the send state machine
/// `Idle -> QuotaChecked -> (Rejected | Sending) -> (Rendered | RolledBack)`.
///
/// Methods take `&self` so the session can be shared by whatever drives the
/// input; the in-flight flag rejects overlapping sends.
pub struct ChatSession {
    endpoints: Mutex<EndpointConfig>,
    quota: Mutex<DailyQuota>,
    client: Client,
    clock: Arc<dyn Clock>,
    view: Mutex<Box<dyn ChatView>>,
    transcript: Mutex<Vec<ChatTurn>>,
    sending: AtomicBool,
}

impl ChatSession {
    pub fn new(
        endpoints: EndpointConfig,
        quota: DailyQuota,
        client: Client,
        clock: Arc<dyn Clock>,
        view: Box<dyn ChatView>,
    ) -> Self {
        Self {
            endpoints: Mutex::new(endpoints),
            quota: Mutex::new(quota),
            client,
            clock,
            view: Mutex::new(view),
            transcript: Mutex::new(Vec::new()),
            sending: AtomicBool::new(false),
        }
    }

    pub fn from_config(
        cfg: &Config,
        store: Box<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        view: Box<dyn ChatView>,
    ) -> reqwest::Result<Self> {
        let client = http::build_client(cfg)?;
        let quota = DailyQuota::new(store, clock.clone(), cfg.daily_max);
        Ok(Self::new(cfg.endpoints(), quota, client, clock, view))
    }

    fn view(&self) -> MutexGuard<'_, Box<dyn ChatView>> {
        lock(&self.view)
    }

    /// Applies any pending daily reset and paints the environment and quota.
    pub fn start(&self) {
        let env = self.environment();
        self.view().show_environment(env);
        if let Err(e) = self.check_quota() {
            warn!("Could not persist quota reset: {}", e);
        }
        self.refresh_quota();
    }

    pub fn check_quota(&self) -> Result<bool, StorageError> {
        lock(&self.quota).check_quota()
    }

    pub fn quota_status(&self) -> QuotaStatus {
        lock(&self.quota).status()
    }

    pub fn quota_record(&self) -> QuotaRecord {
        lock(&self.quota).load()
    }

    pub fn time_until_next_reset(&self) -> Countdown {
        lock(&self.quota).time_until_next_reset()
    }

    pub fn refresh_quota(&self) {
        let status = self.quota_status();
        self.view().show_quota(&status);
    }

    /// Environment, quota and time to the next reset, as the `/status` command shows them.
    pub fn show_status(&self) {
        let env = self.environment();
        let countdown = self.time_until_next_reset();
        let mut view = self.view();
        view.show_environment(env);
        view.show_quota(&self.quota_status());
        view.show_notice(&format!("Quota resets in {}", countdown));
    }

    pub fn notice(&self, message: &str) {
        self.view().show_notice(message);
    }

    pub fn environment(&self) -> Environment {
        lock(&self.endpoints).selected
    }

    pub fn set_environment(&self, environment: Environment) {
        lock(&self.endpoints).selected = environment;
        info!("Switched to {} endpoint", environment);
        self.view().show_environment(environment);
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    pub fn transcript(&self) -> Vec<ChatTurn> {
        lock(&self.transcript).clone()
    }

    pub fn render_turn(&self, turn: ChatTurn) {
        self.view().render_turn(&turn);
        lock(&self.transcript).push(turn);
    }

    /// Runs one message through the quota gate and the webhook.
    pub async fn submit(&self, text: &str) -> SendOutcome {
        let message = text.trim();
        if message.is_empty() {
            return SendOutcome::Ignored;
        }
        let len = message.chars().count();
        if len > MAX_MESSAGE_CHARS {
            let notice = format!("Message too long: {}", char_count(len, MAX_MESSAGE_CHARS));
            self.view().show_notice(&notice);
            return SendOutcome::Rejected(ChatError::MessageTooLong {
                len,
                max: MAX_MESSAGE_CHARS,
            });
        }
        let Some(_in_flight) = SendingGuard::acquire(&self.sending) else {
            debug!("Rejecting overlapping send");
            self.view().show_notice("Please wait for the current reply before sending again.");
            return SendOutcome::Rejected(ChatError::SendInProgress);
        };

        let reserved = lock(&self.quota).reserve();
        let reservation = match reserved {
            Ok(r) => r,
            Err(ChatError::QuotaExceeded { limit }) => {
                let countdown = self.time_until_next_reset();
                info!("Daily quota of {} exhausted", limit);
                self.view().show_rate_limit_notice(limit, countdown);
                return SendOutcome::Rejected(ChatError::QuotaExceeded { limit });
            }
            Err(e) => {
                warn!("Could not reserve quota: {}", e);
                self.view().show_notice(&e.to_string());
                return SendOutcome::Rejected(e);
            }
        };

        let now = self.clock.now();
        self.render_turn(ChatTurn::user(message, now));
        self.refresh_quota();
        self.view().show_loading(true);

        let (url, environment) = {
            let ep = lock(&self.endpoints);
            (ep.selected_url().to_string(), ep.selected)
        };
        let payload = WebhookPayload::new(message, now.with_timezone(&Utc), environment);
        let result = http::post_message(&self.client, &url, &payload).await;
        self.view().show_loading(false);

        let settled = lock(&self.quota).settle(reservation, result.is_ok());
        if let Err(e) = settled {
            warn!("Could not settle quota reservation: {}", e);
        }

        match result {
            Ok(reply) => {
                self.render_turn(ChatTurn::assistant(reply.clone(), self.clock.now()));
                SendOutcome::Rendered { reply }
            }
            Err(e) => {
                warn!("Error sending message: {}", e);
                self.render_turn(ChatTurn::error(ERROR_REPLY, self.clock.now()));
                self.refresh_quota();
                SendOutcome::RolledBack(e.into())
            }
        }
    }
}

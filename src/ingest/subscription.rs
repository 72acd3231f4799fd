use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::api::models::{MessageRef, Subscription};
use crate::api::{Connection, ConnectionEvent, MailboxService};
use crate::error::{AppError, AppResult};
use crate::queue::{QueueSender, Shutdown};

use super::backfill::BackfillScanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Closed,
    Open,
    Disconnected,
}

/// Exponential backoff with jitter between reconnect attempts.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_attempts: 10,
            jitter: 0.2,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given attempt, counting from 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let raw = self.base_delay.saturating_mul(1_u32 << exponent);
        let capped = raw.min(self.max_delay);

        if self.jitter <= 0.0 || capped.is_zero() {
            return capped;
        }

        let factor = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
        capped.mul_f64(factor).min(self.max_delay)
    }
}

enum Pumped {
    Disconnected(Option<String>),
    Shutdown,
}

/// Owns the live notification connection for one subscription.
pub struct SubscriptionManager {
    service: Arc<dyn MailboxService>,
    subscription: Subscription,
    queue: QueueSender<MessageRef>,
    backfill: Arc<BackfillScanner>,
    policy: ReconnectPolicy,
    shutdown: Shutdown,
    state: SubscriptionState,
}

impl SubscriptionManager {
    pub fn new(
        service: Arc<dyn MailboxService>,
        subscription: Subscription,
        queue: QueueSender<MessageRef>,
        backfill: Arc<BackfillScanner>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            service,
            subscription,
            queue,
            backfill,
            policy: ReconnectPolicy::default(),
            shutdown,
            state: SubscriptionState::Closed,
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Opens the first connection. Failure here aborts startup.
    pub async fn open(&mut self) -> AppResult<Connection> {
        info!("connecting the subscription {}", self.subscription.id);
        let connection = self
            .service
            .open_connection(&self.subscription)
            .await
            .map_err(|err| AppError::Startup(format!("unable to open the subscription: {err}")))?;

        self.transition(SubscriptionState::Open);
        info!("subscription connected");
        Ok(connection)
    }

    /// Pumps notifications and reconnects until shutdown. Returns an error
    /// only when reconnecting keeps failing past the policy's limit.
    pub async fn run(mut self, connection: Connection) -> AppResult<()> {
        let mut current = Some(connection);

        loop {
            let connection = match current.take() {
                Some(connection) => connection,
                None => match self.reconnect().await? {
                    Some(connection) => connection,
                    None => break,
                },
            };

            match self.pump(connection).await {
                Pumped::Shutdown => break,
                Pumped::Disconnected(reason) => {
                    self.transition(SubscriptionState::Disconnected);
                    match reason {
                        Some(reason) => warn!("subscription disconnected: {reason}"),
                        None => info!("subscription disconnected"),
                    }
                    self.transition(SubscriptionState::Closed);
                }
            }
        }

        self.transition(SubscriptionState::Closed);
        Ok(())
    }

    async fn pump(&mut self, mut connection: Connection) -> Pumped {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => None,
                event = connection.next_event() => Some(event),
            };

            let Some(event) = event else {
                connection.close();
                return Pumped::Shutdown;
            };

            match event {
                Some(ConnectionEvent::Notification(items)) => self.dispatch(items),
                Some(ConnectionEvent::Error(message)) => {
                    warn!("subscription error: {message}");
                }
                Some(ConnectionEvent::Disconnected(reason)) => {
                    return Pumped::Disconnected(reason);
                }
                None => {
                    return Pumped::Disconnected(Some("connection closed".to_string()));
                }
            }
        }
    }

    fn dispatch(&self, items: Vec<MessageRef>) {
        let pending = self.backfill.pending();
        for item in items {
            debug!("new message notification {}", item.unique_id);
            pending.offer(item, &self.queue);
        }
    }

    async fn reconnect(&mut self) -> AppResult<Option<Connection>> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let delay = self.policy.delay(attempt);
            debug!("reconnect attempt {attempt} in {delay:?}");

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Ok(None),
                _ = tokio::time::sleep(delay) => {}
            }

            match self.service.open_connection(&self.subscription).await {
                Ok(connection) => {
                    self.transition(SubscriptionState::Open);
                    info!("subscription reconnected");
                    if self.backfill.try_start() {
                        info!("catch-up backfill started");
                    } else {
                        debug!("backfill already in progress");
                    }
                    return Ok(Some(connection));
                }
                Err(err) if attempt >= self.policy.max_attempts => {
                    return Err(AppError::Api(format!(
                        "giving up on the subscription after {attempt} reconnect attempts: {err}"
                    )));
                }
                Err(err) => {
                    warn!("reconnect attempt {attempt} failed: {err}");
                }
            }
        }
    }

    fn transition(&mut self, next: SubscriptionState) {
        if self.state != next {
            debug!("subscription state {:?} -> {next:?}", self.state);
            self.state = next;
        }
    }
}

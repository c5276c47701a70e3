//! Command dispatcher - looks up incoming commands and runs their handlers

use super::handlers::{self, HandlerContext};
use super::ReplySink;
use robot_bridge_shared::{limits, CommandEnvelope, ResponseEnvelope};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{timeout, Instant};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// What to do with a command when every handler slot is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusyPolicy {
    /// Answer with an error straight away
    #[default]
    Reject,
    /// Start the task anyway; it waits for a free slot
    Queue,
}

impl FromStr for BusyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(BusyPolicy::Reject),
            "queue" => Ok(BusyPolicy::Queue),
            other => Err(format!("unknown busy policy '{}' (expected reject or queue)", other)),
        }
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Handler tasks allowed to run at once
    pub max_in_flight: usize,
    pub busy_policy: BusyPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: limits::DEFAULT_MAX_IN_FLIGHT,
            busy_policy: BusyPolicy::Reject,
        }
    }
}

/// Result of handing one command to the dispatcher
#[derive(Debug)]
pub enum Dispatch {
    /// Handler running, or queued for a slot, in its own task
    Spawned,
    /// Not a known command; the error response has been sent
    UnknownCommand,
    /// Rejected under `BusyPolicy::Reject`; the error response has been sent
    Busy,
}

/// Routes commands to handler tasks, bounded by a fixed number of slots
pub struct CommandDispatcher {
    config: DispatchConfig,
    slots: Arc<Semaphore>,
    /// Every spawned handler, including queued ones still waiting for a slot
    tasks: TaskTracker,
    ctx: HandlerContext,
}

impl CommandDispatcher {
    /// Create a dispatcher; `max_in_flight` is clamped to `1..=Semaphore::MAX_PERMITS`
    pub fn new(mut config: DispatchConfig, ctx: HandlerContext) -> Self {
        config.max_in_flight = config.max_in_flight.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            slots: Arc::new(Semaphore::new(config.max_in_flight)),
            tasks: TaskTracker::new(),
            config,
            ctx,
        }
    }

    /// Handler tasks currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.config.max_in_flight - self.slots.available_permits()
    }

    /// Handler tasks not yet finished, queued ones included
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Dispatch one decoded command
    ///
    /// Returns without waiting for the handler. Unknown commands and busy
    /// rejections are answered before this returns.
    pub async fn dispatch(&self, envelope: CommandEnvelope, reply: ReplySink) -> Dispatch {
        let Some(kind) = envelope.kind() else {
            warn!("[CMD] Unknown command: {}", envelope.command);
            reply
                .send(&ResponseEnvelope::unknown_command(&envelope.command))
                .await;
            return Dispatch::UnknownCommand;
        };

        let permit = match self.config.busy_policy {
            BusyPolicy::Reject => match self.slots.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    let in_flight = self.in_flight();
                    warn!(
                        "[CMD] Rejecting '{}': {} commands in flight",
                        kind, in_flight
                    );
                    let response = ResponseEnvelope::error(
                        kind.as_str(),
                        format!("busy: {} commands in flight", in_flight),
                    );
                    reply.send(&response).await;
                    return Dispatch::Busy;
                }
            },
            BusyPolicy::Queue => None,
        };

        info!("[CMD] Processing command: {}", kind);
        let slots = self.slots.clone();
        let ctx = self.ctx.clone();

        self.tasks.spawn(async move {
            let _permit: OwnedSemaphorePermit = match permit {
                Some(permit) => permit,
                None => match slots.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            let started = Instant::now();
            handlers::run(kind, &envelope, &ctx, &reply).await;
            debug!(
                command = %kind,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "[CMD] Handler finished"
            );
        });

        Dispatch::Spawned
    }

    /// Wait until every spawned handler has finished, up to `wait`
    ///
    /// Queued handlers count as well as running ones. Returns false if any
    /// were left when the wait ran out.
    pub async fn drain(&self, wait: Duration) -> bool {
        self.tasks.close();
        match timeout(wait, self.tasks.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    "[CMD] Drain timed out with {} handlers left ({} running)",
                    self.pending(),
                    self.in_flight()
                );
                false
            }
        }
    }
}

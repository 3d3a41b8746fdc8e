use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::time::Clock;
use crate::countdown::{self, CountdownState};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1000);

/// Repeating timer that recomputes the countdown against a target instant on
/// every tick and publishes the result to observers. A single task serves the
/// ticker for its whole lifetime; changing the target retargets that task in
/// place, so two timers never run concurrently for one ticker.
///
/// Observers are only woken when the computed state actually changed.
/// Dropping the ticker ends the task; `stop` does the same explicitly and is
/// idempotent.
pub struct CountdownTicker {
    target_tx: watch::Sender<Option<OffsetDateTime>>,
    state_rx: watch::Receiver<CountdownState>,
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl CountdownTicker {
    pub fn start(
        clock: Arc<dyn Clock>,
        target: Option<OffsetDateTime>,
        interval: Duration,
    ) -> Self {
        let (target_tx, mut target_rx) = watch::channel(target);
        let (state_tx, state_rx) = watch::channel(countdown::remaining(target, clock.now()));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    changed = target_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        // Recompute immediately so a retarget is visible
                        // before the next interval fires.
                        publish(&state_tx, *target_rx.borrow(), clock.now());
                    }
                    _ = tick.tick() => {
                        publish(&state_tx, *target_rx.borrow(), clock.now());
                    }
                }
            }
        });

        Self { target_tx, state_rx, shutdown_tx, handle: Some(handle) }
    }

    /// Latest published state.
    pub fn current(&self) -> CountdownState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CountdownState> {
        self.state_rx.clone()
    }

    /// Point the ticker at a new target (or none). Applied by the running
    /// task; existing subscribers keep their channel.
    pub fn retarget(&self, target: Option<OffsetDateTime>) {
        let _ = self.target_tx.send(target);
    }

    /// Stop the ticker and wait for its task to finish. Stopping an already
    /// stopped ticker is a no-op.
    pub async fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.shutdown_tx.send(true);
        let _ = handle.await;
    }
}

fn publish(
    state_tx: &watch::Sender<CountdownState>,
    target: Option<OffsetDateTime>,
    now: OffsetDateTime,
) {
    let next = countdown::remaining(target, now);
    state_tx.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}

//! Always-on scan loop.
//!
//! Owns the [`ScanEngine`] on a spawned task. Each tick drains pending
//! host events, takes a read lock on the shared world model for the
//! duration of one synchronous cycle, and releases it before sleeping.
//! A panic inside a cycle is caught at the loop boundary, logged with a
//! backtrace, and stops the loop; scan state is assumed corrupt at that
//! point and no further cycles run.

use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use world_model::WorldModel;

use crate::engine::{HostEvent, ScanEngine};

/// How many host events can queue between ticks before senders see
/// backpressure.
pub const EVENT_QUEUE_DEPTH: usize = 256;

/// Handle to a running scan loop.
pub struct ScanLoop {
    events: mpsc::Sender<HostEvent>,
    task: JoinHandle<()>,
}

impl ScanLoop {
    /// Spawns the loop over a shared world model.
    pub fn spawn(mut engine: ScanEngine, world: Arc<RwLock<WorldModel>>) -> Self {
        let (events, mut receiver) = mpsc::channel::<HostEvent>(EVENT_QUEUE_DEPTH);
        let interval = engine.config().scan.interval();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!("scan loop started, interval {:?}", interval);

            loop {
                ticker.tick().await;

                let now = Instant::now();
                let mut running = true;
                while let Ok(event) = receiver.try_recv() {
                    if !engine.on_event(event, now) {
                        running = false;
                        break;
                    }
                }
                if !running {
                    tracing::info!("scan loop shutting down");
                    break;
                }

                let snapshot = world.read().await;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    engine.run_cycle(&snapshot, Instant::now())
                }));
                drop(snapshot);

                match outcome {
                    Ok(report) => {
                        if report.looted > 0 || report.highlighted > 0 {
                            tracing::info!(
                                "cycle {}: looted {}, highlighted {}",
                                report.cycle,
                                report.looted,
                                report.highlighted
                            );
                        }
                    }
                    Err(_) => {
                        tracing::error!(
                            "scan cycle panicked, stopping loop\n{}",
                            Backtrace::force_capture()
                        );
                        break;
                    }
                }
            }
        });

        Self { events, task }
    }

    /// Sender for host events. Cheap to clone and hand to host callbacks.
    pub fn events(&self) -> mpsc::Sender<HostEvent> {
        self.events.clone()
    }

    /// Requests shutdown and waits for the final cycle to finish.
    pub async fn shutdown(self) {
        // The loop may already be gone after a panic; both are fine
        let _ = self.events.send(HostEvent::Shutdown).await;
        let _ = self.task.await;
    }
}

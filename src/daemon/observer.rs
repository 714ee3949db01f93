use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{probe::ForegroundProbe, utils::clock::Clock};

use super::tracker::ObservationEvent;

/// Polls the foreground probe on a fixed cadence and feeds raw observations
/// into the tracker's serialized queue. A failed poll is logged and skipped;
/// the cadence holds either way.
pub struct ObserverModule {
    next: mpsc::Sender<ObservationEvent>,
    probe: Box<dyn ForegroundProbe>,
    shutdown: CancellationToken,
    poll_interval: Duration,
    clock: Box<dyn Clock>,
}

impl ObserverModule {
    pub fn new(
        next: mpsc::Sender<ObservationEvent>,
        probe: Box<dyn ForegroundProbe>,
        shutdown: CancellationToken,
        poll_interval: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            probe,
            shutdown,
            poll_interval,
            clock,
        }
    }

    fn observe(&mut self) -> Result<ObservationEvent> {
        let sample = self.probe.sample()?;
        Ok(ObservationEvent {
            raw_title: sample.window_title,
            idle_seconds: sample.idle_seconds,
            timestamp: self.clock.time(),
        })
    }

    /// Executes the polling event loop until cancellation. Dropping the
    /// sender on exit is what lets the tracker module finalize.
    pub async fn run(mut self) -> Result<()> {
        let mut poll_point = self.clock.instant();
        loop {
            poll_point += self.poll_interval;

            match self.observe() {
                Ok(event) => {
                    debug!("Sending observation {:?}", event);
                    self.next
                        .send(event)
                        .await
                        .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
                }
                Err(e) => {
                    error!("Encountered an error during observation {:?}", e)
                }
            }

            tokio::select! {
                // Cancellation stops the loop, drops the sender, and thereby
                // shuts the tracker module down too.
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.clock.sleep_until(poll_point) => ()
            }
        }
    }
}

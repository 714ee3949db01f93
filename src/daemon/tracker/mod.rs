//! The session tracker: consumes observations from the serialized daemon
//! queue, classifies them, runs the state machine, and lands closed records
//! in the activity store.

pub mod reconcile;
pub mod session;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc::Receiver, watch};
use tracing::{debug, error, info};

use crate::{
    config::Settings,
    daemon::classifier::classify,
    storage::{
        activity::{Activity, OpenActivity, BREAK_NAME},
        store::ActivityStore,
    },
    utils::clock::Clock,
};

use reconcile::{IdleResolution, IdleResolver};
use session::{Session, Transition};

/// One raw observation from the foreground observer, timestamped at arrival.
#[derive(Debug, Clone)]
pub struct ObservationEvent {
    pub raw_title: Option<Arc<str>>,
    pub idle_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// Read-and-control side of a running tracker. The open activity is
/// single-writer state owned by the tracker; consumers get clones through a
/// watch channel and must never write it back.
#[derive(Clone)]
pub struct TrackerHandle {
    open: watch::Receiver<Option<OpenActivity>>,
    pause: Arc<watch::Sender<bool>>,
}

impl TrackerHandle {
    /// Snapshot of the currently open activity, if any.
    pub fn current(&self) -> Option<OpenActivity> {
        self.open.borrow().clone()
    }

    pub fn set_paused(&self, paused: bool) {
        let _ = self.pause.send(paused);
    }
}

/// Event-loop module around [Session]. Mirrors the daemon's other modules:
/// `run` consumes the queue until every sender is gone, then finalizes.
pub struct TrackerModule<S: ActivityStore, R: IdleResolver> {
    receiver: Receiver<ObservationEvent>,
    store: S,
    resolver: R,
    session: Session,
    idle_threshold_seconds: u64,
    open_tx: watch::Sender<Option<OpenActivity>>,
    pause_rx: watch::Receiver<bool>,
    clock: Box<dyn Clock>,
}

impl<S: ActivityStore, R: IdleResolver> TrackerModule<S, R> {
    pub fn new(
        receiver: Receiver<ObservationEvent>,
        store: S,
        resolver: R,
        settings: &Settings,
        clock: Box<dyn Clock>,
    ) -> (Self, TrackerHandle) {
        let (open_tx, open_rx) = watch::channel(None);
        let (pause_tx, pause_rx) = watch::channel(false);
        let module = Self {
            receiver,
            store,
            resolver,
            session: Session::new(settings.check_interval()),
            idle_threshold_seconds: settings.idle_threshold_seconds(),
            open_tx,
            pause_rx,
            clock,
        };
        let handle = TrackerHandle {
            open: open_rx,
            pause: Arc::new(pause_tx),
        };
        (module, handle)
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(event) = self.receiver.recv().await {
            if let Err(e) = self.process(event).await {
                error!("Error applying observation: {e:?}");
            }
        }

        let result = self.finalize().await;
        self.receiver.close();
        result
    }

    async fn process(&mut self, event: ObservationEvent) -> Result<()> {
        self.session.set_paused(*self.pause_rx.borrow());

        let name = classify(
            event.raw_title.as_deref(),
            event.idle_seconds,
            self.idle_threshold_seconds,
        );
        debug!("Observed {name} at {}", event.timestamp);

        match self.session.observe(name, event.timestamp) {
            Transition::None => {}
            Transition::Opened => self.publish(),
            Transition::Closed(activity) => {
                info!(
                    "Closing {} after {}s",
                    activity.app_name, activity.duration_seconds
                );
                self.store.append(&activity).await?;
                self.publish();
            }
            Transition::IdleEnded(idle) => {
                self.reconcile(idle).await?;
                self.publish();
            }
        }
        Ok(())
    }

    /// The only suspension point in the core: the transition (not the
    /// process) waits for the three-way decision.
    async fn reconcile(&mut self, mut idle: Activity) -> Result<()> {
        match self.resolver.resolve(&idle).await {
            IdleResolution::LogAsBreak => {
                idle.app_name = BREAK_NAME.into();
                info!("Logging {}s idle period as a break", idle.duration_seconds);
                self.store.append(&idle).await?;
            }
            IdleResolution::KeepPreviousActivity => {
                if self.store.extend_last_real_end_time(idle.end_time).await? {
                    info!("Extended the previous activity over the idle period");
                } else {
                    debug!("No prior real activity to extend, idle period dropped");
                }
            }
            IdleResolution::DiscardIdle => {
                debug!("Discarded {}s idle period", idle.duration_seconds);
            }
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.session.set_paused(*self.pause_rx.borrow());
        if let Some(last) = self.session.finish(self.clock.time()) {
            info!("Persisting final activity {}", last.app_name);
            self.store.append(&last).await?;
        }
        self.publish();
        Ok(())
    }

    fn publish(&self) {
        let _ = self.open_tx.send(self.session.current().cloned());
    }
}

//! The background tracker process: a foreground observer polling the probe,
//! a tracker module applying the session state machine, and a csv activity
//! store, glued together by one serialized queue.

use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    config::Settings,
    probe::{ForegroundProbe, PlatformProbe},
    storage::store::CsvActivityStore,
    utils::clock::{Clock, DefaultClock},
};

use tracker::{
    reconcile::{AutoBreakResolver, IdleResolver},
    ObservationEvent, TrackerHandle, TrackerModule,
};

pub mod args;
pub mod classifier;
pub mod observer;
pub mod shutdown;
pub mod tracker;

/// Represents the starting point for the daemon.
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    std::env::set_current_dir("/")?;

    let settings = Settings::load(&dir);
    let (sender, receiver) = mpsc::channel::<ObservationEvent>(10);
    let probe = PlatformProbe::new()?;

    let shutdown_token = CancellationToken::new();

    let observer = create_observer(
        sender,
        Box::new(probe),
        &shutdown_token,
        &settings,
        DefaultClock,
    );

    // Headless process: idle periods resolve to breaks deterministically. A
    // UI front end would pass a ChannelResolver here instead.
    let (tracker, _handle) = create_tracker(dir, receiver, &settings, AutoBreakResolver, DefaultClock)?;

    let (_, observer_result, tracker_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        observer.run(),
        tracker.run(),
    );

    if let Err(observer_result) = observer_result {
        error!("Observer module got an error {:?}", observer_result);
    }

    if let Err(tracker_result) = tracker_result {
        error!("Tracker module got an error {:?}", tracker_result);
    }

    Ok(())
}

fn create_observer(
    sender: mpsc::Sender<ObservationEvent>,
    probe: Box<dyn ForegroundProbe>,
    shutdown_token: &CancellationToken,
    settings: &Settings,
    clock: impl Clock,
) -> observer::ObserverModule {
    observer::ObserverModule::new(
        sender,
        probe,
        shutdown_token.clone(),
        settings.check_interval(),
        Box::new(clock),
    )
}

fn create_tracker<R: IdleResolver>(
    dir: PathBuf,
    receiver: mpsc::Receiver<ObservationEvent>,
    settings: &Settings,
    resolver: R,
    clock: impl Clock,
) -> Result<(TrackerModule<CsvActivityStore, R>, TrackerHandle)> {
    let store = CsvActivityStore::new(dir)?;
    Ok(TrackerModule::new(
        receiver,
        store,
        resolver,
        settings,
        Box::new(clock),
    ))
}

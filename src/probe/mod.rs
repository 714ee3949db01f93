//! Seam for platform foreground-window introspection. The daemon only needs
//! a raw title and an idle measurement per poll; everything platform-specific
//! stays behind [ForegroundProbe].

use std::sync::Arc;

use anyhow::{bail, Result};
#[cfg(test)]
use mockall::automock;

/// One sample of what the user is doing right now.
#[derive(Debug, Clone)]
pub struct ForegroundSample {
    /// Raw foreground window title, `None` when no window has focus.
    pub window_title: Option<Arc<str>>,
    /// Seconds since the last user input.
    pub idle_seconds: u64,
}

#[cfg_attr(test, automock)]
pub trait ForegroundProbe: Send {
    fn sample(&mut self) -> Result<ForegroundSample>;
}

/// Placeholder for a real platform backend. Window introspection is provided
/// by the embedding environment; this keeps the daemon wiring honest about
/// its absence instead of panicking at poll time.
pub struct PlatformProbe;

impl PlatformProbe {
    pub fn new() -> Result<Self> {
        bail!("no foreground probe is available for this platform")
    }
}

impl ForegroundProbe for PlatformProbe {
    fn sample(&mut self) -> Result<ForegroundSample> {
        bail!("no foreground probe is available for this platform")
    }
}

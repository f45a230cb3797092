//! Per-process connection options.

use log::Level;
use std::time::Duration;

/// Default upper bound for waiting on one complete response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Options shared by every command sent to the module.
///
/// Built once from command line and configuration, then passed by reference
/// through every exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Explicit port; `None` means discover on demand.
    pub port: Option<String>,
    /// Send checksummed frames.
    pub use_checksum: bool,
    /// Log raw traffic at `info` instead of `trace`.
    pub verbose: bool,
    /// Overall deadline for one response; `None` waits indefinitely.
    pub response_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: None,
            use_checksum: false,
            verbose: false,
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT),
        }
    }
}

impl SessionConfig {
    /// Default options with auto-discovery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given port instead of discovery.
    #[must_use]
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// Select the frame variant.
    #[must_use]
    pub fn with_checksum(mut self, use_checksum: bool) -> Self {
        self.use_checksum = use_checksum;
        self
    }

    /// Echo raw traffic.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the response deadline.
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Log level for raw traffic.
    pub fn traffic_level(&self) -> Level {
        if self.verbose { Level::Info } else { Level::Trace }
    }
}

//! Application-wide constants
//!
//! This module centralizes magic numbers and configuration defaults used throughout
//! the annunciator, making them easier to maintain and understand.

use std::time::Duration;

/// Queue engine constants
pub mod queue {
    use super::*;

    /// Dispatcher poll interval between head inspections
    pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Gap inserted after each successfully played file in a sequence
    pub const INTER_FILE_GAP: Duration = Duration::from_millis(300);

    /// Default size of the terminal-announcement history ring
    pub const DEFAULT_MAX_HISTORY: usize = 100;

    /// Default number of entries returned by a history query
    pub const DEFAULT_HISTORY_LIMIT: usize = 20;
}

/// Audio playback constants
pub mod audio {
    /// Default volume level (0.0 to 1.0)
    pub const DEFAULT_VOLUME: f32 = 0.8;

    /// Volume adjustment step
    pub const VOLUME_STEP: f32 = 0.05;
}

/// Network-related constants
pub mod network {
    use super::*;

    /// Default timeout for HTTP requests (lightning feed fetches)
    pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

    /// Timeout for establishing a connection
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Maximum number of redirects to follow
    pub const MAX_REDIRECTS: usize = 10;

    /// User agent string for HTTP requests
    pub const USER_AGENT: &str = concat!("tarr-annunciator/", env!("CARGO_PKG_VERSION"));
}

/// Cron scheduler constants
pub mod scheduler {
    use super::*;

    /// Scheduler tick interval; jobs fire on the first tick at or after their
    /// cron match
    pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

    /// Default spacing between languages in a multi-language safety sequence
    pub const DEFAULT_SAFETY_DELAY_SECS: u64 = 2;
}

/// Lightning monitor constants
pub mod lightning {
    use super::*;

    /// Default interval between feed fetches
    pub const DEFAULT_FETCH_INTERVAL: Duration = Duration::from_secs(60);

    /// Default per-request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Sentinel condition before the first observation
    pub const INITIAL_CONDITION: &str = "Reset";

    /// How many leading bytes are scanned for NUL bytes when sniffing a
    /// BOM-less UTF-16 body
    pub const UTF16_SCAN_WINDOW: usize = 64;
}

/// Catalog / filesystem constants
pub mod catalog {
    /// Temporary file suffix for atomic writes
    pub const TEMP_FILE_SUFFIX: &str = "tmp";

    /// Permissions for catalog files (Unix only)
    #[cfg(unix)]
    pub const CATALOG_FILE_PERMISSIONS: u32 = 0o644;

    /// Permissions for the admin credentials file (Unix only)
    #[cfg(unix)]
    pub const ADMIN_FILE_PERMISSIONS: u32 = 0o600;
}

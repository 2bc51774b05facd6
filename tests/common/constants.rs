//! Shared constants for end-to-end tests
//!
//! When test data changes (ids, names, timings), update only this file.

// ============================================================================
// Queue Fixtures
// ============================================================================

/// Artist used by most queue tests
pub const ARTIST_ID: &str = "123";
pub const ARTIST_NAME: &str = "Test Artist";

/// Album used by most queue tests
pub const ALBUM_ID: &str = "456";
pub const ALBUM_TITLE: &str = "Random Access Memories";
pub const ALBUM_ARTIST: &str = "Daft Punk";

/// The stub downloader answers ids with this prefix with a captcha challenge
pub const CAPTCHA_ID_PREFIX: &str = "captcha";

/// The stub downloader fails ids with this prefix with an unrelated error
pub const FAILING_ID_PREFIX: &str = "broken";

// ============================================================================
// Search Fixtures
// ============================================================================

/// Query the stub search provider answers with an upstream error
pub const FAILING_QUERY: &str = "explode";

/// Artist id whose stub search result carries a downloadable photo
pub const PHOTO_ARTIST_ID: &str = "777";

// ============================================================================
// Timing
// ============================================================================

/// Maximum time to wait for the server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between server readiness polls (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// HTTP request timeout for the test client (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Scheduler intervals used by scheduler-enabled test servers (milliseconds)
pub const TEST_IDLE_INTERVAL_MS: u64 = 50;
pub const TEST_ENTRY_INTERVAL_MS: u64 = 10;
pub const TEST_RETRY_DELAY_MS: u64 = 50;

/// Maximum time to wait for the scheduler to reach an expected state (milliseconds)
pub const SCHEDULER_WAIT_TIMEOUT_MS: u64 = 5000;

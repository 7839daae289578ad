//! # Application-Wide Constants
//!
//! Centralized configuration values and magic numbers used throughout DirProbe.
//!
//! ## Usage
//!
//! ```rust
//! use dirprobe::constants::*;
//! use std::time::Duration;
//!
//! let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
//! assert_eq!(timeout.as_secs(), 10);
//! ```

/// Folder name used under the per-user local application-data directory
pub const APP_DIR_NAME: &str = "DirProbe";

// ============================================================================
// Network Defaults
// ============================================================================

/// Plain LDAP port
pub const DEFAULT_LDAP_PORT: u16 = 389;

/// LDAP over TLS port
///
/// Used when TLS is requested and no explicit port is configured. The
/// convention is not enforced: any port in 1..=65535 is accepted.
pub const DEFAULT_LDAPS_PORT: u16 = 636;

/// LDAP `success` result code
pub const LDAP_RC_SUCCESS: u32 = 0;

/// LDAP `sizeLimitExceeded` result code
pub const LDAP_RC_SIZE_LIMIT_EXCEEDED: u32 = 4;

/// Client-side `timeout` result code, used for operations that lost the race
/// against their timer
pub const LDAP_RC_TIMEOUT: u32 = 85;

// ============================================================================
// Timeouts and Limits
// ============================================================================

/// Default per-operation timeout for diagnostics (seconds)
///
/// **Rationale**: 10 seconds covers a slow domain controller answering a bind
/// over a WAN link, without leaving an unreachable host hanging the caller.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Upper bound on the per-operation timeout used by the start-up probe (seconds)
///
/// The bootstrap uses `min(configured, this)` so that a stale cached
/// credential against a dead server fails quickly. Never applied to a manual
/// diagnostics run.
pub const BOOTSTRAP_PROBE_TIMEOUT_SECS: u64 = 5;

/// Number of interactive credential attempts before the bootstrap gives up
pub const MAX_INTERACTIVE_ATTEMPTS: u32 = 3;

/// Maximum number of entries read by the representative query
pub const QUERY_SAMPLE_LIMIT: i32 = 5;

/// Wait passed to the system `ping` for a single echo (milliseconds)
pub const PING_WAIT_MS: u64 = 800;

/// Maximum identity length (characters)
pub const MAX_IDENTITY_LENGTH: usize = 256;

// ============================================================================
// Secret Storage
// ============================================================================

/// File holding the encrypted identity/secret blob
pub const CREDENTIAL_FILE_NAME: &str = "credential.bin";

/// File holding the per-user AES key on platforms without DPAPI
pub const CREDENTIAL_KEY_FILE_NAME: &str = "credential.key";

/// Separator between identity and secret inside the plaintext blob
///
/// ASCII unit separator: it cannot be typed into an identity field, so the
/// first occurrence always marks the boundary.
pub const CREDENTIAL_SEPARATOR: char = '\u{1f}';

// ============================================================================
// Configuration and Logging
// ============================================================================

/// Settings file name inside the application-data directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Rotate the log file once it grows past this size (bytes)
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

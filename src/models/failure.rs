//! Closed taxonomy of connection failures and their remediation text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every failure a diagnostics stage can report falls into exactly one class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConfigurationInvalid,
    NameResolutionFailed,
    /// Echo probe failed; recorded but never halts the pipeline
    HostUnreachable,
    PortUnreachable,
    ProtocolHandshakeFailed,
    InvalidCredentials,
    AccountLockedOrExpired,
    InsufficientPermission,
    Timeout,
    Unknown,
}

impl FailureKind {
    pub const ALL: [FailureKind; 10] = [
        FailureKind::ConfigurationInvalid,
        FailureKind::NameResolutionFailed,
        FailureKind::HostUnreachable,
        FailureKind::PortUnreachable,
        FailureKind::ProtocolHandshakeFailed,
        FailureKind::InvalidCredentials,
        FailureKind::AccountLockedOrExpired,
        FailureKind::InsufficientPermission,
        FailureKind::Timeout,
        FailureKind::Unknown,
    ];

    /// Short human-readable name
    pub fn title(&self) -> &'static str {
        match self {
            FailureKind::ConfigurationInvalid => "Configuration invalid",
            FailureKind::NameResolutionFailed => "Name resolution failed",
            FailureKind::HostUnreachable => "Host unreachable",
            FailureKind::PortUnreachable => "Port unreachable",
            FailureKind::ProtocolHandshakeFailed => "Directory service unavailable",
            FailureKind::InvalidCredentials => "Invalid credentials",
            FailureKind::AccountLockedOrExpired => "Account locked or expired",
            FailureKind::InsufficientPermission => "Insufficient permission",
            FailureKind::Timeout => "Timed out",
            FailureKind::Unknown => "Unknown error",
        }
    }

    /// Fixed operator guidance for this class
    pub fn remediation(&self) -> &'static str {
        match self {
            FailureKind::ConfigurationInvalid => {
                "The connection settings are incomplete or inconsistent. Check that a \
                 domain or server name is set, the port is between 1 and 65535, and that \
                 the username and password are either both filled in or both left empty."
            }
            FailureKind::NameResolutionFailed => {
                "The server name could not be resolved. Verify the domain or server name \
                 is spelled correctly, that this machine uses DNS servers that know the \
                 directory domain, and that any VPN required to reach it is connected."
            }
            FailureKind::HostUnreachable => {
                "The host did not answer an echo request. Many networks block ping at the \
                 firewall, so this alone does not prevent a connection; if later checks \
                 also fail, verify routing and that the host is powered on."
            }
            FailureKind::PortUnreachable => {
                "The directory port could not be reached. Confirm the port number (389 for \
                 LDAP, 636 for LDAPS by convention), that the directory service is \
                 listening, and that no firewall between this machine and the server \
                 blocks the port."
            }
            FailureKind::ProtocolHandshakeFailed => {
                "The server accepted the connection but the directory protocol session \
                 could not be established. The service may be down or busy, or the TLS \
                 setting may not match the port; try again later or switch between LDAP \
                 and LDAPS."
            }
            FailureKind::InvalidCredentials => {
                "The directory rejected the username or password. Re-enter the \
                 credentials, check the username format (user@domain or DOMAIN\\user), \
                 and make sure Caps Lock is off."
            }
            FailureKind::AccountLockedOrExpired => {
                "The account is locked, disabled, expired, or its password must be \
                 changed. Contact your directory administrator to unlock or reset the \
                 account before trying again."
            }
            FailureKind::InsufficientPermission => {
                "The account authenticated but may not read the directory. Ask your \
                 directory administrator to grant read access to the search base, or use \
                 an account that has it."
            }
            FailureKind::Timeout => {
                "The server did not respond within the configured timeout. The network \
                 may be slow or the server overloaded; increase the timeout or try again \
                 later."
            }
            FailureKind::Unknown => {
                "An unexpected error occurred. Review the log file for the detailed error \
                 message and contact support if the problem persists."
            }
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// A classified failure with the raw detail preserved for logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedFailure {
    pub kind: FailureKind,
    /// Raw error message from the failing operation
    pub detail: String,
}

impl ClassifiedFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn remediation(&self) -> &'static str {
        self.kind.remediation()
    }
}

impl fmt::Display for ClassifiedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.title(), self.detail)
    }
}

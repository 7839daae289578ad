//! Error classification for diagnostics stages
//!
//! Every network or protocol failure is reduced to a portable signal (an
//! optional numeric result code plus the raw message) and mapped onto the
//! closed [`FailureKind`] taxonomy by table lookup. Table order matters: the
//! first matching row wins, so specific rows come before general ones.

use crate::constants::LDAP_RC_TIMEOUT;
use crate::models::{ClassifiedFailure, FailureKind, Stage};
use std::fmt;
use std::time::Duration;

/// Portable error signal produced by a transport operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    /// Protocol result code (LDAP `rc`), when the server answered
    pub code: Option<u32>,
    pub message: String,
}

impl ProbeFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: u32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Failure for an operation that lost the race against its timer
    ///
    /// Carries the client-side timeout code so the operation name in the
    /// message cannot steer classification.
    pub fn timed_out(operation: &str, after: Duration) -> Self {
        Self::with_code(
            LDAP_RC_TIMEOUT,
            format!("{} timed out after {:?}", operation, after),
        )
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[rc={}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl From<std::io::Error> for ProbeFailure {
    fn from(err: std::io::Error) -> Self {
        ProbeFailure::new(err.to_string())
    }
}

/// Active Directory extended error sub-codes found in bind diagnostics
/// (`... data 775, ...`). Checked before the plain result-code table because
/// they refine LDAP rc 49.
const AD_SUBCODES: &[(&str, FailureKind)] = &[
    ("data 52e", FailureKind::InvalidCredentials),
    ("data 525", FailureKind::InvalidCredentials),
    ("data 530", FailureKind::AccountLockedOrExpired),
    ("data 531", FailureKind::AccountLockedOrExpired),
    ("data 532", FailureKind::AccountLockedOrExpired),
    ("data 533", FailureKind::AccountLockedOrExpired),
    ("data 701", FailureKind::AccountLockedOrExpired),
    ("data 773", FailureKind::AccountLockedOrExpired),
    ("data 775", FailureKind::AccountLockedOrExpired),
];

/// LDAP result codes (RFC 4511 section 4.1.9)
const RESULT_CODES: &[(u32, FailureKind)] = &[
    (2, FailureKind::ProtocolHandshakeFailed),  // protocolError
    (3, FailureKind::Timeout),                  // timeLimitExceeded
    (7, FailureKind::ProtocolHandshakeFailed),  // authMethodNotSupported
    (8, FailureKind::ProtocolHandshakeFailed),  // strongerAuthRequired
    (13, FailureKind::ProtocolHandshakeFailed), // confidentialityRequired
    (32, FailureKind::InsufficientPermission),  // noSuchObject
    (48, FailureKind::InvalidCredentials),      // inappropriateAuthentication
    (49, FailureKind::InvalidCredentials),      // invalidCredentials
    (50, FailureKind::InsufficientPermission),  // insufficientAccessRights
    (51, FailureKind::ProtocolHandshakeFailed), // busy
    (52, FailureKind::ProtocolHandshakeFailed), // unavailable
    (53, FailureKind::ProtocolHandshakeFailed), // unwillingToPerform
    (81, FailureKind::ProtocolHandshakeFailed), // serverDown (client-side)
    (85, FailureKind::Timeout),                 // timeout (client-side)
];

/// Message substrings, matched case-insensitively
const MESSAGE_PATTERNS: &[(&str, FailureKind)] = &[
    // Account state
    ("account locked", FailureKind::AccountLockedOrExpired),
    ("account is locked", FailureKind::AccountLockedOrExpired),
    ("account disabled", FailureKind::AccountLockedOrExpired),
    ("account expired", FailureKind::AccountLockedOrExpired),
    ("password expired", FailureKind::AccountLockedOrExpired),
    ("password must change", FailureKind::AccountLockedOrExpired),
    // Credentials
    ("invalidcredentials", FailureKind::InvalidCredentials),
    ("invalid credentials", FailureKind::InvalidCredentials),
    ("logon failure", FailureKind::InvalidCredentials),
    ("authentication failed", FailureKind::InvalidCredentials),
    // Permissions
    ("insufficientaccessrights", FailureKind::InsufficientPermission),
    ("insufficient access", FailureKind::InsufficientPermission),
    ("access denied", FailureKind::InsufficientPermission),
    ("access is denied", FailureKind::InsufficientPermission),
    ("permission denied", FailureKind::InsufficientPermission),
    ("operations error", FailureKind::InsufficientPermission),
    // Name resolution
    ("failed to lookup address", FailureKind::NameResolutionFailed),
    ("name or service not known", FailureKind::NameResolutionFailed),
    ("no such host", FailureKind::NameResolutionFailed),
    ("nodename nor servname", FailureKind::NameResolutionFailed),
    ("could not resolve", FailureKind::NameResolutionFailed),
    ("no addresses", FailureKind::NameResolutionFailed),
    ("temporary failure in name resolution", FailureKind::NameResolutionFailed),
    // Network and transport
    ("network unreachable", FailureKind::HostUnreachable),
    ("network is unreachable", FailureKind::HostUnreachable),
    ("no route to host", FailureKind::HostUnreachable),
    ("host is down", FailureKind::HostUnreachable),
    ("host unreachable", FailureKind::HostUnreachable),
    ("connection refused", FailureKind::PortUnreachable),
    ("actively refused", FailureKind::PortUnreachable),
    // Protocol
    ("tls", FailureKind::ProtocolHandshakeFailed),
    ("ssl", FailureKind::ProtocolHandshakeFailed),
    ("certificate", FailureKind::ProtocolHandshakeFailed),
    ("handshake", FailureKind::ProtocolHandshakeFailed),
    ("connection reset", FailureKind::ProtocolHandshakeFailed),
    ("broken pipe", FailureKind::ProtocolHandshakeFailed),
    ("server down", FailureKind::ProtocolHandshakeFailed),
    ("unavailable", FailureKind::ProtocolHandshakeFailed),
    ("busy", FailureKind::ProtocolHandshakeFailed),
    ("strongerauthrequired", FailureKind::ProtocolHandshakeFailed),
    ("unwillingtoperform", FailureKind::ProtocolHandshakeFailed),
    // Timing
    ("timed out", FailureKind::Timeout),
    ("timeout", FailureKind::Timeout),
];

/// Map a raw signal onto the taxonomy, ignoring the stage
///
/// Returns [`FailureKind::Unknown`] when no row matches.
pub fn classify_signal(failure: &ProbeFailure) -> FailureKind {
    let lower = failure.message.to_lowercase();

    if let Some((_, kind)) = AD_SUBCODES.iter().find(|(needle, _)| lower.contains(needle)) {
        return *kind;
    }

    if let Some(code) = failure.code {
        if let Some((_, kind)) = RESULT_CODES.iter().find(|(rc, _)| *rc == code) {
            return *kind;
        }
    }

    MESSAGE_PATTERNS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, kind)| *kind)
        .unwrap_or(FailureKind::Unknown)
}

/// Classify a failure that happened in `stage`
///
/// Configuration problems are always [`FailureKind::ConfigurationInvalid`].
/// Unmatched signals fall back to the stage's natural failure class. At the
/// port stage a timeout means the port is filtered, so it is reported as
/// [`FailureKind::PortUnreachable`] rather than [`FailureKind::Timeout`].
pub fn classify(stage: Stage, failure: &ProbeFailure) -> ClassifiedFailure {
    let kind = match (stage, classify_signal(failure)) {
        (Stage::ConfigurationValid, _) => FailureKind::ConfigurationInvalid,
        (Stage::PortOpen, FailureKind::Timeout) => FailureKind::PortUnreachable,
        (Stage::NetworkReachable, _) => FailureKind::HostUnreachable,
        (stage, FailureKind::Unknown) => stage.fallback_failure(),
        (_, kind) => kind,
    };

    ClassifiedFailure::new(kind, failure.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ad_subcode_refines_invalid_credentials() {
        let locked = ProbeFailure::with_code(
            49,
            "80090308: LdapErr: DSID-0C09042A, comment: AcceptSecurityContext error, data 775, v3839",
        );
        assert_eq!(classify_signal(&locked), FailureKind::AccountLockedOrExpired);

        let wrong_password = ProbeFailure::with_code(
            49,
            "80090308: LdapErr: DSID-0C09042A, comment: AcceptSecurityContext error, data 52e, v3839",
        );
        assert_eq!(classify_signal(&wrong_password), FailureKind::InvalidCredentials);
    }

    #[test]
    fn result_codes_map_to_taxonomy() {
        assert_eq!(
            classify_signal(&ProbeFailure::with_code(49, "")),
            FailureKind::InvalidCredentials
        );
        assert_eq!(
            classify_signal(&ProbeFailure::with_code(50, "")),
            FailureKind::InsufficientPermission
        );
        assert_eq!(
            classify_signal(&ProbeFailure::with_code(52, "")),
            FailureKind::ProtocolHandshakeFailed
        );
    }

    #[test]
    fn message_patterns_are_case_insensitive() {
        assert_eq!(
            classify_signal(&ProbeFailure::new("Connection REFUSED (os error 111)")),
            FailureKind::PortUnreachable
        );
        assert_eq!(
            classify_signal(&ProbeFailure::new(
                "failed to lookup address information: Name or service not known"
            )),
            FailureKind::NameResolutionFailed
        );
        assert_eq!(
            classify_signal(&ProbeFailure::new("operation timed out")),
            FailureKind::Timeout
        );
    }

    #[test]
    fn unknown_signal_stays_unknown() {
        assert_eq!(
            classify_signal(&ProbeFailure::new("something odd happened")),
            FailureKind::Unknown
        );
    }

    #[test]
    fn port_stage_timeout_is_port_unreachable() {
        let failure = ProbeFailure::timed_out("connect", Duration::from_secs(2));
        let classified = classify(Stage::PortOpen, &failure);
        assert_eq!(classified.kind, FailureKind::PortUnreachable);
        assert!(classified.detail.contains("timed out"));

        let classified = classify(Stage::Authenticated, &failure);
        assert_eq!(classified.kind, FailureKind::Timeout);

        let handshake = ProbeFailure::timed_out("protocol handshake", Duration::from_secs(2));
        assert_eq!(
            classify(Stage::ProtocolConnected, &handshake).kind,
            FailureKind::Timeout
        );
    }

    #[test]
    fn stage_fallback_applies_to_unknown_signals() {
        let odd = ProbeFailure::new("unexpected EOF");
        assert_eq!(
            classify(Stage::NameResolved, &odd).kind,
            FailureKind::NameResolutionFailed
        );
        assert_eq!(classify(Stage::Authenticated, &odd).kind, FailureKind::Unknown);
        assert_eq!(
            classify(Stage::NetworkReachable, &ProbeFailure::new("100% packet loss")).kind,
            FailureKind::HostUnreachable
        );
    }

    #[test]
    fn configuration_stage_is_always_configuration_invalid() {
        let failure = ProbeFailure::new("Timeout must be greater than zero");
        assert_eq!(
            classify(Stage::ConfigurationValid, &failure).kind,
            FailureKind::ConfigurationInvalid
        );
    }

    #[test]
    fn raw_message_is_preserved() {
        let classified = classify(Stage::QuerySucceeded, &ProbeFailure::with_code(50, "denied"));
        assert_eq!(classified.detail, "[rc=50] denied");
    }
}

//! Platform-specific implementations
//!
//! All OS and network code is isolated here: DPAPI or key-file encryption for
//! the stored credential, the system echo probe, and the LDAP transport.

pub mod ldap;
pub mod ping;
pub mod protect;

pub use ldap::{LdapSession, LdapTransport};
pub use protect::{default_protector, default_secret_store};

#[cfg(windows)]
pub use protect::DpapiProtector;
#[cfg(not(windows))]
pub use protect::KeyFileProtector;

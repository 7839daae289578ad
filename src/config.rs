//! Directory connection settings
//!
//! Read from `settings.json` in the application-data directory, then
//! overridden by `DIRPROBE_*` environment variables. A missing file means
//! defaults. The password field is accepted on load (for unattended service
//! accounts) but never written back.

use crate::constants::{DEFAULT_LDAPS_PORT, DEFAULT_LDAP_PORT, DEFAULT_TIMEOUT_SECS};
use crate::models::{Credentials, DiagnosticTarget};
use crate::utils::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const ENV_DOMAIN: &str = "DIRPROBE_DOMAIN";
pub const ENV_SERVER: &str = "DIRPROBE_SERVER";
pub const ENV_PORT: &str = "DIRPROBE_PORT";
pub const ENV_USE_TLS: &str = "DIRPROBE_USE_TLS";
pub const ENV_TIMEOUT_SECS: &str = "DIRPROBE_TIMEOUT_SECS";
pub const ENV_USERNAME: &str = "DIRPROBE_USERNAME";
pub const ENV_PASSWORD: &str = "DIRPROBE_PASSWORD";
pub const ENV_BASE_DN: &str = "DIRPROBE_BASE_DN";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub domain: String,
    /// Explicit server; overrides `domain` for connecting
    pub server: Option<String>,
    /// Defaults to 389, or 636 when `use_tls` is set
    pub port: Option<u16>,
    pub use_tls: bool,
    pub timeout_secs: u64,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub base_dn: Option<String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            server: None,
            port: None,
            use_tls: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            username: None,
            password: None,
            base_dn: None,
        }
    }
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("domain", &self.domain)
            .field("server", &self.server)
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .field("timeout_secs", &self.timeout_secs)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("base_dn", &self.base_dn)
            .finish()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
    })
}

impl DirectoryConfig {
    /// Load from the default settings file and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = crate::paths::settings_file().ok_or(ConfigError::NoDataDir)?;
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => {
                debug!(path = %path.display(), "Loaded settings");
                Ok(serde_json::from_str(&text)?)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply `DIRPROBE_*` overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_DOMAIN) {
            self.domain = v;
        }
        if let Some(v) = lookup(ENV_SERVER) {
            self.server = Some(v);
        }
        if let Some(v) = lookup(ENV_PORT) {
            self.port = Some(parse_number(ENV_PORT, &v)?);
        }
        if let Some(v) = lookup(ENV_USE_TLS) {
            self.use_tls = parse_bool(ENV_USE_TLS, &v)?;
        }
        if let Some(v) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = parse_number(ENV_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = lookup(ENV_USERNAME) {
            self.username = Some(v);
        }
        if let Some(v) = lookup(ENV_PASSWORD) {
            self.password = Some(v);
        }
        if let Some(v) = lookup(ENV_BASE_DN) {
            self.base_dn = Some(v);
        }
        Ok(())
    }

    /// Write pretty JSON to the default settings file
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = crate::paths::settings_file().ok_or(ConfigError::NoDataDir)?;
        self.save_to(&path)
    }

    /// Write pretty JSON to `path`; the password is never written
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn effective_port(&self) -> u16 {
        match self.port {
            Some(port) => port,
            None if self.use_tls => DEFAULT_LDAPS_PORT,
            None => DEFAULT_LDAP_PORT,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Service account from configuration, when both parts are present
    pub fn static_credentials(&self) -> Option<Credentials> {
        let username = non_blank(&self.username)?;
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        Credentials::from_parts(username, password).ok()
    }

    /// Immutable target for one diagnostics run
    ///
    /// A half-configured service account (only one of username or password) is
    /// carried along so stage-1 validation reports it, whatever `credentials`
    /// holds.
    pub fn target(&self, credentials: Option<Credentials>) -> DiagnosticTarget {
        let mut target = DiagnosticTarget::new(self.domain.trim(), self.effective_port())
            .with_tls(self.use_tls)
            .with_timeout(self.timeout());

        if let Some(server) = non_blank(&self.server) {
            target = target.with_server(server);
        }
        if let Some(base_dn) = non_blank(&self.base_dn) {
            target = target.with_base_dn(base_dn);
        }

        let has_user = non_blank(&self.username).is_some();
        let has_password = self.password.as_deref().is_some_and(|p| !p.is_empty());
        if has_user != has_password {
            target.partial_identity = Some(non_blank(&self.username).unwrap_or_default().to_string());
        }

        target.with_credentials(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_file_gives_defaults() {
        let temp = tempdir().expect("tempdir");
        let config = DirectoryConfig::load_from(&temp.path().join("settings.json")).unwrap();

        assert_eq!(config, DirectoryConfig::default());
        assert_eq!(config.effective_port(), 389);
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn tls_switches_default_port_only_when_unset() {
        let mut config = DirectoryConfig {
            use_tls: true,
            ..DirectoryConfig::default()
        };
        assert_eq!(config.effective_port(), 636);

        config.port = Some(3269);
        assert_eq!(config.effective_port(), 3269);
    }

    #[test]
    fn malformed_json_is_error() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            DirectoryConfig::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn save_never_writes_password() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("settings.json");
        let config = DirectoryConfig {
            domain: "corp.local".to_string(),
            username: Some("svc-reader".to_string()),
            password: Some("hunter22".to_string()),
            ..DirectoryConfig::default()
        };

        config.save_to(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("hunter22"));
        assert!(!text.contains("password"));

        let loaded = DirectoryConfig::load_from(&path).unwrap();
        assert_eq!(loaded.domain, "corp.local");
        assert_eq!(loaded.password, None);
        assert!(!format!("{:?}", config).contains("hunter22"));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = DirectoryConfig {
            domain: "file.local".to_string(),
            ..DirectoryConfig::default()
        };
        config
            .apply_overrides(lookup(&[
                (ENV_DOMAIN, "env.local"),
                (ENV_SERVER, "dc02.env.local"),
                (ENV_USE_TLS, "true"),
                (ENV_TIMEOUT_SECS, "3"),
            ]))
            .unwrap();

        assert_eq!(config.domain, "env.local");
        assert_eq!(config.server.as_deref(), Some("dc02.env.local"));
        assert_eq!(config.effective_port(), 636);
        assert_eq!(config.timeout_secs, 3);
    }

    #[test]
    fn unparsable_environment_values_are_errors() {
        for (name, value) in [(ENV_PORT, "ninety"), (ENV_PORT, "70000"), (ENV_USE_TLS, "maybe")] {
            let mut config = DirectoryConfig::default();
            let err = config.apply_overrides(lookup(&[(name, value)])).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidEnv { .. }), "{}={}", name, value);
        }
    }

    #[test]
    fn static_credentials_need_both_parts() {
        let mut config = DirectoryConfig {
            username: Some("svc-reader".to_string()),
            ..DirectoryConfig::default()
        };
        assert!(config.static_credentials().is_none());

        config.password = Some("s3rvice".to_string());
        let creds = config.static_credentials().unwrap();
        assert_eq!(creds.identity().as_str(), "svc-reader");
    }

    #[test]
    fn target_snapshot_reflects_config() {
        let config = DirectoryConfig {
            domain: "corp.local".to_string(),
            server: Some("dc01.corp.local".to_string()),
            use_tls: true,
            timeout_secs: 7,
            base_dn: Some("OU=Staff,DC=corp,DC=local".to_string()),
            ..DirectoryConfig::default()
        };
        let creds = Credentials::from_parts("alice", "pw").unwrap();
        let target = config.target(Some(creds.clone()));

        assert_eq!(target.host(), "dc01.corp.local");
        assert_eq!(target.port, 636);
        assert!(target.use_tls);
        assert_eq!(target.timeout, Duration::from_secs(7));
        assert_eq!(target.credentials, Some(creds));
        assert_eq!(target.search_base().as_deref(), Some("OU=Staff,DC=corp,DC=local"));
        assert!(target.validate().is_empty());
    }

    #[test]
    fn half_configured_account_fails_validation() {
        let config = DirectoryConfig {
            domain: "corp.local".to_string(),
            password: Some("orphan".to_string()),
            ..DirectoryConfig::default()
        };

        let target = config.target(None);
        assert_eq!(target.partial_identity.as_deref(), Some(""));
        assert_eq!(target.validate().len(), 1);
    }

    #[test]
    fn half_configured_account_fails_validation_with_cached_credential() {
        let config = DirectoryConfig {
            domain: "corp.local".to_string(),
            username: Some("svc-reader".to_string()),
            ..DirectoryConfig::default()
        };
        let cached = Credentials::from_parts("alice", "from-cache").unwrap();

        let target = config.target(Some(cached));
        assert!(target.credentials.is_some());
        assert_eq!(target.partial_identity.as_deref(), Some("svc-reader"));
        assert_eq!(
            target.validate(),
            vec!["Identity and secret must be supplied together or both left empty".to_string()]
        );
    }
}

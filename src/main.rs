//! `dirprobe` command-line host
//!
//! Exit codes: 0 success, 1 failure or exhausted sign-in, 2 configuration error.

mod console;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use console::ConsoleCollector;
use dirprobe::core::{BootstrapRun, SecretStore};
use dirprobe::platform::{default_secret_store, LdapTransport};
use dirprobe::{
    logger, BootstrapAuthenticator, BootstrapOptions, BootstrapOutcome, CredentialCache,
    DiagnosticReport, DiagnosticsEngine, DirectoryConfig, FailureKind, Stage,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[derive(Parser)]
#[command(name = "dirprobe", version)]
#[command(about = "Directory service connection diagnostics and credential bootstrap")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all diagnostics stages against the configured directory
    Diagnose(DiagnoseArgs),
    /// Write connection settings to the settings file
    Configure(ConfigureArgs),
    /// Sign in interactively and cache the accepted credential
    Login {
        /// Require the representative query to pass as well
        #[arg(long)]
        deep: bool,
    },
    /// Remove the cached credential
    Logout,
    /// Show whether a credential is cached
    Status,
}

/// Connection settings shared by `diagnose` and `configure`
#[derive(Args, Debug)]
struct TargetArgs {
    /// Server to contact instead of the domain name
    #[arg(long)]
    server: Option<String>,
    #[arg(long)]
    domain: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Use LDAP over TLS
    #[arg(long)]
    tls: bool,
    /// Per-operation timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl TargetArgs {
    fn apply(&self, config: &mut DirectoryConfig) {
        if let Some(domain) = &self.domain {
            config.domain = domain.clone();
        }
        if let Some(server) = &self.server {
            config.server = Some(server.clone());
        }
        if let Some(port) = self.port {
            config.port = Some(port);
        }
        if self.tls {
            config.use_tls = true;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
    }
}

#[derive(Args, Debug)]
struct DiagnoseArgs {
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
    #[command(flatten)]
    target: TargetArgs,
}

#[derive(Args, Debug)]
struct ConfigureArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Service account for unattended use; the password is only read from
    /// the environment
    #[arg(long)]
    username: Option<String>,
    /// Search base for the representative query
    #[arg(long)]
    base_dn: Option<String>,
}

impl ConfigureArgs {
    fn apply(&self, config: &mut DirectoryConfig) {
        self.target.apply(config);
        if let Some(username) = &self.username {
            config.username = Some(username.clone());
        }
        if let Some(base_dn) = &self.base_dn {
            config.base_dn = Some(base_dn.clone());
        }
    }
}

fn open_cache(config: &DirectoryConfig) -> anyhow::Result<Arc<CredentialCache>> {
    let store = default_secret_store().context("Failed to open credential store")?;
    Ok(Arc::new(CredentialCache::new(
        Arc::new(store),
        config.static_credentials(),
    )))
}

fn engine() -> Arc<DiagnosticsEngine> {
    Arc::new(DiagnosticsEngine::new(Arc::new(LdapTransport::new())))
}

fn report_exit_code(report: &DiagnosticReport) -> ExitCode {
    if report.succeeded_through(Stage::QuerySucceeded) {
        ExitCode::SUCCESS
    } else if report.failure().map(|f| f.kind) == Some(FailureKind::ConfigurationInvalid) {
        ExitCode::from(EXIT_CONFIG)
    } else {
        ExitCode::from(EXIT_FAILURE)
    }
}

async fn diagnose(args: DiagnoseArgs) -> anyhow::Result<ExitCode> {
    let mut config = DirectoryConfig::load()?;
    args.target.apply(&mut config);

    let cache = open_cache(&config)?;
    let target = config.target(cache.get());
    let report = engine().run(&target).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(report_exit_code(&report))
}

fn configure(args: ConfigureArgs) -> anyhow::Result<ExitCode> {
    let path = dirprobe::paths::settings_file().ok_or(dirprobe::ConfigError::NoDataDir)?;
    // Start from the file alone so environment overrides are not persisted
    let mut config = DirectoryConfig::load_from(&path)?;
    args.apply(&mut config);
    config.save()?;
    info!(path = %path.display(), "Settings saved");

    println!("Settings written to {}", path.display());
    for problem in config.target(None).validate() {
        println!("Warning: {}", problem);
    }
    Ok(ExitCode::SUCCESS)
}

async fn login(deep: bool) -> anyhow::Result<ExitCode> {
    let config = DirectoryConfig::load()?;
    let cache = open_cache(&config)?;

    let authenticator = BootstrapAuthenticator::new(engine(), cache, Arc::new(ConsoleCollector))
        .with_options(BootstrapOptions {
            deep_diagnostics: deep,
            ..BootstrapOptions::default()
        });
    let BootstrapRun { outcome, states } = authenticator.run(&config.target(None)).await;
    info!(states = ?states, "Bootstrap finished");

    match outcome {
        BootstrapOutcome::Success {
            identity, report, ..
        } => {
            print!("{}", report.render_text());
            println!("Signed in as {}", identity);
            Ok(ExitCode::SUCCESS)
        }
        BootstrapOutcome::Exhausted {
            attempts,
            last_report,
        } => {
            if let Some(report) = last_report {
                print!("{}", report.render_text());
            }
            println!("Sign-in not completed after {} attempt(s).", attempts);
            if let Some(path) = dirprobe::paths::settings_file() {
                println!("Check the connection settings in {}", path.display());
            }
            Ok(ExitCode::from(EXIT_FAILURE))
        }
        BootstrapOutcome::ConfigurationInvalid { report } => {
            print!("{}", report.render_text());
            Ok(ExitCode::from(EXIT_CONFIG))
        }
    }
}

fn logout() -> anyhow::Result<ExitCode> {
    let store = default_secret_store().context("Failed to open credential store")?;
    store.delete()?;
    println!("Cached credential removed.");
    Ok(ExitCode::SUCCESS)
}

fn status() -> anyhow::Result<ExitCode> {
    let store = default_secret_store().context("Failed to open credential store")?;
    println!("Credential file: {}", store.path().display());
    match store.try_load() {
        Some(credentials) => println!("Cached identity: {}", credentials.identity()),
        None => println!("No usable cached credential."),
    }
    Ok(ExitCode::SUCCESS)
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Diagnose(args) => diagnose(args).await,
        Command::Configure(args) => configure(args),
        Command::Login { deep } => login(deep).await,
        Command::Logout => logout(),
        Command::Status => status(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init_logging();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "Command failed");
            eprintln!("Error: {:#}", err);
            if err.downcast_ref::<dirprobe::ConfigError>().is_some() {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::from(EXIT_FAILURE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dirprobe").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn configure_arguments_are_written_to_settings() {
        let cli = parse(&[
            "configure",
            "--domain",
            "corp.local",
            "--server",
            "dc01.corp.local",
            "--tls",
            "--timeout",
            "15",
            "--username",
            "svc-reader",
            "--base-dn",
            "OU=Servers,DC=corp,DC=local",
        ]);
        let Command::Configure(args) = cli.command else {
            panic!("expected the configure command");
        };

        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("settings.json");
        let mut config = DirectoryConfig::load_from(&path).unwrap();
        args.apply(&mut config);
        config.save_to(&path).unwrap();

        let saved = DirectoryConfig::load_from(&path).unwrap();
        assert_eq!(saved.domain, "corp.local");
        assert_eq!(saved.server.as_deref(), Some("dc01.corp.local"));
        assert!(saved.use_tls);
        assert_eq!(saved.effective_port(), 636);
        assert_eq!(saved.timeout_secs, 15);
        assert_eq!(saved.username.as_deref(), Some("svc-reader"));
        assert_eq!(saved.base_dn.as_deref(), Some("OU=Servers,DC=corp,DC=local"));
    }

    #[test]
    fn configure_keeps_unmentioned_settings() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("settings.json");
        let existing = DirectoryConfig {
            domain: "corp.local".to_string(),
            port: Some(3268),
            ..DirectoryConfig::default()
        };
        existing.save_to(&path).unwrap();

        let Command::Configure(args) = parse(&["configure", "--timeout", "20"]).command else {
            panic!("expected the configure command");
        };
        let mut config = DirectoryConfig::load_from(&path).unwrap();
        args.apply(&mut config);

        assert_eq!(config.domain, "corp.local");
        assert_eq!(config.port, Some(3268));
        assert_eq!(config.timeout_secs, 20);
    }

    #[test]
    fn diagnose_shares_connection_flags() {
        let Command::Diagnose(args) = parse(&["diagnose", "--json", "--port", "3269"]).command else {
            panic!("expected the diagnose command");
        };
        assert!(args.json);

        let mut config = DirectoryConfig::default();
        args.target.apply(&mut config);
        assert_eq!(config.port, Some(3269));
    }
}

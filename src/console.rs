//! Terminal credential collector for the `login` command

use async_trait::async_trait;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password};
use dirprobe::core::{CollectOutcome, CredentialCollector, CredentialPrompt};
use dirprobe::Credentials;
use tracing::warn;
use zeroize::Zeroizing;

/// Prompts on the terminal; an empty username or password cancels
pub struct ConsoleCollector;

fn prompt_credentials(prompt: &CredentialPrompt) -> Result<Option<Credentials>, dialoguer::Error> {
    let theme = ColorfulTheme::default();

    eprintln!();
    eprintln!(
        "{} (attempt {} of {})",
        prompt.title, prompt.attempt, prompt.max_attempts
    );
    eprintln!("{}", prompt.message);

    loop {
        let mut input = Input::<String>::with_theme(&theme)
            .with_prompt("Username (DOMAIN\\user, user@domain or DN)")
            .allow_empty(true);
        if let Some(suggested) = &prompt.suggested_identity {
            input = input.with_initial_text(suggested.clone());
        }
        let username = input.interact_text()?;
        if username.trim().is_empty() {
            return Ok(None);
        }

        let password = Zeroizing::new(
            Password::with_theme(&theme)
                .with_prompt("Password")
                .allow_empty_password(true)
                .interact()?,
        );
        if password.is_empty() {
            return Ok(None);
        }

        match Credentials::from_parts(&username, &password) {
            Ok(credentials) => return Ok(Some(credentials)),
            Err(e) => eprintln!("{}", e),
        }
    }
}

fn prompt_retry(title: &str, detail: &str) -> Result<bool, dialoguer::Error> {
    eprintln!();
    eprintln!("{}", title);
    eprintln!("{}", detail);

    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Try again?")
        .default(true)
        .interact()
}

#[async_trait]
impl CredentialCollector for ConsoleCollector {
    async fn collect(&self, prompt: &CredentialPrompt) -> CollectOutcome {
        let prompt = prompt.clone();
        match tokio::task::spawn_blocking(move || prompt_credentials(&prompt)).await {
            Ok(Ok(Some(credentials))) => CollectOutcome::Provided(credentials),
            Ok(Ok(None)) => CollectOutcome::Cancelled,
            Ok(Err(e)) => {
                warn!(error = %e, "Credential prompt failed");
                CollectOutcome::Cancelled
            }
            Err(e) => {
                warn!(error = %e, "Credential prompt task failed");
                CollectOutcome::Cancelled
            }
        }
    }

    async fn confirm_retry(&self, title: &str, detail: &str) -> bool {
        let title = title.to_string();
        let detail = detail.to_string();
        match tokio::task::spawn_blocking(move || prompt_retry(&title, &detail)).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                warn!(error = %e, "Retry prompt failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "Retry prompt task failed");
                false
            }
        }
    }
}

//! Where the portal username and password come from.

use std::fmt;

use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password};

use crate::error::{PortalError, Result};

pub const USERNAME_ENV: &str = "PUSHCERT_USERNAME";
pub const PASSWORD_ENV: &str = "PUSHCERT_PASSWORD";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub trait CredentialProvider: Send + Sync {
    fn credentials(&self) -> Result<Credentials>;
}

/// Credentials already known to the caller.
#[derive(Debug, Clone)]
pub struct StaticCredentials(Credentials);

impl StaticCredentials {
    pub fn new(credentials: Credentials) -> Self {
        Self(credentials)
    }
}

impl CredentialProvider for StaticCredentials {
    fn credentials(&self) -> Result<Credentials> {
        Ok(self.0.clone())
    }
}

/// Reads `PUSHCERT_USERNAME` / `PUSHCERT_PASSWORD`, prompting for whatever is
/// missing when a terminal is attached.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialProvider {
    username: Option<String>,
}

impl EnvCredentialProvider {
    /// `username` takes precedence over `PUSHCERT_USERNAME`.
    pub fn new(username: Option<String>) -> Self {
        Self { username }
    }

    fn interactive() -> bool {
        console::user_attended()
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn credentials(&self) -> Result<Credentials> {
        let username = match self
            .username
            .clone()
            .or_else(|| non_empty_env(USERNAME_ENV).map(|v| v.trim().to_string()))
        {
            Some(username) => username,
            None if Self::interactive() => Input::<String>::with_theme(&prompt_theme())
                .with_prompt("Apple ID")
                .interact_text()
                .map_err(|e| PortalError::Prompt(e.to_string()))?,
            None => {
                return Err(PortalError::Config(format!(
                    "No username given. Pass --username or set {}",
                    USERNAME_ENV
                )))
            }
        };

        let password = match non_empty_env(PASSWORD_ENV) {
            Some(password) => password,
            None if Self::interactive() => Password::with_theme(&prompt_theme())
                .with_prompt(format!("Password for {}", username))
                .interact()
                .map_err(|e| PortalError::Prompt(e.to_string()))?,
            None => {
                return Err(PortalError::Config(format!(
                    "No password given for {}. Set {}",
                    username, PASSWORD_ENV
                )))
            }
        };

        Ok(Credentials::new(username, password))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Theme shared by every interactive prompt.
pub(crate) fn prompt_theme() -> ColorfulTheme {
    ColorfulTheme {
        prompt_prefix: style("?".to_string()).for_stderr().cyan(),
        success_prefix: style("✓".to_string()).for_stderr().green(),
        ..ColorfulTheme::default()
    }
}

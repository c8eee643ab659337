use colored::Colorize;
use dialoguer::Input;

use super::PortalSession;
use crate::browser::{PortalDriver, SelectOption};
use crate::credentials::{prompt_theme, Credentials};
use crate::error::{PortalError, Result};

/// A team offered by the portal's team picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl Team {
    /// `name` or `name (description)`
    pub fn label(&self) -> String {
        match self.description {
            Some(ref description) => format!("{} ({})", self.name, description),
            None => self.name.clone(),
        }
    }
}

/// Teams in the order the picker renders them.
///
/// The option value is the team id; the picker shows it next to the name as
/// its description when present.
pub fn teams_from_options(options: Vec<SelectOption>) -> Vec<Team> {
    options
        .into_iter()
        .map(|option| {
            let value = option.value.trim().to_string();
            Team {
                description: (!value.is_empty()).then(|| value.clone()),
                id: value,
                name: option.text,
            }
        })
        .collect()
}

/// `\t<k>. <label>` for every team, 1-based.
pub fn format_team_list(teams: &[Team]) -> Vec<String> {
    teams
        .iter()
        .enumerate()
        .map(|(index, team)| format!("\t{}. {}", index + 1, team.label()))
        .collect()
}

/// Team for a 1-based operator choice.
pub fn resolve_choice(teams: &[Team], choice: usize) -> Result<&Team> {
    choice
        .checked_sub(1)
        .and_then(|index| teams.get(index))
        .ok_or_else(|| {
            PortalError::login(format!(
                "Team number {} is not one of the {} listed teams",
                choice,
                teams.len()
            ))
        })
}

/// Asks the operator which team to use.
pub trait TeamPrompt: Send + Sync {
    /// Returns a 1-based index into `teams`.
    fn choose(&self, teams: &[Team]) -> Result<usize>;
}

/// Lists the teams on the terminal and reads a number.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalTeamPrompt;

impl TeamPrompt for TerminalTeamPrompt {
    fn choose(&self, teams: &[Team]) -> Result<usize> {
        println!(
            "{}",
            "You can store your preferred team using the environment variable `PUSHCERT_TEAM_ID`"
                .green()
        );
        println!("{}", "Your ID belongs to the following teams:".green());
        for line in format_team_list(teams) {
            println!("{}", line.green());
        }

        Input::<usize>::with_theme(&prompt_theme())
            .with_prompt("Please select the team number you would like to access")
            .interact_text()
            .map_err(|e| PortalError::Prompt(e.to_string()))
    }
}

/// What the portal rendered after the credentials were submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterSignIn {
    TeamPicker,
    Landing,
}

impl<D: PortalDriver> PortalSession<D> {
    /// Log in, resolving the team for multi-team accounts.
    ///
    /// Missing `user`/`password` come from the credential provider. Calling
    /// this on an authenticated session is a no-op success.
    pub async fn login(&mut self, user: Option<&str>, password: Option<&str>) -> Result<()> {
        let result = self.sign_in(user, password).await;
        self.finish(result).await
    }

    /// Log in unless this session already is.
    pub(super) async fn sign_in(&mut self, user: Option<&str>, password: Option<&str>) -> Result<()> {
        if self.authenticated {
            tracing::debug!("Session already authenticated");
            return Ok(());
        }

        tracing::info!("Login into the developer portal");
        let credentials = self.resolve_credentials(user, password)?;

        if self.run_login(&credentials).await? {
            tracing::info!("Already logged in");
        } else {
            tracing::info!("Login successful");
        }
        self.authenticated = true;
        Ok(())
    }

    /// Log in with the provider's credentials unless already authenticated.
    pub(super) async fn ensure_logged_in(&mut self) -> Result<()> {
        self.sign_in(None, None).await
    }

    fn resolve_credentials(&self, user: Option<&str>, password: Option<&str>) -> Result<Credentials> {
        match (user, password) {
            (Some(user), Some(password)) => Ok(Credentials::new(user, password)),
            (user, password) => {
                let stored = self.credentials.credentials()?;
                Ok(Credentials::new(
                    user.unwrap_or(stored.username.as_str()),
                    password.unwrap_or(stored.password.as_str()),
                ))
            }
        }
    }

    /// Returns `true` when the portal was already signed in.
    async fn run_login(&self, credentials: &Credentials) -> Result<bool> {
        let s = self.selectors();
        let driver = &self.driver;

        if !driver.navigate(&self.config.portal.base_url).await? {
            return Err(PortalError::general("Could not open Developer Center"));
        }

        self.waiter
            .wait_for(driver, &s.sign_in_button, "sign-in button on the portal root")
            .await?;
        driver.click(&s.sign_in_button, 0).await?;

        // A signed-in browser skips the password prompt and lists the apps
        let signed_in = self
            .waiter
            .poll(|| async move {
                if driver.has_text(&s.signed_in_text).await.unwrap_or(false) {
                    return Some(true);
                }
                match driver.count(&s.password_field).await {
                    Ok(n) if n > 0 => Some(false),
                    _ => None,
                }
            })
            .await;
        match signed_in {
            Some(true) => return Ok(true),
            Some(false) => {}
            None => {
                self.waiter
                    .wait_for(driver, &s.password_field, "password prompt")
                    .await?;
            }
        }

        driver.fill(&s.username_field, &credentials.username).await?;
        driver.fill(&s.password_field, &credentials.password).await?;
        driver.click(&s.sign_in_submit, 0).await?;

        let wrong_password = || {
            PortalError::login(format!(
                "Error logging in user {} with the given password. Make sure you entered them correctly.",
                credentials.username
            ))
        };

        match self.after_sign_in().await {
            Some(AfterSignIn::Landing) => return Ok(false),
            Some(AfterSignIn::TeamPicker) => {}
            None => return Err(wrong_password()),
        }

        if let Err(e) = self.select_team().await {
            tracing::debug!("Team selection failed: {}", e);
            if e.is_login() {
                return Err(e);
            }
            return Err(PortalError::login(format!(
                "Error logging in user {}. User is on multiple teams and we were unable to correctly retrieve them.",
                credentials.username
            )));
        }

        if let Err(e) = self
            .waiter
            .wait_for(driver, &s.authenticated_marker, "authenticated landing page")
            .await
        {
            tracing::debug!("{}", e);
            return Err(wrong_password());
        }

        Ok(false)
    }

    /// Wait for either the team picker or the landing page. `None` means the
    /// portal stayed on the sign-in form.
    async fn after_sign_in(&self) -> Option<AfterSignIn> {
        let s = self.selectors();
        let driver = &self.driver;

        self.waiter
            .poll(|| async move {
                if driver.has_text(&s.team_picker_text).await.unwrap_or(false)
                    && driver.count(&s.team_select).await.unwrap_or(0) > 0
                {
                    return Some(AfterSignIn::TeamPicker);
                }
                if driver.count(&s.authenticated_marker).await.unwrap_or(0) > 0 {
                    return Some(AfterSignIn::Landing);
                }
                None
            })
            .await
    }

    async fn select_team(&self) -> Result<()> {
        let s = self.selectors();
        let driver = &self.driver;

        let team_id = match self.config.team_id() {
            Some(team_id) => team_id.to_string(),
            None => {
                self.waiter
                    .wait_for(driver, &s.team_options, "team picker options")
                    .await?;
                let teams = teams_from_options(driver.select_options(&s.team_select).await?);
                let choice = self.team_prompt.choose(&teams)?;
                resolve_choice(&teams, choice)?.id.clone()
            }
        };

        tracing::info!("Selecting team {}", team_id);
        driver.select_value(&s.team_select, &team_id).await?;
        self.waiter
            .wait_for(driver, &s.team_submit, "team selection confirmation")
            .await?;
        driver.click(&s.team_submit, 0).await
    }
}

//! Scripted stand-in for the portal as seen through a browser.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::download::CertificateDownloader;
use super::login::{Team, TeamPrompt};
use crate::browser::{BrowserCookie, PortalDriver, SelectOption};
use crate::config::Selectors;
use crate::error::{PortalError, Result};

pub const DOWNLOAD_HREF: &str =
    "/account/ios/certificate/certificateContentDownload.action?certificateId=CERT1";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Blank,
    Root,
    SignIn,
    TeamPicker,
    Landing,
    AppList,
    AppDetail,
    AppEdit,
    WizardIntro,
    WizardUpload,
    Generating,
}

#[derive(Debug)]
pub struct FakeState {
    pub page: Page,

    // Scenario
    pub navigation_ok: bool,
    pub already_signed_in: bool,
    pub password: String,
    pub teams: Vec<SelectOption>,
    pub apps: Vec<String>,
    pub push_enabled: bool,
    pub production_slot: bool,
    pub development_slot: bool,
    pub loading_polls: usize,
    /// Empty polls before anything renders on the current page
    pub render_after: usize,
    pub failing_queries: usize,
    pub screenshot_fails: bool,

    // Recording
    pub count_calls: usize,
    pub navigations: Vec<String>,
    pub fills: Vec<(String, String)>,
    pub clicks: Vec<String>,
    /// Index of every wizard submit click
    pub wizard_clicks: Vec<usize>,
    pub selected_team: Option<String>,
    pub uploaded: Option<PathBuf>,
    pub screenshots: usize,
    entered_password: Option<String>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            page: Page::Blank,
            navigation_ok: true,
            already_signed_in: false,
            password: "secret".to_string(),
            teams: Vec::new(),
            apps: vec!["com.example.app".to_string()],
            push_enabled: true,
            production_slot: true,
            development_slot: true,
            loading_polls: 2,
            render_after: 0,
            failing_queries: 0,
            screenshot_fails: false,
            count_calls: 0,
            navigations: Vec::new(),
            fills: Vec::new(),
            clicks: Vec::new(),
            wizard_clicks: Vec::new(),
            selected_team: None,
            uploaded: None,
            screenshots: 0,
            entered_password: None,
        }
    }
}

impl FakeState {
    fn matches(&mut self, selector: &str) -> usize {
        let s = Selectors::default();

        if let Some(app) = selector
            .strip_prefix("//td[@title='")
            .and_then(|rest| rest.strip_suffix("']"))
        {
            if self.page != Page::AppList {
                return 0;
            }
            return self.apps.iter().filter(|a| *a == app).count();
        }

        if selector == s.loading_indicator {
            if self.page != Page::Generating || self.loading_polls == 0 {
                return 0;
            }
            self.loading_polls -= 1;
            return 1;
        }

        let on = |page: Page, present: bool| usize::from(self.page == page && present);

        if selector == s.sign_in_button {
            on(Page::Root, true)
        } else if selector == s.username_field
            || selector == s.password_field
            || selector == s.sign_in_submit
        {
            on(Page::SignIn, true)
        } else if selector == s.team_select || selector == s.team_submit {
            on(Page::TeamPicker, true)
        } else if selector == s.team_options {
            if self.page == Page::TeamPicker {
                self.teams.len()
            } else {
                0
            }
        } else if selector == s.authenticated_marker {
            on(Page::Landing, true)
        } else if selector == s.edit_button {
            on(Page::AppDetail, true)
        } else if selector == s.detail_panel || selector == s.push_toggle {
            on(Page::AppEdit, true)
        } else if selector == s.create_production {
            on(Page::AppEdit, self.production_slot)
        } else if selector == s.create_development {
            on(Page::AppEdit, self.development_slot)
        } else if selector == s.wizard_next {
            // A hidden leftover from the edit page precedes the live button
            if matches!(self.page, Page::WizardIntro | Page::WizardUpload) {
                2
            } else {
                0
            }
        } else if selector == s.upload_field
            || selector == s.wizard_back
            || selector == s.file_input
        {
            on(Page::WizardUpload, true)
        } else if selector == s.download_button {
            on(Page::Generating, self.loading_polls == 0)
        } else {
            0
        }
    }

    fn text(&self) -> &'static str {
        match self.page {
            Page::TeamPicker => "Select Your Team",
            Page::Landing => "My Apps",
            _ => "",
        }
    }

    fn click(&mut self, selector: &str, index: usize) -> Result<()> {
        let s = Selectors::default();
        let found = self.matches_without_side_effects(selector);
        if index >= found {
            return Err(PortalError::general(format!(
                "fake: nothing to click at {selector}[{index}]"
            )));
        }
        self.clicks.push(selector.to_string());

        if selector == s.wizard_next {
            self.wizard_clicks.push(index);
            if index + 1 < found {
                return Ok(());
            }
        }

        let next = match self.page.clone() {
            Page::Root if selector == s.sign_in_button => {
                if self.already_signed_in {
                    Page::Landing
                } else {
                    Page::SignIn
                }
            }
            Page::SignIn if selector == s.sign_in_submit => {
                if self.entered_password.as_deref() != Some(self.password.as_str()) {
                    Page::SignIn
                } else if self.teams.len() > 1 {
                    Page::TeamPicker
                } else {
                    Page::Landing
                }
            }
            Page::TeamPicker if selector == s.team_submit && self.selected_team.is_some() => {
                Page::Landing
            }
            Page::AppList => Page::AppDetail,
            Page::AppDetail if selector == s.edit_button => Page::AppEdit,
            Page::AppEdit if selector == s.push_toggle => {
                self.push_enabled = !self.push_enabled;
                Page::AppEdit
            }
            Page::AppEdit => Page::WizardIntro,
            Page::WizardIntro => Page::WizardUpload,
            Page::WizardUpload if self.uploaded.is_some() => Page::Generating,
            other => other,
        };
        self.page = next;
        Ok(())
    }

    fn matches_without_side_effects(&mut self, selector: &str) -> usize {
        let polls = self.loading_polls;
        let n = self.matches(selector);
        self.loading_polls = polls;
        n
    }
}

#[derive(Debug, Default)]
pub struct FakeDriver {
    state: Mutex<FakeState>,
}

impl FakeDriver {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl PortalDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<bool> {
        let mut state = self.state();
        state.navigations.push(url.to_string());
        if !state.navigation_ok {
            return Ok(false);
        }
        state.page = if url.contains("bundleList") {
            Page::AppList
        } else {
            Page::Root
        };
        Ok(true)
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let mut state = self.state();
        state.count_calls += 1;
        if state.failing_queries > 0 {
            state.failing_queries -= 1;
            return Err(PortalError::JavaScriptError(
                "Execution context was destroyed".to_string(),
            ));
        }
        if state.render_after > 0 {
            state.render_after -= 1;
            return Ok(0);
        }
        Ok(state.matches(selector))
    }

    async fn click(&self, selector: &str, index: usize) -> Result<()> {
        self.state().click(selector, index)
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let mut state = self.state();
        if state.matches_without_side_effects(selector) == 0 {
            return Err(PortalError::general(format!("fake: no field {selector}")));
        }
        if selector == Selectors::default().password_field {
            state.entered_password = Some(value.to_string());
        }
        state.fills.push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn attribute(
        &self,
        selector: &str,
        _index: usize,
        name: &str,
    ) -> Result<Option<String>> {
        let mut state = self.state();
        if selector == Selectors::default().download_button
            && name == "href"
            && state.matches_without_side_effects(selector) > 0
        {
            return Ok(Some(DOWNLOAD_HREF.to_string()));
        }
        Ok(None)
    }

    async fn is_checked(&self, _selector: &str) -> Result<bool> {
        Ok(self.state().push_enabled)
    }

    async fn has_text(&self, text: &str) -> Result<bool> {
        let state = self.state();
        Ok(!text.is_empty() && state.text().contains(text))
    }

    async fn select_options(&self, selector: &str) -> Result<Vec<SelectOption>> {
        let mut state = self.state();
        if state.matches_without_side_effects(selector) == 0 {
            return Err(PortalError::general("fake: no select"));
        }
        Ok(state.teams.clone())
    }

    async fn select_value(&self, _selector: &str, value: &str) -> Result<()> {
        let mut state = self.state();
        if !state.teams.iter().any(|t| t.value == value) {
            return Err(PortalError::general(format!("fake: no team {value}")));
        }
        state.selected_team = Some(value.to_string());
        Ok(())
    }

    async fn set_file_input(&self, selector: &str, path: &Path) -> Result<()> {
        let mut state = self.state();
        if state.matches_without_side_effects(selector) == 0 {
            return Err(PortalError::general("fake: no file input"));
        }
        state.uploaded = Some(path.to_path_buf());
        Ok(())
    }

    async fn html(&self) -> Result<String> {
        Ok(format!("<html><body>{:?}</body></html>", self.state().page))
    }

    async fn current_url(&self) -> Result<String> {
        Ok("https://developer.apple.com/account/ios/certificate/certificateCreate.action".to_string())
    }

    async fn cookies(&self) -> Result<Vec<BrowserCookie>> {
        Ok(vec![
            BrowserCookie {
                name: "myacinfo".to_string(),
                value: "token".to_string(),
            },
            BrowserCookie {
                name: "dslang".to_string(),
                value: "US-EN".to_string(),
            },
        ])
    }

    async fn screenshot_full_page(&self) -> Result<Vec<u8>> {
        let mut state = self.state();
        if state.screenshot_fails {
            return Err(PortalError::general("fake: screenshot failed"));
        }
        state.screenshots += 1;
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }
}

/// Operator that always answers with the same 1-based choice.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    pub choice: usize,
    pub offered: Mutex<Vec<Vec<Team>>>,
}

impl ScriptedPrompt {
    pub fn choosing(choice: usize) -> Arc<Self> {
        Arc::new(Self {
            choice,
            offered: Mutex::new(Vec::new()),
        })
    }
}

impl TeamPrompt for ScriptedPrompt {
    fn choose(&self, teams: &[Team]) -> Result<usize> {
        self.offered.lock().unwrap().push(teams.to_vec());
        Ok(self.choice)
    }
}

#[derive(Debug, Default)]
pub struct FakeDownloader {
    pub body: Vec<u8>,
    pub requests: Mutex<Vec<(String, String)>>,
}

impl FakeDownloader {
    pub fn returning(body: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            body: body.to_vec(),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CertificateDownloader for FakeDownloader {
    async fn download(&self, url: &str, cookie_header: &str) -> Result<Vec<u8>> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), cookie_header.to_string()));
        Ok(self.body.clone())
    }
}

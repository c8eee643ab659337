use serde::{Deserialize, Serialize};

/// Every piece of portal markup the flow depends on.
///
/// The portal changes its UI without notice, so selectors, button labels and
/// page-text markers live here and can be overridden key by key from the
/// `[selectors]` table of the config file. Values starting with `//` or `(//`
/// are XPath, everything else is CSS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Sign-in link on the portal root
    pub sign_in_button: String,
    pub username_field: String,
    pub password_field: String,
    pub sign_in_submit: String,
    /// Text only present once the account's apps are listed
    pub signed_in_text: String,
    /// Text only present on the team picker
    pub team_picker_text: String,
    pub team_select: String,
    pub team_options: String,
    pub team_submit: String,
    /// Only rendered on the authenticated landing page
    pub authenticated_marker: String,

    /// `{app_identifier}` is replaced with the bundle id
    pub app_row: String,
    pub edit_button: String,
    pub detail_panel: String,
    pub push_toggle: String,

    pub create_production: String,
    pub create_development: String,
    pub wizard_next: String,
    pub upload_field: String,
    pub wizard_back: String,
    pub file_input: String,
    pub loading_indicator: String,
    pub download_button: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            sign_in_button: ".button.blue".to_string(),
            username_field: "#accountname".to_string(),
            password_field: "#accountpassword".to_string(),
            sign_in_submit: ".button.large.blue.signin-button".to_string(),
            signed_in_text: "My Apps".to_string(),
            team_picker_text: "Select Your Team".to_string(),
            team_select: "select".to_string(),
            team_options: "select option".to_string(),
            team_submit: "#saveTeamSelection_saveTeamSelection".to_string(),
            authenticated_marker: "#aprerelease".to_string(),

            app_row: "//td[@title='{app_identifier}']".to_string(),
            edit_button: "//a[normalize-space()='Edit'] | //button[normalize-space()='Edit']"
                .to_string(),
            detail_panel: ".item-details".to_string(),
            push_toggle: "#pushEnabled".to_string(),

            create_production: ".button.small.navLink.distribution.enabled".to_string(),
            create_development: ".button.small.navLink.development.enabled".to_string(),
            wizard_next: ".button.small.blue.right.submit".to_string(),
            upload_field: ".file-input.validate".to_string(),
            wizard_back: ".button.small.center.back".to_string(),
            file_input: "//input[@type='file']".to_string(),
            loading_indicator: ".loadingMessage".to_string(),
            download_button: ".button.small.blue".to_string(),
        }
    }
}

impl Selectors {
    /// Row selector for one app
    pub fn app_row_for(&self, app_identifier: &str) -> String {
        self.app_row.replace("{app_identifier}", app_identifier)
    }

    /// "Create certificate" button for the requested environment
    pub fn create_certificate(&self, production: bool) -> &str {
        if production {
            &self.create_production
        } else {
            &self.create_development
        }
    }
}

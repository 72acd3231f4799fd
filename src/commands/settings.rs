use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::api::models::{DeleteMode, FolderSelector};
use crate::config::Settings;
use crate::context::AppContext;
use crate::error::AppResult;

#[derive(Debug, Serialize)]
pub struct SettingsView {
    pub profile: String,
    pub settings_file: PathBuf,
    pub endpoint: String,
    pub api_version: String,
    pub mailbox: String,
    pub access_token: &'static str,
    pub folder: String,
    pub subject_filters: Vec<String>,
    pub timestamp: bool,
    pub body_capture: bool,
    pub delete_mode: DeleteMode,
    pub save_path: Option<PathBuf>,
    pub input_path: Option<PathBuf>,
    pub lifetime_minutes: u32,
    pub poll_interval_secs: u64,
    pub log_file: Option<PathBuf>,
}

impl SettingsView {
    pub fn new(profile: &str, settings_file: &Path, settings: &Settings) -> Self {
        let folder = match settings.folder() {
            FolderSelector::Id(id) => format!("id:{id}"),
            FolderSelector::Name(name) => name,
        };
        let access_token = if settings.access_token().is_ok() {
            "(set)"
        } else {
            "(missing)"
        };

        Self {
            profile: profile.to_string(),
            settings_file: settings_file.to_path_buf(),
            endpoint: settings.endpoint().to_string(),
            api_version: settings.api_version().to_string(),
            mailbox: settings.mailbox().to_string(),
            access_token,
            folder,
            subject_filters: settings.subject_filters(),
            timestamp: settings.timestamp,
            body_capture: settings.body_capture,
            delete_mode: settings.delete_mode,
            save_path: settings.save_path().ok(),
            input_path: settings.input_path().ok().map(Path::to_path_buf),
            lifetime_minutes: settings.lifetime_minutes(),
            poll_interval_secs: settings.poll_interval().as_secs(),
            log_file: settings.log_file.clone(),
        }
    }

    pub fn render_text(&self) -> String {
        let path = |value: &Option<PathBuf>| {
            value
                .as_deref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "(not set)".to_string())
        };
        let filters = if self.subject_filters.is_empty() {
            "(any subject)".to_string()
        } else {
            self.subject_filters.join(", ")
        };

        [
            format!("profile: {}", self.profile),
            format!("settings file: {}", self.settings_file.display()),
            format!("endpoint: {}/{}", self.endpoint, self.api_version),
            format!("mailbox: {}", self.mailbox),
            format!("access token: {}", self.access_token),
            format!("folder: {}", self.folder),
            format!("subject filters: {filters}"),
            format!("timestamp: {}", self.timestamp),
            format!("body capture: {}", self.body_capture),
            format!("delete mode: {}", self.delete_mode),
            format!("save path: {}", path(&self.save_path)),
            format!("input path: {}", path(&self.input_path)),
            format!("lifetime: {} minutes", self.lifetime_minutes),
            format!("poll interval: {} seconds", self.poll_interval_secs),
            format!("log file: {}", path(&self.log_file)),
        ]
        .join("\n")
    }
}

pub fn run(ctx: &AppContext) -> AppResult<()> {
    let settings_file = ctx.paths.settings_file(&ctx.profile);
    let view = SettingsView::new(&ctx.profile, &settings_file, &ctx.settings);
    ctx.output.emit(&view.render_text(), &view)
}

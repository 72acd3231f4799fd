use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::models::{DeleteMode, FolderSelector};
use crate::error::{AppError, AppResult};

const DEFAULT_ENDPOINT: &str = "https://graph.microsoft.com";
const DEFAULT_API_VERSION: &str = "v1.0";
const DEFAULT_MAILBOX: &str = "me";
const DEFAULT_FOLDER_NAME: &str = "Inbox";
const DEFAULT_LIFETIME_MINUTES: u32 = 30;
const MIN_LIFETIME_MINUTES: u32 = 1;
const MAX_LIFETIME_MINUTES: u32 = 30;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

pub const ACCESS_TOKEN_ENV: &str = "MAILPIPE_ACCESS_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub mailbox: Option<String>,
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub folder_name: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub subject_filters: Vec<String>,
    #[serde(default)]
    pub timestamp: bool,
    #[serde(default)]
    pub body_capture: bool,
    #[serde(default)]
    pub delete_mode: DeleteMode,
    #[serde(default)]
    pub save_path: Option<PathBuf>,
    #[serde(default)]
    pub input_path: Option<PathBuf>,
    #[serde(default)]
    pub lifetime_minutes: Option<u32>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

/// Values given on the command line; each one replaces the profile's value.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub endpoint: Option<String>,
    pub api_version: Option<String>,
    pub mailbox: Option<String>,
    pub access_token: Option<String>,
    pub folder_name: Option<String>,
    pub folder_id: Option<String>,
    pub subject_filters: Vec<String>,
    pub timestamp: bool,
    pub body_capture: bool,
    pub delete_mode: Option<DeleteMode>,
    pub save_path: Option<PathBuf>,
    pub input_path: Option<PathBuf>,
    pub lifetime_minutes: Option<u32>,
    pub poll_interval_secs: Option<u64>,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    pub fn apply(&mut self, overrides: SettingsOverrides) {
        let SettingsOverrides {
            endpoint,
            api_version,
            mailbox,
            access_token,
            folder_name,
            folder_id,
            subject_filters,
            timestamp,
            body_capture,
            delete_mode,
            save_path,
            input_path,
            lifetime_minutes,
            poll_interval_secs,
            log_file,
        } = overrides;

        replace(&mut self.endpoint, endpoint);
        replace(&mut self.api_version, api_version);
        replace(&mut self.mailbox, mailbox);
        replace(&mut self.access_token, access_token);
        replace(&mut self.folder_id, folder_id);
        replace(&mut self.save_path, save_path);
        replace(&mut self.input_path, input_path);
        replace(&mut self.lifetime_minutes, lifetime_minutes);
        replace(&mut self.poll_interval_secs, poll_interval_secs);
        replace(&mut self.log_file, log_file);

        if let Some(mode) = delete_mode {
            self.delete_mode = mode;
        }

        if folder_name.is_some() {
            // A name given explicitly wins over a stored id.
            self.folder_name = folder_name;
            self.folder_id = None;
        }

        if !subject_filters.is_empty() {
            self.subject_filters = subject_filters;
        }

        self.timestamp |= timestamp;
        self.body_capture |= body_capture;
    }

    pub fn endpoint(&self) -> &str {
        non_empty(&self.endpoint).unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn api_version(&self) -> &str {
        non_empty(&self.api_version).unwrap_or(DEFAULT_API_VERSION)
    }

    pub fn mailbox(&self) -> &str {
        non_empty(&self.mailbox).unwrap_or(DEFAULT_MAILBOX)
    }

    pub fn access_token(&self) -> AppResult<&str> {
        non_empty(&self.access_token).ok_or_else(|| {
            AppError::Config(format!(
                "missing access token. set access_token in the profile, pass --access-token or export {ACCESS_TOKEN_ENV}"
            ))
        })
    }

    pub fn folder(&self) -> FolderSelector {
        if let Some(id) = non_empty(&self.folder_id) {
            return FolderSelector::Id(id.to_string());
        }

        let name = non_empty(&self.folder_name).unwrap_or(DEFAULT_FOLDER_NAME);
        FolderSelector::Name(name.to_string())
    }

    pub fn subject_filters(&self) -> Vec<String> {
        self.subject_filters
            .iter()
            .map(|phrase| phrase.trim().to_string())
            .filter(|phrase| !phrase.is_empty())
            .collect()
    }

    pub fn save_path(&self) -> AppResult<PathBuf> {
        match &self.save_path {
            Some(path) => Ok(path.clone()),
            None => Ok(env::current_dir()?),
        }
    }

    pub fn input_path(&self) -> AppResult<&Path> {
        self.input_path.as_deref().ok_or_else(|| {
            AppError::Config(
                "missing input path for outbound messages. set input_path or pass --input-path"
                    .to_string(),
            )
        })
    }

    pub fn lifetime_minutes(&self) -> u32 {
        self.lifetime_minutes
            .unwrap_or(DEFAULT_LIFETIME_MINUTES)
            .clamp(MIN_LIFETIME_MINUTES, MAX_LIFETIME_MINUTES)
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(u64::from(self.lifetime_minutes()) * 60)
    }

    pub fn poll_interval(&self) -> Duration {
        let secs = self
            .poll_interval_secs
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
            .max(1);
        Duration::from_secs(secs)
    }
}

fn replace<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn load(path: PathBuf) -> AppResult<Settings> {
    let mut settings = if path.exists() {
        let raw = fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|err| {
            AppError::Config(format!("invalid settings file {}: {err}", path.display()))
        })?
    } else {
        Settings::default()
    };

    if settings.access_token.is_none() {
        settings.access_token = env::var(ACCESS_TOKEN_ENV).ok();
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_lifetime_into_range() {
        let mut settings = Settings::default();
        assert_eq!(settings.lifetime_minutes(), 30);

        settings.lifetime_minutes = Some(0);
        assert_eq!(settings.lifetime_minutes(), 1);

        settings.lifetime_minutes = Some(90);
        assert_eq!(settings.lifetime_minutes(), 30);
        assert_eq!(settings.lifetime(), Duration::from_secs(1800));
    }

    #[test]
    fn missing_access_token_is_a_config_error() {
        let settings = Settings {
            access_token: Some("   ".to_string()),
            ..Settings::default()
        };

        assert!(matches!(settings.access_token(), Err(AppError::Config(_))));
    }

    #[test]
    fn folder_id_takes_precedence_over_name() {
        let settings = Settings {
            folder_name: Some("Invoices".to_string()),
            folder_id: Some("AAMkFolder".to_string()),
            ..Settings::default()
        };

        assert_eq!(
            settings.folder(),
            FolderSelector::Id("AAMkFolder".to_string())
        );
        assert_eq!(
            Settings::default().folder(),
            FolderSelector::Name("Inbox".to_string())
        );
    }

    #[test]
    fn overrides_replace_profile_values() {
        let mut settings: Settings = serde_json::from_str(
            r#"{"folder_id": "AAMkFolder", "subject_filters": ["invoice"], "delete_mode": "soft"}"#,
        )
        .expect("settings parse");

        settings.apply(SettingsOverrides {
            folder_name: Some("Reports".to_string()),
            subject_filters: vec!["report".to_string()],
            delete_mode: Some(DeleteMode::Move),
            body_capture: true,
            ..SettingsOverrides::default()
        });

        assert_eq!(settings.folder(), FolderSelector::Name("Reports".to_string()));
        assert_eq!(settings.subject_filters(), vec!["report".to_string()]);
        assert_eq!(settings.delete_mode, DeleteMode::Move);
        assert!(settings.body_capture);
        assert!(!settings.timestamp);
    }

    #[test]
    fn rejects_unknown_delete_mode_in_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("default.json");
        fs::write(&path, r#"{"delete_mode": "shred"}"#).expect("write settings");

        assert!(matches!(load(path), Err(AppError::Config(_))));
    }
}

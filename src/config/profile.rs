use crate::error::{AppError, AppResult};

const DEFAULT_PROFILE: &str = "default";

/// The profile name doubles as a file name under the profiles directory.
pub fn resolve_profile(requested: &str) -> AppResult<String> {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Ok(DEFAULT_PROFILE.to_string());
    }

    if trimmed.starts_with('.') || trimmed.contains(['/', '\\']) {
        return Err(AppError::Config(format!(
            "invalid profile name `{trimmed}`"
        )));
    }

    Ok(trimmed.to_string())
}

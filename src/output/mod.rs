//! Command results on stdout. Logs go elsewhere, so stdout stays parseable
//! in JSON mode.

pub mod json;
pub mod text;

use serde::Serialize;

use crate::error::AppResult;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutputMode {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct Output {
    mode: OutputMode,
}

impl Output {
    pub fn new(json: bool) -> Self {
        let mode = if json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };
        Self { mode }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Prints `text` as-is in text mode, or `value` as pretty JSON.
    pub fn emit<T: Serialize>(&self, text: &str, value: &T) -> AppResult<()> {
        let mut stdout = std::io::stdout().lock();
        match self.mode {
            OutputMode::Text => text::write_block(&mut stdout, text),
            OutputMode::Json => json::write(&mut stdout, value),
        }
    }
}

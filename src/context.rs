use std::sync::Arc;

use crate::api::{GraphMailbox, MailboxService};
use crate::config::{self, AppPaths, Settings, SettingsOverrides};
use crate::error::AppResult;
use crate::output::Output;

#[derive(Debug)]
pub struct AppContext {
    pub profile: String,
    pub verbose: u8,
    pub paths: AppPaths,
    pub settings: Settings,
    pub output: Output,
}

impl AppContext {
    pub fn bootstrap(
        profile: String,
        json: bool,
        verbose: u8,
        overrides: SettingsOverrides,
    ) -> AppResult<Self> {
        let profile = config::resolve_profile(&profile)?;
        let paths = AppPaths::discover()?;
        let mut settings = config::load_settings(&paths, &profile)?;
        settings.apply(overrides);
        let output = Output::new(json);

        Ok(Self {
            profile,
            verbose,
            paths,
            settings,
            output,
        })
    }

    /// Built on demand so commands that never reach the mailbox work
    /// without a token.
    pub fn mailbox(&self) -> AppResult<Arc<dyn MailboxService>> {
        let mailbox = GraphMailbox::new(&self.settings)?;
        Ok(Arc::new(mailbox))
    }
}

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::api::models::DeleteMode;
use crate::config::SettingsOverrides;

#[derive(Debug, Parser)]
#[command(
    name = "mailpipe",
    version,
    about = "Mailbox download and outbound mail pipelines"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "default",
        help = "Profile name to use"
    )]
    pub profile: String,
    #[arg(long, global = true, help = "Emit JSON output")]
    pub json: bool,
    #[arg(short = 'v', long, global = true, action = ArgAction::Count, help = "Verbose logging")]
    pub verbose: u8,
    #[arg(long, global = true, help = "Append logs to this file instead of stderr")]
    pub log_file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the download and outbound pipelines until interrupted
    Run(OverrideArgs),
    /// Run only the mailbox download pipeline
    Download(OverrideArgs),
    /// Run only the outbound pipeline
    Send(OverrideArgs),
    /// Print the effective settings
    Settings(OverrideArgs),
}

impl Command {
    pub fn overrides(&self) -> &OverrideArgs {
        match self {
            Command::Run(args)
            | Command::Download(args)
            | Command::Send(args)
            | Command::Settings(args) => args,
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct OverrideArgs {
    #[arg(long, help = "Graph API base URL")]
    pub endpoint: Option<String>,
    #[arg(long, help = "Graph API version")]
    pub api_version: Option<String>,
    #[arg(long, help = "Mailbox user id or `me`")]
    pub mailbox: Option<String>,
    #[arg(long, help = "Bearer access token")]
    pub access_token: Option<String>,
    #[arg(long, help = "Folder display name or well-known name")]
    pub folder_name: Option<String>,
    #[arg(long, help = "Folder id")]
    pub folder_id: Option<String>,
    #[arg(
        long = "subject-filter",
        value_delimiter = ',',
        action = ArgAction::Append,
        help = "Subject phrase to match (repeatable)"
    )]
    pub subject_filters: Vec<String>,
    #[arg(long, help = "Prefix attachment names with the received time")]
    pub timestamp: bool,
    #[arg(long, help = "Save the message body and metadata, not just attachments")]
    pub body_capture: bool,
    #[arg(long, value_parser = parse_delete_mode, help = "hard, soft or move")]
    pub delete_mode: Option<DeleteMode>,
    #[arg(long, help = "Directory for downloaded messages")]
    pub save_path: Option<PathBuf>,
    #[arg(long, help = "Directory watched for .email files")]
    pub input_path: Option<PathBuf>,
    #[arg(long, help = "Notification connection lifetime (1-30)")]
    pub lifetime_minutes: Option<u32>,
    #[arg(long, help = "Seconds between notification polls")]
    pub poll_interval_secs: Option<u64>,
}

impl From<OverrideArgs> for SettingsOverrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            endpoint: args.endpoint,
            api_version: args.api_version,
            mailbox: args.mailbox,
            access_token: args.access_token,
            folder_name: args.folder_name,
            folder_id: args.folder_id,
            subject_filters: args.subject_filters,
            timestamp: args.timestamp,
            body_capture: args.body_capture,
            delete_mode: args.delete_mode,
            save_path: args.save_path,
            input_path: args.input_path,
            lifetime_minutes: args.lifetime_minutes,
            poll_interval_secs: args.poll_interval_secs,
            log_file: None,
        }
    }
}

fn parse_delete_mode(value: &str) -> Result<DeleteMode, String> {
    value.parse().map_err(|err: crate::error::AppError| err.to_string())
}

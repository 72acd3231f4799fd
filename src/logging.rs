use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::{AppError, AppResult};

/// Installs the global subscriber. `RUST_LOG` wins over the verbosity flag.
pub fn init(verbose: u8, log_file: Option<&Path>) -> AppResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|err| AppError::Startup(format!("unable to initialise logging: {err}")))
}

fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "mailpipe=info",
        1 => "mailpipe=debug,info",
        _ => "mailpipe=trace,debug",
    }
}

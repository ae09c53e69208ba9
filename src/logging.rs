use simplelog::*;
use std::fs::{self, OpenOptions};
use std::io::{Error, ErrorKind};
use std::path::PathBuf;
use std::sync::OnceLock;

static LOGGER_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// Directory holding `app.log`.
pub fn log_dir() -> Result<PathBuf, Error> {
    let home = std::env::var("HOME")
        .map_err(|_| Error::new(ErrorKind::NotFound, "HOME environment variable not set"))?;

    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("mtcsyncrs")
        .join("logs"))
}

/// Logs to `~/.local/share/mtcsyncrs/logs/app.log`, leaving the terminal to the display.
pub fn init_logger() -> Result<(), Error> {
    let log_dir = log_dir()?;
    fs::create_dir_all(&log_dir)?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("app.log"))?;

    let initialized = *LOGGER_INITIALIZED.get_or_init(|| {
        CombinedLogger::init(vec![WriteLogger::new(
            LevelFilter::Debug,
            Config::default(),
            log_file,
        )])
        .is_ok()
    });

    if initialized {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::Other, "Logger initialization failed"))
    }
}

/// Logs to stderr, honouring `RUST_LOG`. Used with `--verbose`.
pub fn init_stderr_logger() -> Result<(), log::SetLoggerError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .format_timestamp_millis()
        .try_init()
}

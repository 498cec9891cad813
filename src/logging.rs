use log::{info, warn, LevelFilter, SetLoggerError};
use log4rs::{
  append::console::ConsoleAppender,
  config::{runtime::ConfigErrors, Appender, Root},
  Config,
};
use thiserror::Error;

const DEFAULT_LEVEL: LevelFilter = LevelFilter::Info;

#[derive(Debug, Error)]
pub enum LoggingError {
  #[error("invalid logging configuration: {0}")]
  Config(#[from] ConfigErrors),
  #[error("logger is already initialized: {0}")]
  Init(#[from] SetLoggerError),
}

pub fn initialize() -> Result<log4rs::Handle, LoggingError> {
  let log_level = std::env::var("LOG_LEVEL").ok();
  let level_filter = log_level
    .as_deref()
    .map_or(Some(DEFAULT_LEVEL), parse_level_filter)
    .unwrap_or(DEFAULT_LEVEL);

  let stdout = ConsoleAppender::builder().build();
  let config = Config::builder()
    .appender(Appender::builder().build("stdout", Box::new(stdout)))
    .build(Root::builder().appender("stdout").build(level_filter))?;

  let handle = log4rs::init_config(config)?;
  if let Some(log_level) = log_level.filter(|level| parse_level_filter(level).is_none()) {
    warn!("Invalid log level {:?}, falling back to {}", log_level, DEFAULT_LEVEL);
  }
  info!("Logging Level: {}", &level_filter);
  Ok(handle)
}

fn parse_level_filter(str: &str) -> Option<LevelFilter> {
  match str.to_lowercase().as_str() {
    "off" => Some(LevelFilter::Off),
    "error" => Some(LevelFilter::Error),
    "warn" => Some(LevelFilter::Warn),
    "info" => Some(LevelFilter::Info),
    "debug" => Some(LevelFilter::Debug),
    "trace" => Some(LevelFilter::Trace),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_level_filter_ignores_case() {
    assert_eq!(parse_level_filter("DEBUG"), Some(LevelFilter::Debug));
    assert_eq!(parse_level_filter("Warn"), Some(LevelFilter::Warn));
  }

  #[test]
  fn parse_level_filter_rejects_unknown_levels() {
    assert_eq!(parse_level_filter("verbose"), None);
    assert_eq!(parse_level_filter(""), None);
  }
}

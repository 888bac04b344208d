use std::io::Write;
use std::path::Path;

use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};

const MAX_LOG_FILES: usize = 30;

#[derive(Debug, Error)]
pub enum LoggerError {
  #[error("unable to create log file appender: {0}")]
  Appender(#[from] InitError),
  #[error("unable to install logger: {0}")]
  Install(#[from] SetLoggerError),
}

/// Console logger, optionally mirrored into daily rolling files under a log directory.
///
/// `app.<date>.log` receives every line, `error.<date>.log` only error lines.
/// Both are written off-thread; lines still queued are flushed when the
/// returned guards drop.
pub struct StdLogger {
  level: LevelFilter,
  files: Option<LogFiles>,
}

struct LogFiles {
  app: NonBlocking,
  error: NonBlocking,
}

impl StdLogger {
  pub fn init(level: LevelFilter, log_dir: Option<&Path>) -> Result<Vec<WorkerGuard>, LoggerError> {
    let (logger, guards) = StdLogger::new(level, log_dir)?;

    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(level);
    Ok(guards)
  }

  fn new(level: LevelFilter, log_dir: Option<&Path>) -> Result<(Self, Vec<WorkerGuard>), LoggerError> {
    let Some(dir) = log_dir else {
      return Ok((StdLogger { level, files: None }, Vec::new()));
    };

    let (app, app_guard) = tracing_appender::non_blocking(daily_appender(dir, "app")?);
    let (error, error_guard) = tracing_appender::non_blocking(daily_appender(dir, "error")?);

    let logger = StdLogger {
      level,
      files: Some(LogFiles { app, error }),
    };

    Ok((logger, vec![app_guard, error_guard]))
  }
}

fn daily_appender(dir: &Path, prefix: &str) -> Result<RollingFileAppender, InitError> {
  RollingFileAppender::builder()
    .rotation(Rotation::DAILY)
    .filename_prefix(prefix)
    .filename_suffix("log")
    .max_log_files(MAX_LOG_FILES)
    .build(dir)
}

fn write_line(writer: &NonBlocking, line: &str) {
  let mut writer = writer.clone();
  if let Err(err) = writer.write_all(line.as_bytes()) {
    eprintln!("Unable to write log line: {}", err);
  }
}

impl log::Log for StdLogger {
  fn enabled(&self, metadata: &Metadata) -> bool {
    metadata.level() <= self.level
  }

  fn log(&self, record: &Record) {
    if self.enabled(record.metadata()) {
      let time_str = Local::now().format("%Y-%m-%dT%H:%M:%S");
      let line = format!("{0} {1:<8}: {2}", time_str, record.level(), record.args());
      println!("{}", line);

      if let Some(files) = &self.files {
        let line = format!("{}\n", line);
        write_line(&files.app, &line);

        if record.level() == Level::Error {
          write_line(&files.error, &line);
        }
      }
    }
  }

  fn flush(&self) {}
}

//! Log output for the `nbmon` binary.
//!
//! Every line reads `YYYY-MM-DD HH:MM:SS UTC - SEVERITY - message`, UTC,
//! 24-hour clock.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{Level, LevelFilter};

/// Severity name as written to the log.
pub fn severity_label(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// One formatted log line, without the trailing newline.
pub fn format_line(timestamp: DateTime<Utc>, level: Level, message: &dyn fmt::Display) -> String {
    format!(
        "{} UTC - {} - {}",
        timestamp.format("%Y-%m-%d %H:%M:%S"),
        severity_label(level),
        message
    )
}

/// Level enabled by `-v` repetitions: warnings only by default.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the global logger.
///
/// `RUST_LOG` takes precedence over `verbosity`. With `log_file` set, lines
/// are appended to that file instead of stderr.
pub fn init(verbosity: u8, log_file: Option<&Path>) -> io::Result<()> {
    let default_filter = level_for(verbosity).to_string().to_lowercase();
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));

    builder.format(|buf, record| {
        writeln!(
            buf,
            "{}",
            format_line(Utc::now(), record.level(), record.args())
        )
    });

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init().map_err(io::Error::other)
}

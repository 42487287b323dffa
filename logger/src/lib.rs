// Copyright (c) Microsoft. All rights reserved.

#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

/// Overrides the filter chosen by `try_init`, using `env_logger` filter syntax, eg `QKD_LOG=kme_client=debug`.
pub const LOG_LEVEL_ENV_VAR: &str = "QKD_LOG";

/// Installs the process-wide logger.
///
/// `debug` raises the default filter from `info` to `debug`. The `QKD_LOG` env var, if set, takes precedence.
pub fn try_init(debug: bool) -> Result<(), log::SetLoggerError> {
    env_logger::Builder::new()
        .format(|fmt, record| {
            use std::io::Write;

            let timestamp = fmt.timestamp();

            if record.level() >= log::Level::Debug {
                writeln!(
                    fmt,
                    "<{}>{} [{}] - [{}] {}",
                    to_syslog_level(record.level()),
                    timestamp,
                    level_tag(record.level()),
                    record.target(),
                    record.args(),
                )
            } else {
                writeln!(
                    fmt,
                    "<{}>{} [{}] - {}",
                    to_syslog_level(record.level()),
                    timestamp,
                    level_tag(record.level()),
                    record.args(),
                )
            }
        })
        .filter_level(default_filter(debug))
        .parse_env(LOG_LEVEL_ENV_VAR)
        .try_init()
}

fn default_filter(debug: bool) -> log::LevelFilter {
    if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}

fn level_tag(level: log::Level) -> &'static str {
    match level {
        log::Level::Trace => "TRCE",
        log::Level::Debug => "DBUG",
        log::Level::Info => "INFO",
        log::Level::Warn => "WARN",
        log::Level::Error => "ERR!",
    }
}

fn to_syslog_level(level: log::Level) -> i8 {
    match level {
        log::Level::Error => 3,
        log::Level::Warn => 4,
        log::Level::Info => 6,
        log::Level::Debug | log::Level::Trace => 7,
    }
}

use std::{fs::File, path::PathBuf};

use anyhow::Context;
use time::{format_description::parse, OffsetDateTime};
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, FmtSubscriber};

/// Sends every event to a timestamped file in the current directory and returns its path.
pub fn init_logger() -> anyhow::Result<PathBuf> {
    let file_name = get_log_file_name()?;
    let file = File::create(&file_name)
        .with_context(|| format!("could not create log file {}", file_name.display()))?;
    let writer = BoxMakeWriter::new(file);
    let local_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        local_offset,
        parse("[year]-[month]-[day] [hour]:[minute]:[second]")
            .context("invalid timestamp format")?,
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(writer)
        .finish();

    set_global_default(subscriber).context(
        "could not set global default tracing subscriber, disable file logging if one is already set",
    )?;
    Ok(file_name)
}

/// Sends warnings (everything down to debug when `verbose`) to stderr.
pub fn init_stderr_logger(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    set_global_default(subscriber).context("could not set global default tracing subscriber")
}

fn get_log_file_name() -> anyhow::Result<PathBuf> {
    let format = parse("[year]-[month]-[day]_[hour]:[minute]:[second]_duel_log.txt")
        .context("invalid log file name format")?;
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let name = now.format(&format).context("could not format log file name")?;
    Ok(PathBuf::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_name_is_timestamped() {
        let name = get_log_file_name().unwrap();
        let name = name.to_string_lossy();
        assert!(name.ends_with("_duel_log.txt"));
        assert!(name.starts_with(|c: char| c.is_ascii_digit()));
    }
}

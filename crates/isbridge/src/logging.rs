use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Directives in this variable (`RUST_LOG` syntax) override `--log-level`,
/// e.g. `ISBRIDGE_LOG=isbridge_bridge=trace`.
pub const LOG_ENV: &str = "ISBRIDGE_LOG";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

fn build_filter(level: LogLevel, directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from(level).into())
        .parse_lossy(directives)
}

/// Install the stderr subscriber.
///
/// Bridge tasks run on named threads (`isbridge-subscribe`,
/// `isbridge-publish`), so thread names are part of every line.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let directives = std::env::var(LOG_ENV).unwrap_or_default();
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level, &directives))
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true);

    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_flag_sets_the_default() {
        let filter = build_filter(LogLevel::Warn, "");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn env_directives_can_raise_one_crate() {
        let filter = build_filter(LogLevel::Info, "isbridge_bridge=trace");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));

        // Garbage directives are skipped rather than failing startup.
        let filter = build_filter(LogLevel::Error, "isbridge=loud");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::ERROR));
    }
}

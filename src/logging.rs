use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log file rotation, from `AppConfig::rotation`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rotation {
    Hourly,
    Daily,
    Never,
}

impl Rotation {
    fn parse(s: &str) -> Self {
        match s {
            "hourly" => Rotation::Hourly,
            "daily" => Rotation::Daily,
            _ => Rotation::Never,
        }
    }

    fn appender(self, config: &AppConfig) -> RollingFileAppender {
        let (dir, file) = (&config.log_dir, &config.log_file);
        match self {
            Rotation::Hourly => tracing_appender::rolling::hourly(dir, file),
            Rotation::Daily => tracing_appender::rolling::daily(dir, file),
            Rotation::Never => tracing_appender::rolling::never(dir, file),
        }
    }
}

/// Default directives when `RUST_LOG` is unset. sqlx logs every statement
/// at info, so it is held at warn.
fn default_directives(log_level: &str) -> String {
    format!("{log_level},sqlx=warn")
}

/// Install the global subscriber. Keep the guard alive until exit or
/// buffered file output is lost.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let rotation = Rotation::parse(&config.rotation);
    let (non_blocking, guard) = tracing_appender::non_blocking(rotation.appender(config));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    }

    tracing::debug!(?rotation, dir = %config.log_dir, "logging initialized");
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_parse() {
        assert_eq!(Rotation::parse("hourly"), Rotation::Hourly);
        assert_eq!(Rotation::parse("daily"), Rotation::Daily);
        assert_eq!(Rotation::parse("never"), Rotation::Never);
        assert_eq!(Rotation::parse("weekly"), Rotation::Never);
    }

    #[test]
    fn test_default_directives_parse() {
        let directives = default_directives("debug");
        assert_eq!(directives, "debug,sqlx=warn");
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}

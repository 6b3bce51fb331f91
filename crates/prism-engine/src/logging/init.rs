use std::sync::Once;

use log::LevelFilter;

/// Crates that are noisy at `info` and stay at `warn` unless a filter says otherwise.
const QUIET_BY_DEFAULT: [&str; 3] = ["wgpu_core", "wgpu_hal", "naga"];

/// Logger setup for the viewer binaries.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `env_logger` filter directives, e.g. `"prism_engine=trace,wgpu=warn"`.
    /// Takes precedence over `RUST_LOG`.
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    Directives(String),
    Default,
}

fn resolve_filter(configured: Option<String>, from_env: Option<String>) -> Filter {
    configured
        .or(from_env)
        .filter(|d| !d.trim().is_empty())
        .map_or(Filter::Default, Filter::Directives)
}

static INIT: Once = Once::new();

/// Installs the global logger. Later calls do nothing.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        match resolve_filter(config.env_filter, std::env::var("RUST_LOG").ok()) {
            Filter::Directives(directives) => {
                builder.parse_filters(&directives);
            }
            Filter::Default => {
                builder.filter_level(LevelFilter::Info);
                for module in QUIET_BY_DEFAULT {
                    builder.filter_module(module, LevelFilter::Warn);
                }
            }
        }

        builder.write_style(config.write_style);

        // Another logger (e.g. a test harness) may already be installed.
        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_filter_wins_over_env() {
        assert_eq!(
            resolve_filter(Some("debug".into()), Some("warn".into())),
            Filter::Directives("debug".into())
        );
        assert_eq!(
            resolve_filter(None, Some("warn".into())),
            Filter::Directives("warn".into())
        );
    }

    #[test]
    fn blank_filter_falls_back_to_default() {
        assert_eq!(resolve_filter(None, None), Filter::Default);
        assert_eq!(resolve_filter(Some("  ".into()), None), Filter::Default);
    }
}

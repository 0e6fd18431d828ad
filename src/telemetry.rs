use tracing_subscriber::EnvFilter;

use crate::util::env::env_opt;

/// Log line layout, chosen with `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Target and line number on every event; the default for local runs.
    #[default]
    Full,
    /// One short line per event, for container logs.
    Compact,
}

impl LogFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "full" | "pretty" => Some(Self::Full),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }

    pub fn from_env() -> Self {
        env_opt("LOG_FORMAT")
            .and_then(|v| Self::parse(&v))
            .unwrap_or_default()
    }
}

/// Installs the global fmt subscriber for the server.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used.
/// `RUST_LOG=info,movie_catalog::import=debug` shows per-batch progress.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match LogFormat::from_env() {
        LogFormat::Full => builder.with_target(true).with_line_number(true).try_init(),
        LogFormat::Compact => builder.with_target(false).compact().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("install tracing subscriber: {e}"))
}

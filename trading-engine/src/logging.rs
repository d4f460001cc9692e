//! Tracing bootstrap for the exchange binary

use tracing::{debug, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::LogFormat;

/// Install the global tracing subscriber.
///
/// `debug` selects the default level; `RUST_LOG` directives still take
/// precedence. Does nothing if a subscriber is already installed.
pub fn init_tracing(debug: bool, format: LogFormat) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let installed = match format {
        LogFormat::Pretty => {
            let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).finish();
            tracing::subscriber::set_global_default(subscriber).is_ok()
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).json().finish();
            tracing::subscriber::set_global_default(subscriber).is_ok()
        }
    };

    if installed {
        info!("Tracing initialized");
        if debug {
            debug!("Debug logging enabled");
        }
    }
}

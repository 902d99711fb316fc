use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use orthrus::error::{Error, Result};

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default
/// level, which is `info`, or `debug` when `verbose` is set.
pub fn init(verbose: bool) -> Result<()> {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().compact().with_target(verbose))
        .try_init()
        .map_err(|e| Error::from_std(e).chain(orthrus::error!("failed to install tracing subscriber")))
}

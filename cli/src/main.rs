use std::path::PathBuf;
use std::process::ExitCode;

use orthrus::config::{Config, CONFIG_FILE};
use orthrus::error::Result;
use orthrus::Builder;

mod telemetry;
mod watch;

mod flags {
    use std::path::PathBuf;

    xflags::xflags! {
        /// Renders a directory of markdown into web and gemini sites.
        cmd orthrus {
            /// Configuration file to use instead of `config.toml`.
            optional -c, --config path: PathBuf
            /// Log debug output.
            optional -v, --verbose

            /// Run one full build.
            default cmd build {}

            /// Run a full build, then rebuild whenever sources or templates change.
            cmd watch {}
        }
    }
}

fn run(flags: flags::Orthrus) -> Result<()> {
    let path = flags.config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = Config::read(&path)?;
    let mut builder = Builder::new(config)?;
    let report = builder.build_all()?;
    if !report.is_clean() {
        tracing::warn!("{} documents failed to build", report.failures.len());
    }

    match flags.subcommand {
        flags::OrthrusCmd::Build(_) => Ok(()),
        flags::OrthrusCmd::Watch(_) => watch::run(&mut builder),
    }
}

fn main() -> ExitCode {
    let flags = flags::Orthrus::from_env_or_exit();
    if let Err(e) = telemetry::init(flags.verbose) {
        eprintln!("{e}");
    }

    match run(flags) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

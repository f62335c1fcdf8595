use std::io;

use anyhow::Result;
use memhog::generator::{Generator, Plan};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// command line arguments are ignored, the plan is fixed
fn main() -> Result<()> {
    // stdout is reserved for progress lines
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    let mut stdout = io::stdout().lock();
    Generator::start(Plan::default())?.run(&mut stdout)?;
    Ok(())
}

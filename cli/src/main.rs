//! `quorum-sim`: run a threshold partial-signature ceremony locally.
//!
//! Configuration is read from `.env` and the environment (see
//! [`config::SimulationConfig`]); `RUST_LOG` controls verbosity.
//!
//! Run with: `QUORUM_SIGNERS=5 QUORUM_THRESHOLD=3 QUORUM_OFFLINE=1 cargo run --bin quorum-sim`

mod config;
mod simulation;

use anyhow::{bail, Context, Result};
use rand_core::OsRng;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::SimulationConfig;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize logging")?;

    let config = SimulationConfig::from_env();
    let report = simulation::run(&config, &mut OsRng).context("Simulation failed")?;

    for outcome in &report.outcomes {
        match &outcome.failure {
            None => info!(
                index = outcome.index,
                signer = %outcome.signer,
                state = %outcome.state,
                proofs = outcome.verified_proofs,
                rejected = outcome.rejected,
                byzantine = outcome.byzantine,
                "Signer finished"
            ),
            Some(failure) => error!(
                index = outcome.index,
                signer = %outcome.signer,
                state = %outcome.state,
                rejected = outcome.rejected,
                byzantine = outcome.byzantine,
                error = %failure,
                "Signer aborted"
            ),
        }
    }

    if !report.honest_complete() {
        bail!("Ceremony did not complete for every honest signer");
    }
    info!("All honest signers completed the ceremony");
    Ok(())
}

//! x402 buyer entrypoint.
//!
//! Runs the configured number of paid requests against a resource server and prints a
//! JSON envelope with every iteration and the total spend to stdout. Logs go to stderr.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `PRIVATE_KEY`, `RESOURCE_SERVER_URL` and the other settings of [`Config`]
//! - `RUST_LOG` sets the log filter
//! - `OTEL_*` variables enable trace export to systems like Honeycomb

use dotenvy::dotenv;
use x402_buyer::config::Config;
use x402_buyer::report::Envelope;
use x402_buyer::runner::{Buyer, RunError, RunReport};
use x402_buyer::telemetry::Telemetry;

async fn execute() -> Result<RunReport, RunError> {
    let config = Config::load()?;
    let buyer = Buyer::from_config(&config)?;
    buyer.run().await
}

/// Loads `.env`, installs telemetry, runs the buyer and prints the outcome.
///
/// Exits with a non-zero status when the run could not complete.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env variables
    dotenv().ok();

    let _telemetry = Telemetry::new();

    match execute().await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&Envelope::success(&report))?);
            Ok(())
        }
        Err(error) => {
            tracing::error!(%error, "x402 payment test failed");
            println!("{}", serde_json::to_string_pretty(&Envelope::failure(&error))?);
            Err(error.into())
        }
    }
}

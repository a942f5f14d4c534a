use std::time::Instant;

use bcn_core::BcnError;
use bcn_trainer::{run, EvalArgs};
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() {
    let started = Instant::now();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (args, ignored) = EvalArgs::parse_known();
    if !ignored.is_empty() {
        warn!(?ignored, "ignoring unknown arguments");
    }

    if let Err(e) = run(&args, started) {
        if let Some(BcnError::UnknownTask(_)) = e.downcast_ref::<BcnError>() {
            println!(
                "ERROR: Unknown transfer task. Set it correctly using the --transfer_task argument."
            );
        } else {
            eprintln!("Run failed: {e:#}");
        }
        std::process::exit(1);
    }
}

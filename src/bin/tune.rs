use anyhow::Result;
use fx_pid_tuner::bootstrap::{Configuration, open_session, single_trial, stop_motor};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

// Tunes the gains of a PID position controller by trialling candidate gains
// on the device. Reports go to stdout as one JSON line per generation, logs
// go to stderr.
#[tokio::main]
async fn main() -> Result<()> {
    dotenv::from_filename(".env.local").ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Configuration::from_env()?;
    tracing::info!(
        transport = %config.transport,
        setpoint = %config.setpoint,
        schedule = ?config.schedule,
        "Starting"
    );

    let mut session = open_session(&config).await?;

    // Single step response, no tuning
    if let Some(gains) = config.probe {
        let outcome = single_trial(&mut session, &config, gains).await?;
        let cost = config.tuner.cost_function.evaluate(&outcome.record);
        tracing::info!(
            gains = %gains,
            cost,
            termination = ?outcome.termination,
            samples = outcome.record.len(),
            "Step response finished"
        );
        print!("{}", outcome.record.to_csv());
        return Ok(());
    }

    // Ctrl-C lets the current trial finish, then stops the run
    let terminated = Arc::new(AtomicBool::new(false));
    {
        let terminated = terminated.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping after the current trial");
                terminated.store(true, Ordering::SeqCst);
            }
        });
    }

    let mut tuner = config.tuner()?;
    let summary = tuner
        .run(
            &mut session,
            config.setpoint,
            config.schedule,
            &terminated,
            |report| match serde_json::to_string(report) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!(error = %e, "Failed to serialize report"),
            },
        )
        .await;

    // Leave the motor stopped however the run ended
    stop_motor(&mut session).await;

    let summary = summary?;
    let Some(best) = summary.best else {
        tracing::warn!("No generation completed");
        return Ok(());
    };

    tracing::info!(
        gains = %best.gains(),
        cost = ?best.cost().value(),
        generations = summary.generations,
        evaluations = summary.evaluations,
        interrupted = summary.interrupted,
        "Best controller"
    );

    if let (Some(path), Some(record)) = (&config.best_csv, best.telemetry()) {
        tokio::fs::write(path, record.to_csv()).await?;
        tracing::info!(path = %path.display(), "Wrote best response");
    }

    Ok(())
}

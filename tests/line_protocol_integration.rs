use fx_pid_tuner::{
    GeneticTuner,
    bootstrap::{Configuration, TransportTarget, open_session},
    models::{Gains, Schedule},
    protocol::{LineSession, Session, Setpoint, SimulatedPlant, Termination, serve},
};
use std::time::Duration;
use tokio::net::TcpListener;

#[tokio::test(start_paused = true)]
async fn test_line_session_against_emulated_device() -> anyhow::Result<()> {
    // Run the plant as a byte-level device on one end of a pipe
    let (client, device) = tokio::io::duplex(64 * 1024);
    let device = tokio::spawn(serve(SimulatedPlant::default().with_position(400.0), device));

    let mut session = LineSession::new(client, Duration::from_secs(3));
    let outcome = session
        .run_trial(Gains::new(1.2, 0.1, 0.02), Setpoint::new(600)?)
        .await?;

    assert_eq!(outcome.termination, Termination::Completed);
    assert_eq!(outcome.record.len(), 75);
    assert_eq!(outcome.discarded_lines, 0);
    assert_eq!(outcome.record.first().map(|s| s.position), Some(400));

    assert!(session.stop().await?);

    // Closing the session ends the device loop
    drop(session);
    device.await??;

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_tuning_over_the_wire_end_to_end() -> anyhow::Result<()> {
    let (client, device) = tokio::io::duplex(64 * 1024);
    tokio::spawn(serve(SimulatedPlant::default(), device));

    let mut session = LineSession::new(client, Duration::from_secs(3));
    let mut tuner = GeneticTuner::builder()
        .with_seed(3)
        .with_population_size(4)
        .build()?;

    let terminated = std::sync::atomic::AtomicBool::new(false);
    let summary = tuner
        .run(
            &mut session,
            Setpoint::new(600)?,
            Schedule::generations(2),
            &terminated,
            |_| {},
        )
        .await?;

    assert_eq!(summary.generations, 2);
    assert_eq!(summary.evaluations, 6);
    let best = summary.best.expect("generations completed");
    assert!(best.cost().value().is_some_and(f64::is_finite));

    Ok(())
}

#[tokio::test]
async fn test_open_session_over_tcp_bridge() -> anyhow::Result<()> {
    // A serial-to-TCP bridge that greets with some boot noise
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        tokio::io::AsyncWriteExt::write_all(&mut stream, b"boot\nready\n").await?;
        serve(SimulatedPlant::default(), stream).await
    });

    let config = Configuration {
        transport: TransportTarget::Tcp(address.to_string()),
        reset_delay: Duration::ZERO,
        ..Configuration::default()
    };
    let mut session = open_session(&config).await?;

    let outcome = session
        .run_trial(Gains::proportional(1.0), config.setpoint)
        .await?;
    assert_eq!(outcome.termination, Termination::Completed);
    assert_eq!(outcome.discarded_lines, 0);
    assert_eq!(outcome.record.len(), 75);

    Ok(())
}

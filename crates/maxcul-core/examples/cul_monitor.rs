use anyhow::{bail, Context};
use maxcul_core::protocol::list_ports;
use maxcul_core::{CulConfig, MaxDriver, MaxEvent};
use std::env;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: cul_monitor <serial_port | config.json> [--pair]");
        println!("\nSerial ports:");
        for port in list_ports() {
            let marker = if port.is_cul_candidate() { " (CUL?)" } else { "" };
            println!("  - {}{}", port.name, marker);
        }
        return Ok(());
    }

    let target = &args[1];
    let mut config = if target.ends_with(".json") {
        CulConfig::from_file(target).with_context(|| format!("loading {}", target))?
    } else {
        CulConfig::new(target.as_str(), maxcul_core::config::DEFAULT_BASE_ADDRESS)
    };
    if args.iter().any(|arg| arg == "--pair") {
        config.pairing_enabled = true;
    }

    let driver = MaxDriver::new(config);
    let mut events = driver.subscribe();
    let outcome = driver.connect().await.context("connecting to CUL")?;
    if !outcome.firmware_confirmed {
        eprintln!("CUL did not report its firmware version, continuing anyway");
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(MaxEvent::Close) => bail!("serial port closed"),
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(RecvError::Lagged(missed)) => eprintln!("missed {} events", missed),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    driver.disconnect();
    Ok(())
}

//! ComfoAir polling tool
//!
//! Opens a session on a serial port, prints every status reply as JSON and
//! optionally runs one extra command.
//!
//! Usage:
//!   cargo run --example poll -- [OPTIONS]
//!
//! Options:
//!   --port PORT        Serial port (default: first detected adapter)
//!   --baud RATE        Baud rate (default: 9600)
//!   --command NAME     Run NAME after polling
//!   --params JSON      Parameters for --command, e.g. '{"level":"low"}'
//!   --list             List serial ports and commands, then exit
//!
//! Set RUST_LOG=comfoair_core=trace to see the raw frames.

use anyhow::{bail, Context};
use comfoair_core::prelude::*;
use tracing_subscriber::EnvFilter;

const STATUS_COMMANDS: &[&str] = &[
    "getFirmwareVersion",
    "getOperatingHours",
    "getFanState",
    "getFlapState",
    "getVentilationLevel",
    "getTemperatures",
    "getTemperatureStates",
    "getFaults",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut port_name = None;
    let mut baud_rate = 9600u32;
    let mut command = None;
    let mut params = Params::new();
    let mut list = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                port_name = args.get(i).cloned();
            }
            "--baud" | "-b" => {
                i += 1;
                if let Some(rate) = args.get(i) {
                    baud_rate = rate.parse().context("invalid baud rate")?;
                }
            }
            "--command" | "-c" => {
                i += 1;
                command = args.get(i).cloned();
            }
            "--params" => {
                i += 1;
                if let Some(json) = args.get(i) {
                    params = params_from_json(serde_json::from_str(json)?)?;
                }
            }
            "--list" | "-l" => list = true,
            other => bail!("unknown argument: {}", other),
        }
        i += 1;
    }

    if list {
        for port in list_ports() {
            println!("port  {} {:?}", port.name, port.product);
        }
        for info in comfoair_core::protocol::commands::catalog() {
            println!("cmd   {}", serde_json::to_string(&info)?);
        }
        return Ok(());
    }

    let port_name = match port_name {
        Some(name) => name,
        None => match list_ports().into_iter().next() {
            Some(port) => port.name,
            None => bail!("no serial port found, use --port"),
        },
    };

    let config = SessionConfig {
        baud_rate,
        ..SessionConfig::new(port_name)
    };
    println!("Opening {} at {} baud", config.port_name, config.baud_rate);
    let session = Session::serial(config)?;

    for name in STATUS_COMMANDS {
        match session.run_command(name, Params::new()).await {
            Ok(Message::Response(response)) => {
                println!("{}: {}", name, serde_json::to_string_pretty(&response)?)
            }
            Ok(Message::Ack) => println!("{}: ack", name),
            Err(e) => println!("{}: {}", name, e),
        }
    }

    if let Some(name) = command {
        let reply = session.run_command(&name, params).await?;
        println!("{}: {:?}", name, reply);
    }

    session.close().await;
    Ok(())
}

//! Listen command: receive frames on one or more ports.
//!
//! Every port gets its own session with two threads:
//!
//! - monitor: opens the port, watches the control lines, reconnects
//! - reader: polls inbound bytes through the receiver
//!
//! Both stop on Ctrl-C. Frames from all ports go to the same sink.

use anyhow::{Context, Result};
use console::style;
use log::info;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;
use striplink::{LinkSession, NativePort, PortMonitor, SignalKind, run_reader};

use crate::config::Config;
use crate::sink::FrameSink;
use crate::{Cli, get_port, serial_config};

/// Pause of the reader while its port is closed.
const READER_IDLE_PAUSE: Duration = Duration::from_millis(100);

/// Ports from the command line, or the single configured/detected one.
fn resolve_ports(cli: &Cli, config: &Config, ports: &[String]) -> Result<Vec<String>> {
    if !ports.is_empty() {
        let mut unique: Vec<String> = Vec::with_capacity(ports.len());
        for port in ports {
            if !unique.contains(port) {
                unique.push(port.clone());
            }
        }
        return Ok(unique);
    }
    Ok(vec![get_port(cli, config)?])
}

fn log_signal(port: &str, kind: SignalKind, asserted: bool) -> bool {
    info!(
        "[{port}] {kind} {}",
        if asserted { "asserted" } else { "dropped" }
    );
    true
}

/// Listen command implementation.
pub(crate) fn cmd_listen(
    cli: &Cli,
    config: &Config,
    ports: &[String],
    output: Option<&Path>,
) -> Result<()> {
    let ports = resolve_ports(cli, config, ports)?;
    let output = output.or(config
        .output
        .path
        .as_deref());
    let sink = Arc::new(FrameSink::from_path(output));
    let announcement = config
        .capabilities()
        .announcement()
        .context("Cannot encode capability announcement")?;
    let monitor_config = config.monitor_config();

    let sessions: Vec<_> = ports
        .iter()
        .map(|port| {
            let name = port.clone();
            let frames = Arc::clone(&sink);
            let signals = port.clone();
            Arc::new(
                LinkSession::new(
                    NativePort::new(serial_config(cli, config, port)),
                    announcement.clone(),
                )
                .with_consumer(move |frame| frames.deliver(&name, frame))
                .with_observer(move |kind, asserted| log_signal(&signals, kind, asserted)),
            )
        })
        .collect();

    if !cli.quiet {
        eprintln!(
            "{} Listening on {}",
            style("📡").cyan(),
            style(ports.join(", ")).green()
        );
        match output {
            Some(path) => eprintln!("  Frames are written to {}", style(path.display()).cyan()),
            None => eprintln!("  Frames are printed to stdout"),
        }
        eprintln!("{}", style("Press Ctrl+C to stop").dim());
    }

    let stop = AtomicBool::new(false);
    thread::scope(|scope| {
        for session in &sessions {
            let monitor = PortMonitor::with_config(Arc::clone(session), monitor_config.clone());
            let stop = &stop;
            scope.spawn(move || monitor.run(stop));
            scope.spawn(move || run_reader(&**session, stop, READER_IDLE_PAUSE));
        }
    });

    if !cli.quiet {
        eprintln!("{} Stopped", style("✓").green());
    }
    Ok(())
}

//! Probe command: ask a controller what it is.

use anyhow::{Context, Result};
use console::style;
use striplink::{Capabilities, FrameSender, NativePort};

use crate::config::Config;
use crate::{Cli, CliError, get_port, serial_config, was_interrupted};

fn print_capabilities(port: &str, caps: &Capabilities) {
    println!("{} {}", style("Port:").bold(), style(port).cyan());
    println!("{} {}", style("Name:").bold(), caps.name);
    println!("{} {}", style("Features:").bold(), caps.features.join(", "));
    println!("{} {}", style("Properties:").bold(), caps.properties.join(", "));
}

/// Probe command implementation.
pub(crate) fn cmd_probe(cli: &Cli, config: &Config, json: bool) -> Result<()> {
    let port = get_port(cli, config)?;
    let mut sender = FrameSender::new(NativePort::new(serial_config(cli, config, &port)));

    let result = sender.enquire();
    if was_interrupted() {
        return Err(CliError::Cancelled.into());
    }
    let caps = result.with_context(|| format!("No announcement from {port}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&caps)?);
    } else {
        print_capabilities(&port, &caps);
    }
    Ok(())
}

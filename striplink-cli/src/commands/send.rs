//! Send command: push one frame and wait for the acknowledgement.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::time::Duration;
use striplink::protocol::Attempt;
use striplink::{FrameSender, NativePort, SenderConfig};

use crate::config::Config;
use crate::{Cli, CliError, get_port, serial_config, use_fancy_output, was_interrupted};

/// Pick the payload from the argument or the file.
fn load_message(message: Option<&str>, file: Option<&Path>) -> Result<String> {
    let message = match (message, file) {
        (Some(message), _) => message.to_string(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?,
        (None, None) => return Err(CliError::Usage("Nothing to send".to_string()).into()),
    };

    if message
        .trim()
        .is_empty()
    {
        return Err(CliError::Usage("Refusing to send an empty frame".to_string()).into());
    }
    Ok(message)
}

fn attempt_message(attempt: &Attempt, max_attempts: u32) -> String {
    match attempt.received {
        Some(_) if attempt.succeeded() => {
            format!("Attempt {}/{max_attempts}: acknowledged", attempt.number)
        },
        Some(received) => format!(
            "Attempt {}/{max_attempts}: checksum {received} != {}",
            attempt.number, attempt.expected
        ),
        None => format!("Attempt {}/{max_attempts}: no acknowledgement", attempt.number),
    }
}

/// Send command implementation.
pub(crate) fn cmd_send(
    cli: &Cli,
    config: &Config,
    message: Option<&str>,
    file: Option<&Path>,
) -> Result<()> {
    let message = load_message(message, file)?;
    let port = get_port(cli, config)?;

    let sender_config = SenderConfig::default();
    let max_attempts = sender_config.max_attempts;
    let transport = NativePort::open_with(serial_config(cli, config, &port))
        .with_context(|| format!("Cannot open {port}"))?;
    let mut sender = FrameSender::with_config(transport, sender_config);

    let pb = if cli.quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap(),
        );
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    };
    pb.set_message(format!("Sending to {port}"));

    let delivered = sender.send_with_progress(&message, |attempt| {
        pb.set_message(attempt_message(attempt, max_attempts));
    });
    pb.finish_and_clear();

    if was_interrupted() {
        return Err(CliError::Cancelled.into());
    }
    if !delivered {
        return Err(CliError::SendFailed(format!(
            "{port} did not acknowledge the frame after {max_attempts} attempts"
        ))
        .into());
    }

    if !cli.quiet {
        eprintln!(
            "{} Frame acknowledged by {}",
            style("✓").green(),
            style(&port).cyan()
        );
    }
    Ok(())
}

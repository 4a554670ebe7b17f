//! Single-request exchange commands

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use vmsched_core::{Producer, StateRequest};

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// CPU load fraction
    #[arg(long, default_value = "0.0")]
    pub cpu: f64,

    /// RAM load fraction
    #[arg(long, default_value = "0.0")]
    pub ram: f64,

    /// Task size (MI)
    #[arg(long, default_value = "0")]
    pub task_size: f64,

    /// How long to wait for the agent, in milliseconds
    #[arg(long, default_value = "5000")]
    pub timeout_ms: u64,

    /// Return right after submitting
    #[arg(long)]
    pub no_wait: bool,
}

/// Poll interval while waiting for a response
pub const RESPONSE_POLL: Duration = Duration::from_millis(50);

pub fn submit(producer: &Producer, args: &SubmitArgs) -> Result<()> {
    let request = StateRequest::new(args.cpu, args.ram, args.task_size);
    producer.submit(&request).context("Failed to submit state")?;
    println!(
        "Submitted state: cpu_load={:.2} ram_load={:.2} task_size={}",
        request.cpu_load, request.ram_load, request.task_size
    );

    if args.no_wait {
        return Ok(());
    }

    let response = producer
        .wait_for_response(Duration::from_millis(args.timeout_ms), RESPONSE_POLL)
        .context("Is vmsched-agent running on this directory?")?;
    println!("Agent selected VM #{}", response.vm_id);
    Ok(())
}

pub fn status(producer: &Producer) -> Result<()> {
    let channel = producer.channel();
    let status = producer.status();
    let mark = |present: bool| if present { "present" } else { "-" };

    println!("Exchange directory: {}", channel.dir().display());
    println!("{:<24} {}", channel.names().request, mark(status.request_pending));
    println!("{:<24} {}", channel.names().response, mark(status.response_pending));
    println!("{:<24} {}", channel.names().staging, mark(status.staging_left_behind));
    println!("{:<24} {}", channel.names().quarantine, mark(status.quarantined));

    if status.request_pending && status.response_pending {
        println!("\nWarning: request and response both pending; the producer did not wait");
    }
    Ok(())
}

pub fn clean(producer: &Producer) -> Result<()> {
    let removed = producer.clean()?;
    println!("Removed {removed} exchange file(s)");
    Ok(())
}

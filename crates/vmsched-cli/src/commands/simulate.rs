//! Batch of random tasks, one decision at a time

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use vmsched_core::{Producer, StateRequest};

use super::exchange::RESPONSE_POLL;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of tasks to submit
    #[arg(short = 'n', long, default_value = "20")]
    pub count: usize,

    /// Number of VMs the agent chooses among
    #[arg(long, default_value = "5")]
    pub vms: usize,

    /// RNG seed for the generated workload
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Per-task timeout in milliseconds
    #[arg(long, default_value = "5000")]
    pub timeout_ms: u64,
}

/// Random task in the simulator's ranges: loads in [0, 1), size in [1000, 10000)
fn random_task(rng: &mut StdRng) -> StateRequest {
    let task_size = rng.gen_range(1000..10_000);
    let cpu_load = rng.gen::<f64>();
    let ram_load = rng.gen::<f64>();
    StateRequest::new(
        (cpu_load * 100.0).round() / 100.0,
        (ram_load * 100.0).round() / 100.0,
        f64::from(task_size),
    )
}

pub fn run(producer: &Producer, args: &SimulateArgs) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let timeout = Duration::from_millis(args.timeout_ms);
    let mut per_vm = vec![0usize; args.vms];
    let mut out_of_range = 0usize;

    println!("{:<6} {:<8} {:<8} {:<10} {:<6}", "TASK", "CPU", "RAM", "SIZE", "VM");
    println!("{}", "-".repeat(42));

    for i in 0..args.count {
        let request = random_task(&mut rng);
        producer
            .submit(&request)
            .with_context(|| format!("Failed to submit task #{i}"))?;

        let response = producer
            .wait_for_response(timeout, RESPONSE_POLL)
            .with_context(|| format!("No decision for task #{i}"))?;

        println!(
            "{:<6} {:<8.2} {:<8.2} {:<10} {:<6}",
            i, request.cpu_load, request.ram_load, request.task_size, response.vm_id
        );

        match per_vm.get_mut(response.vm_id) {
            Some(count) => *count += 1,
            None => out_of_range += 1,
        }
    }

    println!("\nAssignments per VM:");
    for (vm, count) in per_vm.iter().enumerate() {
        let share = if args.count == 0 {
            0.0
        } else {
            *count as f64 / args.count as f64 * 100.0
        };
        println!("  VM #{vm}: {count} ({share:.1}%)");
    }
    if out_of_range > 0 {
        println!("  out of range: {out_of_range} (agent action_dim differs from --vms)");
    }
    Ok(())
}

// Driver for the ksync call surface.
// 3 sub-commands
// - barrier (threads meet at one or more barriers for several rounds)
// - cond-prodcons (producers/consumers on the condition-variable buffer)
// - sem-prodcons (producers/consumers on the semaphore buffer)
use anyhow::{bail, Result};
use chrono::Utc;
use clap::Parser;
use ksync::syscall;
use ksync_bench::common::workloads::{self, BufferChoice, RunReport};
use ksync_bench::common::{cli, utils};
use log::info;
use serde_json::json;

fn run(args: &cli::BenchmarkCli) -> Result<RunReport> {
    let sys = syscall::global();
    match &args.command {
        Some(cli::Command::Barrier {
            threads,
            rounds,
            instances,
        }) => workloads::run_barrier(sys, *threads, *rounds, *instances),
        Some(cli::Command::CondProdcons {
            producers,
            consumers,
            items,
        }) => workloads::run_prodcons(sys, BufferChoice::Cond, *producers, *consumers, *items),
        Some(cli::Command::SemProdcons {
            producers,
            consumers,
            items,
        }) => workloads::run_prodcons(sys, BufferChoice::Sem, *producers, *consumers, *items),
        None => {
            bail!("No command provided: valid commands are barrier, cond-prodcons, sem-prodcons. Use --help to see all options.");
        }
    }
}

fn main() -> Result<()> {
    let args = cli::BenchmarkCli::parse();
    utils::init_logging(&args.log_level);
    syscall::set_trace_sink(utils::make_sink(&args.trace)?);
    let metrics_recorder = utils::MetricsRecorder::install()?;

    let run_start_ts = Utc::now();
    let report = run(&args)?;
    let run_end_ts = Utc::now();
    if args.trace == "console" {
        // consumed items are printed without a trailing newline
        println!();
    }
    let metrics_data = metrics_recorder.snapshot_values();
    let ops_per_sec = metrics_data
        .get(&format!("ksync-bench.{}.ops_per_sec", report.workload))
        .copied()
        .unwrap_or_default();
    info!(
        "{}: {} operations, {:.0} ops/s",
        report.workload, report.operations, ops_per_sec
    );

    if !args.output.is_empty() {
        let duration_secs = (run_end_ts - run_start_ts).num_milliseconds() as f64 / 1000.0;
        let output_json = json!({
            "cli": args.clone(),
            "command": std::env::args().collect::<Vec<_>>().join(" "),
            "timestamps": {
                "start": run_start_ts.to_rfc3339(),
                "end": run_end_ts.to_rfc3339(),
                "duration_seconds": duration_secs
            },
            "report": &report,
            "metrics": metrics_data,
        });
        utils::write_summary(&args.output, &output_json)?;
    }
    Ok(())
}

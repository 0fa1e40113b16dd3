use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Subcommand, Debug, Serialize, Clone)]
pub enum Command {
    /// Threads meet at shared barriers for a number of rounds
    Barrier {
        /// Parties per barrier instance
        #[arg(long, default_value_t = 3)]
        threads: usize,

        #[arg(long, default_value_t = 2)]
        rounds: usize,

        /// Barrier instances used at the same time
        #[arg(long, default_value_t = 1)]
        instances: usize,
    },
    /// Producers and consumers on the condition-variable buffer
    CondProdcons {
        #[arg(long, default_value_t = 1)]
        producers: usize,

        #[arg(long, default_value_t = 1)]
        consumers: usize,

        #[arg(long, default_value_t = 10)]
        items: usize,
    },
    /// Producers and consumers on the semaphore buffer
    SemProdcons {
        #[arg(long, default_value_t = 1)]
        producers: usize,

        #[arg(long, default_value_t = 1)]
        consumers: usize,

        #[arg(long, default_value_t = 10)]
        items: usize,
    },
}

#[derive(Parser, Debug, Serialize, Clone)]
pub struct BenchmarkCli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Default log filter when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output filename for the JSON summary. Nothing is written if empty.
    #[arg(long, default_value = "")]
    pub output: String,

    /// Where trace events go. Valid choices are "console", "log" and "none".
    #[arg(long, default_value = "console")]
    pub trace: String,
}

// SPDX-License-Identifier: MPL-2.0

use std::{num::NonZero, path::PathBuf, process};

use clap::{Parser, ValueEnum};
use rtsched::{SchedPolicy, Tick};

use crate::{
    config::SimConfig,
    driver::Simulator,
    error::Errno,
    error_msg, report, warn_msg,
};

pub fn main() {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        // Help and version requests are not errors.
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            let _ = err.print();
            process::exit(Errno::ParseConfig as _);
        }
    };

    let config = SimConfig::parse(&args);
    let format = config.format;
    let outcome = match Simulator::new(&config) {
        Ok(simulator) => simulator.run(),
        Err(err) => {
            error_msg!("{}", err);
            process::exit(Errno::InvalidTaskSet as _);
        }
    };

    report::print(&outcome, format);

    if outcome.aborted {
        error_msg!(
            "deadline missed at tick {}, aborting the simulation",
            outcome.finish_time
        );
        process::exit(Errno::DeadlineMiss as _);
    }
    if outcome.unfinished > 0 {
        warn_msg!(
            "simulation stopped at tick {} with {} thread(s) unfinished",
            outcome.finish_time,
            outcome.unfinished
        );
    }
}

#[derive(Debug, Parser)]
#[command(name = "rtsim", version)]
/// Replay a task set against one of the scheduling policies
pub struct Cli {
    #[arg(
        name = "TASKSET",
        required = true,
        help = "Path of the TOML task set to simulate"
    )]
    pub taskset: PathBuf,
    #[arg(
        long,
        help = "Scheduling policy, overriding the one in the task set (default, hrrn, priority-rr, dm, edf-cbs)",
        value_name = "POLICY"
    )]
    pub policy: Option<SchedPolicy>,
    #[arg(
        long,
        help = "Round-robin quantum of the priority-rr policy",
        value_name = "TICKS"
    )]
    pub quantum: Option<NonZero<Tick>>,
    #[arg(
        long,
        help = "Stop the simulation at this tick",
        value_name = "TICK"
    )]
    pub until: Option<Tick>,
    #[arg(
        long = "on-miss",
        help = "What to do when a job misses its deadline",
        value_enum,
        default_value_t = OnMiss::Drop
    )]
    pub on_miss: OnMiss,
    #[arg(
        long,
        help = "Format of the summary",
        value_enum,
        default_value_t = Format::Text
    )]
    pub format: Format,
}

/// The handling of deadline misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnMiss {
    /// Discard the late job and carry on with the next one.
    Drop,
    /// Stop the simulation.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

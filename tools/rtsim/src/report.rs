// SPDX-License-Identifier: MPL-2.0

use std::fmt::Write;

use rtsched::{ThreadId, Tick};
use serde::Serialize;

use crate::{
    cli::Format,
    driver::{Event, Outcome, ThreadStats},
    error_msg,
};

#[derive(Debug, Serialize)]
struct Report<'a> {
    policy: String,
    finish_time: Tick,
    aborted: bool,
    unfinished: usize,
    deadline_misses: u32,
    threads: Vec<ThreadReport<'a>>,
    events: &'a [Event],
}

#[derive(Debug, Serialize)]
struct ThreadReport<'a> {
    id: ThreadId,
    #[serde(flatten)]
    stats: &'a ThreadStats,
}

impl<'a> Report<'a> {
    fn new(outcome: &'a Outcome) -> Self {
        Self {
            policy: outcome.policy.to_string(),
            finish_time: outcome.finish_time,
            aborted: outcome.aborted,
            unfinished: outcome.unfinished,
            deadline_misses: outcome.total_misses(),
            threads: outcome
                .stats
                .iter()
                .map(|(&id, stats)| ThreadReport { id, stats })
                .collect(),
            events: &outcome.events,
        }
    }
}

/// Prints the trace and the summary of a simulation to stdout.
pub fn print(outcome: &Outcome, format: Format) {
    match render(outcome, format) {
        Ok(output) => print!("{}", output),
        Err(err) => error_msg!("Cannot serialize the summary: {}", err),
    }
}

fn render(outcome: &Outcome, format: Format) -> serde_json::Result<String> {
    match format {
        Format::Text => Ok(render_text(outcome)),
        Format::Json => {
            let mut json = serde_json::to_string_pretty(&Report::new(outcome))?;
            json.push('\n');
            Ok(json)
        }
    }
}

fn render_text(outcome: &Outcome) -> String {
    let mut out = String::new();
    for event in &outcome.events {
        let _ = match *event {
            Event::Run {
                time,
                thread,
                ticks,
            } => writeln!(out, "[{:>6}] {} runs for {}", time, thread, ticks),
            Event::Idle { time, ticks } => writeln!(out, "[{:>6}] idle for {}", time, ticks),
            Event::DeadlineMiss {
                time,
                thread,
                deadline,
            } => writeln!(
                out,
                "[{:>6}] {} missed its deadline {}",
                time, thread, deadline
            ),
        };
    }

    let _ = writeln!(
        out,
        "\npolicy {}, finished at tick {}, {} deadline miss(es)",
        outcome.policy,
        outcome.finish_time,
        outcome.total_misses()
    );
    let _ = writeln!(out, "{:<8}{:>8}{:>8}{:>10}", "thread", "jobs", "misses", "finish");
    for (id, stats) in &outcome.stats {
        let finish = stats
            .finish_time
            .map_or_else(|| "-".to_string(), |time| time.to_string());
        let _ = writeln!(
            out,
            "{:<8}{:>8}{:>8}{:>10}",
            id.to_string(),
            stats.jobs_completed,
            stats.deadline_misses,
            finish
        );
    }
    out
}

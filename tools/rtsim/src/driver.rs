// SPDX-License-Identifier: MPL-2.0

//! The simulation loop.
//!
//! The simulator plays the part of the kernel around the scheduling core: it
//! owns the clock and the queues, releases jobs, asks the policy for a
//! decision and executes it.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info};
use rtsched::{
    Decision, ReleaseQueue, RunQueue, SchedArgs, SchedClass, SchedPolicy, ThreadArena,
    ThreadHandle, ThreadId, Tick,
};
use serde::Serialize;

use crate::{
    cli::OnMiss,
    config::{SimConfig, ThreadEntry},
};

/// Something that happened on the simulated CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Event {
    Run {
        time: Tick,
        thread: ThreadId,
        ticks: Tick,
    },
    Idle {
        time: Tick,
        ticks: Tick,
    },
    DeadlineMiss {
        time: Tick,
        thread: ThreadId,
        deadline: Tick,
    },
}

/// The per-thread accounting of a simulation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThreadStats {
    pub jobs_completed: u32,
    pub deadline_misses: u32,
    /// The tick at which the last job ended, by completion or by a miss.
    pub finish_time: Option<Tick>,
}

/// The result of a simulation.
#[derive(Debug)]
pub struct Outcome {
    pub policy: SchedPolicy,
    pub events: Vec<Event>,
    pub stats: BTreeMap<ThreadId, ThreadStats>,
    pub finish_time: Tick,
    /// The number of threads with jobs left when the simulation stopped.
    pub unfinished: usize,
    /// Whether the simulation stopped at a deadline miss.
    pub aborted: bool,
}

impl Outcome {
    pub fn total_misses(&self) -> u32 {
        self.stats.values().map(|stats| stats.deadline_misses).sum()
    }
}

/// The jobs a thread still has to release.
#[derive(Debug)]
struct JobPlan {
    jobs_left: u32,
    last_release: Tick,
}

pub struct Simulator {
    policy: SchedPolicy,
    until: Tick,
    on_miss: OnMiss,
    threads: ThreadArena,
    run_queue: RunQueue,
    release_queue: ReleaseQueue,
    plans: HashMap<ThreadHandle, JobPlan>,
    stats: BTreeMap<ThreadId, ThreadStats>,
    events: Vec<Event>,
    now: Tick,
}

impl Simulator {
    pub fn new(config: &SimConfig) -> rtsched::Result<Self> {
        let mut simulator = Self {
            policy: config.policy,
            until: config.until,
            on_miss: config.on_miss,
            threads: ThreadArena::new(),
            run_queue: RunQueue::new(),
            release_queue: ReleaseQueue::new(),
            plans: HashMap::new(),
            stats: BTreeMap::new(),
            events: Vec::new(),
            now: 0,
        };
        for entry in &config.threads {
            simulator.admit(entry)?;
        }
        Ok(simulator)
    }

    fn admit(&mut self, entry: &ThreadEntry) -> rtsched::Result<()> {
        let arrival_time = entry.thread.arrival_time();
        let id = entry.thread.id();
        let handle = self.threads.insert(entry.thread.clone())?;
        self.release_queue.push(arrival_time, handle);
        self.plans.insert(
            handle,
            JobPlan {
                jobs_left: entry.jobs,
                last_release: arrival_time,
            },
        );
        self.stats.insert(id, ThreadStats::default());
        Ok(())
    }

    /// Runs the simulation until every job is done, the horizon is reached,
    /// or a miss aborts it.
    pub fn run(mut self) -> Outcome {
        info!(
            "simulating {} thread(s) under {} until tick {}",
            self.threads.len(),
            self.policy,
            self.until
        );

        let mut aborted = false;
        while !self.threads.is_empty() && self.now < self.until {
            self.release_due_jobs();

            let decision = self.policy.decide(&mut SchedArgs {
                threads: &mut self.threads,
                run_queue: &mut self.run_queue,
                release_queue: &self.release_queue,
                current_time: self.now,
            });

            if let Some(handle) = decision.thread() {
                if decision.is_deadline_miss() {
                    self.miss(handle);
                    if self.on_miss == OnMiss::Abort {
                        aborted = true;
                        break;
                    }
                } else {
                    self.dispatch(handle, decision);
                }
            } else {
                self.events.push(Event::Idle {
                    time: self.now,
                    ticks: decision.allocated_time,
                });
                self.now += decision.allocated_time;
            }
        }

        Outcome {
            policy: self.policy,
            events: self.events,
            stats: self.stats,
            finish_time: self.now,
            unfinished: self.threads.len(),
            aborted,
        }
    }

    fn release_due_jobs(&mut self) {
        for entry in self.release_queue.drain_released(self.now) {
            let thread = &mut self.threads[entry.thread];
            thread.release_job(entry.release_time);
            debug!(
                "{} released a job at tick {}, due at {}",
                thread.id(),
                entry.release_time,
                thread.current_deadline()
            );
            self.run_queue.push_back(entry.thread);
        }
    }

    fn dispatch(&mut self, handle: ThreadHandle, decision: Decision) {
        let thread = &mut self.threads[handle];
        let ran = thread.consume(decision.allocated_time);
        let (id, finished) = (thread.id(), thread.is_finished());
        self.events.push(Event::Run {
            time: self.now,
            thread: id,
            ticks: ran,
        });
        self.now += ran;

        if finished {
            let stats = self.stats.entry(id).or_default();
            stats.jobs_completed += 1;
            stats.finish_time = Some(self.now);
            self.end_job(handle);
        }
    }

    fn miss(&mut self, handle: ThreadHandle) {
        let thread = &self.threads[handle];
        let id = thread.id();
        self.events.push(Event::DeadlineMiss {
            time: self.now,
            thread: id,
            deadline: thread.current_deadline(),
        });
        let stats = self.stats.entry(id).or_default();
        stats.deadline_misses += 1;
        stats.finish_time = Some(self.now);

        if self.on_miss == OnMiss::Drop {
            self.end_job(handle);
        }
    }

    /// Takes the current job off the CPU and queues the next one, if any.
    fn end_job(&mut self, handle: ThreadHandle) {
        self.run_queue.remove(handle);

        let period = self.threads[handle].period();
        let next_release = match self.plans.get_mut(&handle) {
            Some(plan) if plan.jobs_left > 1 => {
                plan.jobs_left -= 1;
                plan.last_release += period;
                Some(plan.last_release)
            }
            _ => None,
        };

        match next_release {
            Some(release_time) => self.release_queue.push(release_time, handle),
            None => {
                self.plans.remove(&handle);
                if let Ok(thread) = self.threads.remove(handle) {
                    debug!("{} left at tick {}", thread.id(), self.now);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use rtsched::Thread;

    use super::*;
    use crate::cli::Format;

    fn sim_config(policy: SchedPolicy, on_miss: OnMiss, threads: Vec<ThreadEntry>) -> SimConfig {
        SimConfig {
            policy,
            until: 100,
            on_miss,
            format: Format::Text,
            threads,
        }
    }

    fn periodic(id: u32, processing: Tick, period: Tick, jobs: u32) -> ThreadEntry {
        ThreadEntry {
            thread: Thread::builder(id, processing)
                .periodic(period)
                .build()
                .unwrap(),
            jobs,
        }
    }

    fn run(config: &SimConfig) -> Outcome {
        Simulator::new(config).unwrap().run()
    }

    #[test]
    fn periodic_jobs_are_released_each_period() {
        let outcome = run(&sim_config(
            SchedPolicy::EdfCbs,
            OnMiss::Drop,
            vec![periodic(1, 2, 5, 3)],
        ));

        assert_eq!(
            outcome.events,
            [
                Event::Run {
                    time: 0,
                    thread: ThreadId::new(1),
                    ticks: 2,
                },
                Event::Idle { time: 2, ticks: 3 },
                Event::Run {
                    time: 5,
                    thread: ThreadId::new(1),
                    ticks: 2,
                },
                Event::Idle { time: 7, ticks: 3 },
                Event::Run {
                    time: 10,
                    thread: ThreadId::new(1),
                    ticks: 2,
                },
            ]
        );
        let stats = &outcome.stats[&ThreadId::new(1)];
        assert_eq!(stats.jobs_completed, 3);
        assert_eq!(stats.finish_time, Some(12));
        assert_eq!(outcome.finish_time, 12);
        assert_eq!(outcome.unfinished, 0);
        assert!(!outcome.aborted);
    }

    #[test]
    fn hrrn_measures_waiting_from_each_release() {
        let late = ThreadEntry {
            thread: Thread::builder(1, 1).arrival_time(10).build().unwrap(),
            jobs: 1,
        };
        let outcome = run(&sim_config(
            SchedPolicy::Hrrn,
            OnMiss::Drop,
            vec![late, periodic(2, 1, 10, 2)],
        ));

        // Both jobs arrive at tick 10, so the ratios tie.
        assert_eq!(
            outcome.events[2..],
            [
                Event::Run {
                    time: 10,
                    thread: ThreadId::new(1),
                    ticks: 1,
                },
                Event::Run {
                    time: 11,
                    thread: ThreadId::new(2),
                    ticks: 1,
                },
            ]
        );
    }

    #[test]
    fn constrained_deadline_release_preempts_under_edf() {
        let short = ThreadEntry {
            thread: Thread::builder(2, 1)
                .arrival_time(3)
                .periodic(50)
                .deadline(5)
                .build()
                .unwrap(),
            jobs: 1,
        };
        let outcome = run(&sim_config(
            SchedPolicy::EdfCbs,
            OnMiss::Drop,
            vec![periodic(1, 10, 20, 1), short],
        ));

        assert_eq!(
            outcome.events,
            [
                Event::Run {
                    time: 0,
                    thread: ThreadId::new(1),
                    ticks: 3,
                },
                Event::Run {
                    time: 3,
                    thread: ThreadId::new(2),
                    ticks: 1,
                },
                Event::Run {
                    time: 4,
                    thread: ThreadId::new(1),
                    ticks: 7,
                },
            ]
        );
        assert_eq!(outcome.total_misses(), 0);
        assert_eq!(outcome.finish_time, 11);
    }

    #[test]
    fn late_arrivals_idle_the_cpu() {
        let late = ThreadEntry {
            thread: Thread::builder(1, 3).arrival_time(4).build().unwrap(),
            jobs: 1,
        };
        let outcome = run(&sim_config(SchedPolicy::Hrrn, OnMiss::Drop, vec![late]));

        assert_eq!(outcome.events[0], Event::Idle { time: 0, ticks: 4 });
        assert_eq!(outcome.finish_time, 7);
    }

    #[test]
    fn dropped_jobs_are_counted_as_misses() {
        let outcome = run(&sim_config(
            SchedPolicy::DeadlineMonotonic,
            OnMiss::Drop,
            vec![periodic(1, 3, 4, 2), periodic(2, 3, 5, 2)],
        ));

        assert!(outcome.total_misses() > 0);
        assert_eq!(outcome.unfinished, 0);
        assert!(!outcome.aborted);
        let stats = &outcome.stats[&ThreadId::new(2)];
        assert_eq!(stats.jobs_completed + stats.deadline_misses, 2);
    }

    #[test]
    fn abort_stops_at_the_first_miss() {
        let outcome = run(&sim_config(
            SchedPolicy::DeadlineMonotonic,
            OnMiss::Abort,
            vec![periodic(1, 3, 4, 2), periodic(2, 3, 5, 2)],
        ));

        assert!(outcome.aborted);
        assert_eq!(outcome.total_misses(), 1);
        assert!(matches!(
            outcome.events.last(),
            Some(Event::DeadlineMiss { .. })
        ));
    }

    #[test]
    fn horizon_stops_the_simulation() {
        let mut config = sim_config(
            SchedPolicy::Default,
            OnMiss::Drop,
            vec![periodic(1, 1, 10, 50)],
        );
        config.until = 25;
        let outcome = run(&config);

        assert_eq!(outcome.stats[&ThreadId::new(1)].jobs_completed, 3);
        assert_eq!(outcome.unfinished, 1);
        assert!(outcome.finish_time >= 25);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let config = sim_config(
            SchedPolicy::Default,
            OnMiss::Drop,
            vec![periodic(1, 1, 10, 1), periodic(1, 2, 10, 1)],
        );
        assert_eq!(
            Simulator::new(&config).err().map(|err| err.error()),
            Some(rtsched::Errno::DuplicateId)
        );
    }
}

// SPDX-License-Identifier: MPL-2.0

//! End-to-end scheduling scenarios driven through the public API.

use std::num::NonZero;

use rtsched::{
    Decision, Errno, ReleaseQueue, RunQueue, SchedArgs, SchedClass, SchedPolicy, Thread,
    ThreadArena, ThreadHandle, ThreadId, Tick,
};

const ALL_POLICIES: [SchedPolicy; 5] = [
    SchedPolicy::Default,
    SchedPolicy::Hrrn,
    SchedPolicy::PriorityRoundRobin { quantum: None },
    SchedPolicy::DeadlineMonotonic,
    SchedPolicy::EdfCbs,
];

/// A minimal driver: runs every decision to its end without releases.
#[derive(Default)]
struct Cpu {
    threads: ThreadArena,
    run_queue: RunQueue,
    release_queue: ReleaseQueue,
    now: Tick,
}

impl Cpu {
    fn spawn(&mut self, thread: Thread) -> ThreadHandle {
        let handle = self.threads.insert(thread).unwrap();
        self.run_queue.push_back(handle);
        handle
    }

    fn decide(&mut self, policy: SchedPolicy) -> Decision {
        policy.decide(&mut SchedArgs {
            threads: &mut self.threads,
            run_queue: &mut self.run_queue,
            release_queue: &self.release_queue,
            current_time: self.now,
        })
    }

    /// Decides and executes one dispatch. Returns who ran and for how long.
    fn step(&mut self, policy: SchedPolicy) -> (ThreadId, Tick) {
        let decision = self.decide(policy);
        let handle = decision.thread().expect("a thread should be dispatched");
        assert!(!decision.is_deadline_miss());

        let thread = &mut self.threads[handle];
        let ran = thread.consume(decision.allocated_time);
        let id = thread.id();
        if thread.is_finished() {
            self.run_queue.remove(handle);
            self.threads.remove(handle).unwrap();
        }
        self.now += ran;
        (id, ran)
    }
}

#[test]
fn every_policy_dispatches_a_member_for_at_least_one_tick() {
    for policy in ALL_POLICIES {
        let mut cpu = Cpu::default();
        let members = [
            cpu.spawn(Thread::builder(3, 4).priority(2).build().unwrap()),
            cpu.spawn(Thread::builder(1, 1).periodic(50).build().unwrap()),
            cpu.spawn(
                Thread::builder(2, 6)
                    .periodic(40)
                    .soft(5)
                    .build()
                    .unwrap(),
            ),
        ];

        while !cpu.run_queue.is_empty() {
            let decision = cpu.decide(policy);
            assert!(decision.allocated_time >= 1, "{policy}: empty decision");
            let Some(handle) = decision.thread() else {
                // Only the CBS may leave a non-empty run queue idle.
                assert_eq!(policy, SchedPolicy::EdfCbs);
                cpu.now += decision.allocated_time;
                continue;
            };
            assert!(members.contains(&handle), "{policy}: not a member");

            let thread = &mut cpu.threads[handle];
            cpu.now += thread.consume(decision.allocated_time);
            if thread.is_finished() {
                cpu.run_queue.remove(handle);
            }
        }
    }
}

#[test]
fn every_policy_idles_on_an_empty_run_queue() {
    for policy in ALL_POLICIES {
        let mut cpu = Cpu {
            now: 3,
            ..Default::default()
        };
        assert_eq!(cpu.decide(policy), Decision::idle(1), "{policy}");

        let handle = cpu
            .threads
            .insert(Thread::builder(1, 1).build().unwrap())
            .unwrap();
        cpu.release_queue.push(10, handle);
        assert_eq!(cpu.decide(policy), Decision::idle(7), "{policy}");
    }
}

#[test]
fn default_policy_runs_in_id_order() {
    let mut cpu = Cpu::default();
    cpu.spawn(Thread::builder(2, 3).build().unwrap());
    cpu.spawn(Thread::builder(1, 2).build().unwrap());

    let order: Vec<_> = (0..2).map(|_| cpu.step(SchedPolicy::Default)).collect();
    assert_eq!(order, [(ThreadId::new(1), 2), (ThreadId::new(2), 3)]);
}

#[test]
fn hrrn_favors_the_longer_wait() {
    let mut cpu = Cpu {
        now: 10,
        ..Default::default()
    };
    cpu.spawn(Thread::builder(1, 4).arrival_time(8).build().unwrap());
    cpu.spawn(Thread::builder(2, 4).arrival_time(2).build().unwrap());

    assert_eq!(cpu.step(SchedPolicy::Hrrn), (ThreadId::new(2), 4));
}

#[test]
fn hrrn_ratio_tie_goes_to_smaller_id() {
    let mut cpu = Cpu {
        now: 6,
        ..Default::default()
    };
    // Both ratios are (wait + 2) / 2 with wait 4.
    cpu.spawn(Thread::builder(7, 2).arrival_time(2).build().unwrap());
    cpu.spawn(Thread::builder(5, 2).arrival_time(2).build().unwrap());

    assert_eq!(cpu.step(SchedPolicy::Hrrn), (ThreadId::new(5), 2));
}

#[test]
fn hrrn_waits_from_the_latest_release() {
    let mut cpu = Cpu {
        now: 10,
        ..Default::default()
    };
    let mut periodic = Thread::builder(2, 1).periodic(10).build().unwrap();
    periodic.consume(1);
    periodic.release_job(10);
    assert_eq!(periodic.arrival_time(), 10);
    cpu.spawn(periodic);
    cpu.spawn(Thread::builder(1, 1).arrival_time(10).build().unwrap());

    // Neither job has waited, so the tie goes to the smaller ID.
    assert_eq!(cpu.step(SchedPolicy::Hrrn), (ThreadId::new(1), 1));
    assert_eq!(cpu.step(SchedPolicy::Hrrn), (ThreadId::new(2), 1));
}

#[test]
fn round_robin_alternates_in_a_band() {
    let mut cpu = Cpu::default();
    cpu.spawn(Thread::builder(1, 5).priority(1).build().unwrap());
    cpu.spawn(Thread::builder(2, 5).priority(1).build().unwrap());

    let policy = SchedPolicy::PriorityRoundRobin { quantum: None };
    let trace: Vec<_> = (0..6).map(|_| cpu.step(policy)).collect();
    let (t1, t2) = (ThreadId::new(1), ThreadId::new(2));
    assert_eq!(
        trace,
        [(t1, 2), (t2, 2), (t1, 2), (t2, 2), (t1, 1), (t2, 1)]
    );
    assert!(cpu.threads.is_empty());
    assert_eq!(cpu.now, 10);
}

#[test]
fn round_robin_ignores_the_absolute_priority_value() {
    for priority in [-5, 0, 42] {
        let mut cpu = Cpu::default();
        cpu.spawn(Thread::builder(1, 4).priority(priority).build().unwrap());
        cpu.spawn(Thread::builder(2, 4).priority(priority).build().unwrap());
        cpu.spawn(Thread::builder(3, 4).priority(priority + 1).build().unwrap());

        let policy = SchedPolicy::PriorityRoundRobin { quantum: None };
        let trace: Vec<_> = (0..2).map(|_| cpu.step(policy).0).collect();
        assert_eq!(trace, [ThreadId::new(1), ThreadId::new(2)]);
    }
}

#[test]
fn round_robin_quantum_is_configurable() {
    let mut cpu = Cpu::default();
    cpu.spawn(Thread::builder(1, 5).build().unwrap());
    cpu.spawn(Thread::builder(2, 5).build().unwrap());

    let policy = SchedPolicy::PriorityRoundRobin { quantum: None }
        .with_quantum(NonZero::new(3).unwrap());
    assert_eq!(cpu.step(policy), (ThreadId::new(1), 3));
    assert_eq!(cpu.step(policy), (ThreadId::new(2), 3));
}

#[test]
fn dm_reports_a_deadline_reached_now() {
    let mut cpu = Cpu {
        now: 5,
        ..Default::default()
    };
    let late = cpu.spawn(
        Thread::builder(1, 3)
            .periodic(10)
            .deadline(5)
            .current_deadline(5)
            .build()
            .unwrap(),
    );
    cpu.spawn(
        Thread::builder(2, 1)
            .periodic(10)
            .deadline(2)
            .current_deadline(12)
            .build()
            .unwrap(),
    );

    assert_eq!(
        cpu.decide(SchedPolicy::DeadlineMonotonic),
        Decision::deadline_miss(late)
    );
}

#[test]
fn dm_overload_misses_a_deadline() {
    let policy = SchedPolicy::DeadlineMonotonic;
    let mut cpu = Cpu::default();
    cpu.spawn(Thread::builder(1, 4).periodic(6).deadline(5).build().unwrap());
    let starved = cpu.spawn(Thread::builder(2, 4).periodic(8).deadline(6).build().unwrap());

    assert_eq!(cpu.step(policy), (ThreadId::new(1), 4));
    assert_eq!(cpu.decide(policy), Decision::run(starved, 4));

    // T2 needs until tick 8 but is due at 6.
    cpu.now += cpu.threads[starved].consume(2);
    assert_eq!(cpu.now, 6);
    assert_eq!(cpu.decide(policy), Decision::deadline_miss(starved));
}

#[test]
fn edf_postpones_a_soft_deadline() {
    let mut cpu = Cpu {
        now: 4,
        ..Default::default()
    };
    let soft = cpu.spawn(
        Thread::builder(1, 3)
            .periodic(10)
            .current_deadline(5)
            .soft(2)
            .remaining_budget(2)
            .build()
            .unwrap(),
    );

    assert_eq!(cpu.decide(SchedPolicy::EdfCbs), Decision::run(soft, 2));
    assert_eq!(cpu.threads[soft].current_deadline(), 14);
    assert_eq!(cpu.threads[soft].cbs().remaining_budget(), 2);
}

#[test]
fn edf_throttles_and_replenishes() {
    let mut cpu = Cpu::default();
    let soft = cpu.spawn(Thread::builder(1, 5).periodic(10).soft(2).build().unwrap());

    // The first period's budget is spent, then the thread is throttled.
    assert_eq!(cpu.step(SchedPolicy::EdfCbs), (ThreadId::new(1), 2));
    assert_eq!(cpu.decide(SchedPolicy::EdfCbs), Decision::idle(1));
    assert!(cpu.threads[soft].cbs().is_throttled());
    assert_eq!(cpu.threads[soft].cbs().throttled_arrived_time(), Some(2));

    cpu.now = 10;
    assert_eq!(cpu.step(SchedPolicy::EdfCbs), (ThreadId::new(1), 2));
    let cbs = cpu.threads[soft].cbs();
    assert!(!cbs.is_throttled());
    assert_eq!(cbs.remaining_budget(), 0);
    assert_eq!(cpu.threads[soft].current_deadline(), 20);
}

#[test]
fn hard_threads_are_never_throttled() {
    let mut cpu = Cpu::default();
    let hard = cpu.spawn(Thread::builder(1, 7).periodic(10).build().unwrap());

    assert_eq!(cpu.decide(SchedPolicy::EdfCbs), Decision::run(hard, 7));
    assert!(!cpu.threads[hard].cbs().is_throttled());
}

#[test]
fn arena_detects_stale_handles_and_duplicates() {
    let mut threads = ThreadArena::new();
    let handle = threads.insert(Thread::builder(1, 1).build().unwrap()).unwrap();
    assert_eq!(
        threads
            .insert(Thread::builder(1, 2).build().unwrap())
            .unwrap_err()
            .error(),
        Errno::DuplicateId
    );

    threads.remove(handle).unwrap();
    assert!(!threads.contains(handle));
    assert_eq!(threads.remove(handle).unwrap_err().error(), Errno::StaleHandle);
}

#[test]
fn builder_rejects_inconsistent_parameters() {
    let rejected = [
        Thread::builder(1, 0).build(),
        Thread::builder(1, 2).periodic(4).soft(5).build(),
        Thread::builder(1, 2).periodic(4).soft(2).remaining_budget(3).build(),
    ];
    for result in rejected {
        assert_eq!(result.unwrap_err().error(), Errno::InvalidArgs);
    }
}

// SPDX-License-Identifier: MPL-2.0

/// The exit codes of the simulator.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    /// The command line or the task set file cannot be parsed.
    ParseConfig = 1,
    /// The task set describes threads the scheduler cannot accept.
    InvalidTaskSet = 2,
    /// A deadline was missed and `--on-miss abort` is in effect.
    DeadlineMiss = 3,
}

/// Print error message to console
#[macro_export]
macro_rules! error_msg {
    () => {{
        eprint!("")
    }};
    ($($arg:tt)*) => {{
        eprint!("[Error]: ");
        eprintln!($($arg)*);
    }};
}

/// Print warning message to console
#[macro_export]
macro_rules! warn_msg {
    () => {{
        eprint!("")
    }};
    ($($arg:tt)*) => {{
        eprint!("[Warn]: ");
        eprintln!($($arg)*);
    }};
}

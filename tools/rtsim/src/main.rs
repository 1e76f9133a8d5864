// SPDX-License-Identifier: MPL-2.0

mod cli;
mod config;
mod driver;
mod error;
mod report;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    cli::main();
}

//! Operator-facing console output.
//!
//! Everything here goes to stdout, interleaved with the output of the build
//! commands. Internal diagnostics go through `tracing` instead.

use crate::outcome::Outcome;
use console::style;

pub fn ok(msg: &str) {
    println!("{}", style(msg).green());
}

pub fn warn(msg: &str) {
    println!("{}", style(msg).yellow());
}

pub fn skip(msg: &str) {
    println!("{}", style(msg).yellow());
}

pub fn error(msg: &str) {
    println!("{}", style(msg).red().bold());
}

/// Echo a command before it runs.
pub fn command(args: &[String]) {
    println!("{}", style(format!("+++ {}", args.join(" "))).yellow());
}

pub fn step_start(name: &str) {
    println!("::group::{name}");
    println!(
        "{}",
        style(format!("-----------[ start test {name} ]-----------")).bold()
    );
}

/// Close the log group and print the result outside of it, where it is
/// easy to spot in a folded CI log.
pub fn step_end(name: &str, outcome: Outcome) {
    println!(
        "{}",
        style(format!("-----------[ end test {name} ]-----------")).bold()
    );
    println!("::endgroup::");
    match outcome {
        Outcome::Success => ok(&format!("{name} succeeded")),
        Outcome::Skip => skip(&format!("{name} skipped")),
        Outcome::Failure => error(&format!("{name} FAILED")),
        Outcome::Repeat => {}
    }
}

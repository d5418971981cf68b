//! Logging facilities.
//!
//! Every message carries a `[time LEVEL component]` prefix so interleaved
//! output from different components stays attributable and ordered by
//! simulated time. Level tags are colored only when stderr is a terminal.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};
use log::error;
use serde_json::json;
use serde_type_name::type_name;

use crate::event::Event;

/// Colors the level tag when stderr goes to a terminal, leaves it plain
/// otherwise (e.g. when logs are piped to a file).
pub fn get_colored(s: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        s.color(color)
    } else {
        s.normal()
    }
}

/// Logs at the info level with the simulated-time prefix.
///
/// The first argument is the component's `SimulationContext`, the rest is a
/// regular format string with arguments.
///
/// # Examples
///
/// ```rust
/// use std::io::Write;
/// use env_logger::Builder;
/// use vcsim_core::{log_info, Simulation, SimulationContext};
///
/// struct Reporter {
///     ctx: SimulationContext,
/// }
///
/// impl Reporter {
///     fn announce(&self, run: u32) {
///         log_info!(self.ctx, "run {} started", run);
///     }
/// }
///
/// Builder::from_default_env()
///     .format(|buf, record| writeln!(buf, "{}", record.args()))
///     .init();
///
/// let mut sim = Simulation::new(7);
/// let reporter = Reporter { ctx: sim.create_context("reporter") };
/// reporter.announce(1);
/// ```
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => (
        log::info!(
            target: $ctx.name(),
            "[{:.3} {}  {}] {}",
            $ctx.time(),
            $crate::log::get_colored("INFO", $crate::colored::Color::Green),
            $ctx.name(),
            format_args!($($arg)+)
        )
    );
}

/// Logs at the debug level with the simulated-time prefix.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => (
        log::debug!(
            target: $ctx.name(),
            "[{:.3} {} {}] {}",
            $ctx.time(),
            $crate::log::get_colored("DEBUG", $crate::colored::Color::Blue),
            $ctx.name(),
            format_args!($($arg)+)
        )
    );
}

/// Logs at the warn level with the simulated-time prefix.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => (
        log::warn!(
            target: $ctx.name(),
            "[{:.3} {}  {}] {}",
            $ctx.time(),
            $crate::log::get_colored("WARN", $crate::colored::Color::Yellow),
            $ctx.name(),
            format_args!($($arg)+)
        )
    );
}

fn log_dropped_event(kind: &str, event: &Event) {
    error!(
        target: "simulation",
        "[{:.3} {} simulation] {}: {}",
        event.time,
        get_colored("ERROR", Color::Red),
        kind,
        json!({"type": type_name(&event.data).unwrap(), "data": event.data, "src": event.src, "dst": event.dst})
    );
}

/// Logs an event no match arm of the receiving [`cast!`](crate::cast!)
/// accepted.
pub fn log_unhandled_event(event: Event) {
    log_dropped_event("Unhandled event", &event);
}

pub(crate) fn log_undelivered_event(event: Event) {
    log_dropped_event("Undelivered event", &event);
}

pub(crate) fn log_incorrect_event(event: Event, msg: &str) {
    log_dropped_event(&format!("Incorrect event ({})", msg), &event);
}

//! Parsing of the commands typed at the simulator prompt

use server_load_sim::{Adjusted, Applied, ControlCommand, Float};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Server count used when `s` is typed without a value
const DEFAULT_SERVERS: usize = 3;

/// Arrival rate used when `r` is typed without a value
const DEFAULT_ARRIVAL_RATE: Float = 2.0;

/// Processing time used when `p` is typed without a value
const DEFAULT_PROCESSING_TIME: Float = 1.0;

/// Processing variance used when `v` is typed without a value
const DEFAULT_PROCESSING_VARIANCE: Float = 0.3;

/// Something the user asked for at the prompt
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// Change the simulation
    Control(ControlCommand),

    /// Toggle the detailed statistics panel
    ShowStats,

    /// Leave the simulator
    Quit,
}

/// Why a line could not be understood
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The first word is not a known command
    #[error("Unknown command '{0}'")]
    Unknown(String),

    /// The value could not be parsed
    #[error("Invalid value '{value}' for {command}")]
    BadValue {
        command: &'static str,
        value: String,
    },

    /// A command that takes no value was given one
    #[error("{0} takes no value")]
    UnexpectedValue(&'static str),

    /// Words were left over after the value
    #[error("Unexpected input '{0}'")]
    TrailingInput(String),
}

/// Parse one line typed at the prompt
///
/// Returns None for a blank line.
pub fn parse(line: &str) -> Option<Result<Command, ParseError>> {
    let mut words = line.split_whitespace();
    let keyword = words.next()?.to_lowercase();
    let value = words.next();
    if let Some(extra) = words.next() {
        return Some(Err(ParseError::TrailingInput(extra.to_owned())));
    }
    let command = match keyword.as_str() {
        "s" | "servers" => {
            parse_value("servers", value, DEFAULT_SERVERS).map(ControlCommand::Resize)
        }
        "r" | "rate" => parse_value("rate", value, DEFAULT_ARRIVAL_RATE)
            .map(ControlCommand::SetArrivalRate),
        "p" | "processing" => parse_value("processing", value, DEFAULT_PROCESSING_TIME)
            .map(ControlCommand::SetProcessingTime),
        "v" | "variance" => parse_value("variance", value, DEFAULT_PROCESSING_VARIANCE)
            .map(ControlCommand::SetProcessingVariance),
        "reset" => no_value("reset", value).map(|()| ControlCommand::Reset),
        "stats" => return Some(no_value("stats", value).map(|()| Command::ShowStats)),
        "q" | "quit" => return Some(no_value("quit", value).map(|()| Command::Quit)),
        _ => return Some(Err(ParseError::Unknown(keyword))),
    };
    Some(command.map(Command::Control))
}

/// Parse an optional value, falling back to a default
fn parse_value<T: FromStr>(
    command: &'static str,
    value: Option<&str>,
    default: T,
) -> Result<T, ParseError> {
    match value {
        None => Ok(default),
        Some(text) => text.parse().map_err(|_| ParseError::BadValue {
            command,
            value: text.to_owned(),
        }),
    }
}

/// Check that a command was not given a value
fn no_value(command: &'static str, value: Option<&str>) -> Result<(), ParseError> {
    match value {
        None => Ok(()),
        Some(_) => Err(ParseError::UnexpectedValue(command)),
    }
}

/// One-line report of what a control command did
pub fn describe(applied: &Applied) -> String {
    fn clamped<T: fmt::Display + PartialOrd + Copy>(adjusted: &Adjusted<T>) -> String {
        if !adjusted.was_clamped() {
            String::new()
        } else if adjusted.requested < adjusted.applied {
            format!(" (requested {}, raised to the minimum)", adjusted.requested)
        } else {
            format!(" (requested {}, lowered to the maximum)", adjusted.requested)
        }
    }
    match applied {
        Applied::Resized(count) => {
            format!("Updated servers to {}{}", count.applied, clamped(count))
        }
        Applied::ArrivalRate(rate) => {
            format!("Updated arrival rate to {}/s{}", rate.applied, clamped(rate))
        }
        Applied::ProcessingTime(time) => {
            format!("Updated processing time to {}s{}", time.applied, clamped(time))
        }
        Applied::ProcessingVariance(variance) => format!(
            "Updated processing variance to {}s{}",
            variance.applied,
            clamped(variance)
        ),
        Applied::Reset => "Simulation reset".to_owned(),
    }
}

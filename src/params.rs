use nom::bytes::complete::{tag, take_until};
use nom::character::complete::digit1;
use nom::combinator::map_res;
use nom::IResult;

use crate::PreparedQuery;

/// How many positional parameters the configured query expects.
///
/// Only used to build diagnostics, never to validate requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterCount {
    /// Reported by the engine itself.
    Exact(usize),
    /// A guess from counting `?` in the query text.
    Approximate(usize),
}

impl ParameterCount {
    pub fn value(self) -> usize {
        match self {
            ParameterCount::Exact(n) | ParameterCount::Approximate(n) => n,
        }
    }

    pub fn is_exact(self) -> bool {
        matches!(self, ParameterCount::Exact(_))
    }
}

impl std::fmt::Display for ParameterCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterCount::Exact(n) => write!(f, "{n}"),
            ParameterCount::Approximate(n) => {
                write!(f, "{n} (approximate, counted '?' placeholders)")
            }
        }
    }
}

/// Something that can find out how many parameters a statement takes.
pub trait ParameterProbe {
    /// Best effort, never fails. Runs the statement for real, so only call
    /// this once at startup.
    fn probe_parameter_count(&mut self) -> ParameterCount;
}

impl ParameterProbe for PreparedQuery<'_> {
    fn probe_parameter_count(&mut self) -> ParameterCount {
        // Executing with no arguments either works (no parameters) or makes
        // the engine tell us how many it wanted.
        let outcome = match self.run(&[]) {
            Ok(rows) => rows.map(|row| row.map(drop)).collect::<Result<(), _>>(),
            Err(e) => Err(e),
        };
        let count = count_from_probe(outcome.map_err(|e| e.to_string()), self.sql());
        if !count.is_exact() {
            tracing::warn!(
                %count,
                "parameter count not reported by the engine, counted placeholders instead"
            );
        }
        count
    }
}

/// Interpret the outcome of a zero argument execution of `sql`.
pub(crate) fn count_from_probe(outcome: Result<(), String>, sql: &str) -> ParameterCount {
    match outcome {
        Ok(()) => ParameterCount::Exact(0),
        Err(message) => match find_argument_count(&message) {
            Some((expected, 0)) => ParameterCount::Exact(expected),
            _ => ParameterCount::Approximate(count_placeholders(sql)),
        },
    }
}

pub fn count_placeholders(sql: &str) -> usize {
    sql.matches('?').count()
}

fn number(i: &str) -> IResult<&str, usize> {
    map_res(digit1, str::parse::<usize>)(i)
}

fn argument_count(i: &str) -> IResult<&str, (usize, usize)> {
    let (i, _) = take_until("expected ")(i)?;
    let (i, _) = tag("expected ")(i)?;
    let (i, expected) = number(i)?;
    let (i, _) = tag(" arguments, got ")(i)?;
    let (i, got) = number(i)?;
    Ok((i, (expected, got)))
}

/// Find `expected N arguments, got M` anywhere in an error message.
pub(crate) fn find_argument_count(message: &str) -> Option<(usize, usize)> {
    let mut rest = message;
    while !rest.is_empty() {
        match argument_count(rest) {
            Ok((_, counts)) => return Some(counts),
            Err(_) => {
                // Skip past this "expected " and look for the next one.
                let (_, tail) = rest.split_once("expected ")?;
                rest = tail;
            }
        }
    }
    None
}

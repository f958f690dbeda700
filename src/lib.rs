//! Serve one prepared SQLite query over HTTP. Clients POST a headerless CSV
//! body; every line runs the query once with the line's fields as positional
//! parameters, and the response streams back a JSON array with one
//! `{"in", "headers", "out"}` object per line, in input order.
//!
//! The main entrypoints are
//!
//! - [`Executor`] which owns the database connection(s) and the prepared query,
//! - [`server::router`] which builds the HTTP routes on top of an executor,
//! - [`pipeline::stream_envelope`] which answers a single request body
//!   synchronously and is what the HTTP handler runs on an executor worker.
//!
//! Responses are streamed. Once the first line's result has been sent the
//! status is committed to `200`, so a later failure can only be reported by
//! appending the error text to the body, which leaves the JSON unterminated.
//! Clients must treat a body that does not parse as a failed request.

pub mod config;
pub mod encoder;
mod error;
pub mod executor;
pub mod help;
mod params;
pub mod pipeline;
mod query;
pub mod reader;
pub mod server;

#[cfg(test)]
mod fixtures;

pub use error::{ConfigError, ExecError, PipelineError};
pub use executor::Executor;
pub use params::{count_placeholders, ParameterCount, ParameterProbe};
pub use query::{Cell, PreparedQuery, QueryRows};

//! Error taxonomy.
//!
//! Four families, each with its own fate:
//!
//! - [`RegistrationError`]: a programming error found while building the
//!   [`Router`](crate::Router). Fatal: the application should refuse to start.
//! - [`ParseError`]: a client sent bytes that are not a request we can
//!   route. Answered with `400 Bad Request`, then the connection closes.
//! - [`HandlerError`]: a handler returned `Err` or panicked. Answered with
//!   `500 Internal Server Error`.
//! - [`Error`]: infrastructure: binding, accepting, bad listen address.
//!
//! "No endpoint matched" is not an error at all. It is a normal `404`.

use std::io;

use thiserror::Error;

/// The error type returned by tsurezure's fallible server operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("invalid listen address `{0}`")]
    InvalidAddress(String),

    #[error("registration: {0}")]
    Registration(#[from] RegistrationError),
}

/// Why a `register` / `middleware` call was rejected.
///
/// The router is left untouched whenever one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("invalid http method: {0} is not a valid http method")]
    InvalidMethod(String),

    #[error("invalid pattern `{0}`: must be a non-empty path starting with `/`")]
    InvalidPattern(String),

    #[error("invalid options supplied to {site}: expected a mapping")]
    OptionsNotMapping { site: &'static str },

    #[error("invalid key `{key}` used as option to {site}")]
    UnknownOption { site: &'static str, key: String },

    #[error("option `{key}` supplied to {site} has the wrong type")]
    InvalidOptionValue { site: &'static str, key: String },

    #[error("duplicate path: {method} {pattern} is already registered")]
    DuplicatePath { method: String, pattern: String },
}

/// A request that could not be turned into a [`Request`](crate::Request).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("could not decode body: {0}")]
    BodyDecode(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// A handler or middleware that failed instead of producing a reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

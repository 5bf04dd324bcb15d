//! Endpoint registry.
//!
//! One bucket per HTTP method; each bucket keeps its endpoints in
//! registration order and lookup takes the first pattern that matches.
//! A (method, pattern) pair can be registered once. The same pattern under
//! another method is a separate endpoint.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::RegistrationError;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::options::{OptionSchema, Options};
use crate::pattern::{Params, Pattern};

pub(crate) struct Endpoint {
    pub(crate) pattern: Pattern,
    pub(crate) handler: BoxedHandler,
    pub(crate) options: Options,
}

#[derive(Default)]
pub struct Registry {
    buckets: HashMap<Method, Vec<Endpoint>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores an endpoint.
    ///
    /// Checks run in a fixed order (method, pattern, options, duplicate) and
    /// the registry is unchanged when any of them fails.
    pub fn register(
        &mut self,
        method: &str,
        pattern: &str,
        handler: impl Handler,
        options: Option<Value>,
    ) -> Result<(), RegistrationError> {
        let method = Method::from_token(method)
            .ok_or_else(|| RegistrationError::InvalidMethod(method.to_owned()))?;

        if !pattern.starts_with('/') {
            return Err(RegistrationError::InvalidPattern(pattern.to_owned()));
        }

        let options = OptionSchema::ENDPOINT.validate(options)?;

        let bucket = self.buckets.entry(method).or_default();
        if bucket.iter().any(|e| e.pattern.as_str() == pattern) {
            return Err(RegistrationError::DuplicatePath {
                method: method.to_string(),
                pattern: pattern.to_owned(),
            });
        }

        bucket.push(Endpoint {
            pattern: Pattern::parse(pattern),
            handler: handler.into_boxed_handler(),
            options,
        });
        Ok(())
    }

    /// First endpoint under `method` whose pattern matches `path`, with the
    /// variables it binds.
    pub(crate) fn lookup(&self, method: Method, path: &str) -> Option<(&Endpoint, Params)> {
        self.buckets
            .get(&method)?
            .iter()
            .find_map(|e| e.pattern.extract(path).map(|params| (e, params)))
    }

    /// Number of endpoints across all methods.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

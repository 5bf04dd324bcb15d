//! Endpoint and middleware options.
//!
//! Options are supplied at registration time as a JSON mapping and are
//! checked against an [`OptionSchema`]. Endpoints and middleware each have
//! their own schema, so the two vocabularies can grow independently.

use serde_json::{Map, Value};

use crate::error::RegistrationError;

/// The JSON type an option value must have.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OptionKind {
    String,
    /// A single string or an array of strings.
    StringList,
    Bool,
}

impl OptionKind {
    fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, Value::String(_)) => true,
            (Self::StringList, Value::String(_)) => true,
            (Self::StringList, Value::Array(items)) => items.iter().all(Value::is_string),
            (Self::Bool, Value::Bool(_)) => true,
            _ => false,
        }
    }
}

/// An allow-list of option keys for one registration call site.
#[derive(Debug)]
pub struct OptionSchema {
    site: &'static str,
    keys: &'static [(&'static str, OptionKind)],
}

impl OptionSchema {
    pub const ENDPOINT: OptionSchema = OptionSchema {
        site: "register",
        keys: &[
            ("content_type", OptionKind::String),
            ("method", OptionKind::StringList),
            ("location", OptionKind::String),
        ],
    };

    pub const MIDDLEWARE: OptionSchema = OptionSchema {
        site: "middleware",
        keys: &[
            ("content_type", OptionKind::String),
            ("method", OptionKind::StringList),
            ("location", OptionKind::String),
            ("imply_get", OptionKind::Bool),
        ],
    };

    /// Validates `raw` and turns it into [`Options`].
    ///
    /// `None` is an empty option set. Anything other than a JSON object,
    /// an unknown key, or a value of the wrong type is rejected.
    pub fn validate(&self, raw: Option<Value>) -> Result<Options, RegistrationError> {
        let map = match raw {
            None => return Ok(Options::default()),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(RegistrationError::OptionsNotMapping { site: self.site }),
        };

        for (key, value) in &map {
            let Some((_, kind)) = self.keys.iter().find(|(name, _)| name == key) else {
                return Err(RegistrationError::UnknownOption { site: self.site, key: key.clone() });
            };
            if !kind.accepts(value) {
                return Err(RegistrationError::InvalidOptionValue {
                    site: self.site,
                    key: key.clone(),
                });
            }
        }

        Ok(Options(map))
    }
}

/// A validated option set.
///
/// Attached to endpoints and middleware at registration, merged into the
/// [`Request`](crate::Request) at dispatch and carried on the
/// [`Envelope`](crate::Envelope) to the writer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Options(Map<String, Value>);

impl Options {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.0.get("content_type").and_then(Value::as_str)
    }

    pub fn location(&self) -> Option<&str> {
        self.0.get("location").and_then(Value::as_str)
    }

    /// The `method` option rendered as an `Allow` header value.
    pub fn allow(&self) -> Option<String> {
        match self.0.get("method")? {
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => Some(
                items.iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            _ => None,
        }
    }

    pub fn imply_get(&self) -> bool {
        self.0.get("imply_get").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Overlays `other` on top of `self`; keys in `other` win.
    pub fn merge(&mut self, other: &Options) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Sets a single key without schema validation. Used for envelopes built
    /// by handlers, which never pass through registration.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }
}

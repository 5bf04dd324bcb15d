//! Application router: endpoint registry plus middleware chain.
//!
//! Build it once at startup, then hand it to [`Server::serve`]. After that
//! it is shared behind an `Arc` and only ever read, so there is no way to
//! register routes while connections are being served.
//!
//! Every registration method consumes and returns the router, so calls chain
//! with `?` and the first mistake stops startup:
//!
//! ```rust,no_run
//! # use tsurezure::{Method, Request, Router};
//! # use serde_json::{Value, json};
//! # async fn get_user(_: Request) -> Value { json!({}) }
//! # async fn create_user(_: Request) -> Value { json!({}) }
//! # async fn moved(_: Request) -> &'static str { "" }
//! # fn main() -> Result<(), tsurezure::RegistrationError> {
//! let app = Router::new()
//!     .get("/users/:id", get_user)?
//!     .post("/users", create_user)?
//!     .register("get", "/old", moved, Some(json!({ "location": "/new" })))?;
//! # Ok(()) }
//! ```
//!
//! [`Server::serve`]: crate::Server::serve

use serde_json::Value;

use crate::error::RegistrationError;
use crate::handler::Handler;
use crate::method::Method;
use crate::middleware::{Middleware, MiddlewareChain};
use crate::registry::Registry;

/// The application router.
#[derive(Default)]
pub struct Router {
    pub(crate) registry: Registry,
    pub(crate) middleware: MiddlewareChain,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint. `method` is matched case-insensitively against
    /// the known method tokens; `options` must be a JSON object using only
    /// `content_type`, `method` and `location`.
    pub fn register(
        mut self,
        method: &str,
        pattern: &str,
        handler: impl Handler,
        options: Option<Value>,
    ) -> Result<Self, RegistrationError> {
        self.registry.register(method, pattern, handler, options)?;
        Ok(self)
    }

    /// Register a handler for a typed method + pattern pair.
    pub fn on(self, method: Method, pattern: &str, handler: impl Handler) -> Result<Self, RegistrationError> {
        self.register(method.as_str(), pattern, handler, None)
    }

    pub fn get(self, pattern: &str, handler: impl Handler) -> Result<Self, RegistrationError> {
        self.on(Method::Get, pattern, handler)
    }

    pub fn post(self, pattern: &str, handler: impl Handler) -> Result<Self, RegistrationError> {
        self.on(Method::Post, pattern, handler)
    }

    pub fn put(self, pattern: &str, handler: impl Handler) -> Result<Self, RegistrationError> {
        self.on(Method::Put, pattern, handler)
    }

    pub fn patch(self, pattern: &str, handler: impl Handler) -> Result<Self, RegistrationError> {
        self.on(Method::Patch, pattern, handler)
    }

    pub fn delete(self, pattern: &str, handler: impl Handler) -> Result<Self, RegistrationError> {
        self.on(Method::Delete, pattern, handler)
    }

    /// Append a middleware under `pattern` (`*` for every path).
    pub fn middleware(self, pattern: &str, handler: impl Middleware) -> Result<Self, RegistrationError> {
        self.add_middleware(pattern, handler, None)
    }

    /// Like [`Router::middleware`] with options: `content_type`, `method`,
    /// `location` and `imply_get`.
    pub fn middleware_with(
        self,
        pattern: &str,
        handler: impl Middleware,
        options: Value,
    ) -> Result<Self, RegistrationError> {
        self.add_middleware(pattern, handler, Some(options))
    }

    fn add_middleware(
        mut self,
        pattern: &str,
        handler: impl Middleware,
        options: Option<Value>,
    ) -> Result<Self, RegistrationError> {
        self.middleware.add(pattern, handler, options)?;
        Ok(self)
    }
}

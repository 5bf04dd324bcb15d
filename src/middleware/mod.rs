//! Middleware chain.
//!
//! Middleware runs before endpoint dispatch and may answer the request
//! itself. Entries are grouped by pattern; a pattern may be registered any
//! number of times and its entries run in the order they were added.
//!
//! For each request:
//! 1. every pattern key matching the path is selected, in the order the key
//!    was first registered (`*` matches everything);
//! 2. each entry under a selected key is called with the request annotated
//!    with its own path variables and options;
//! 3. the first entry returning a non-empty `Some(_)` ends the chain. Its
//!    reply becomes the response and no endpoint runs. A bare `null`, `""`,
//!    `{}` or `[]` counts as passing.
//!
//! ```rust,no_run
//! use tsurezure::{Envelope, Request, Router};
//! use serde_json::json;
//!
//! async fn require_token(req: Request) -> Option<Envelope> {
//!     match req.header("authorization") {
//!         Some(_) => None,
//!         None => Some(Envelope::new(400, json!({ "message": "missing token" }))),
//!     }
//! }
//!
//! # fn main() -> Result<(), tsurezure::RegistrationError> {
//! let app = Router::new().middleware("/admin/:page", require_token)?;
//! # Ok(()) }
//! ```
//!
//! Entries registered with `{"imply_get": true}` only run for `GET` requests.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{HandlerError, RegistrationError};
use crate::handler::{BoxFuture, guarded};
use crate::options::{OptionSchema, Options};
use crate::pattern::Pattern;
use crate::request::Request;
use crate::response::{Envelope, IntoReply, Reply};

#[doc(hidden)]
pub trait ErasedMiddleware {
    fn call(&self, req: Request) -> BoxFuture<Result<Option<Reply>, HandlerError>>;
}

#[doc(hidden)]
pub type BoxedMiddleware = Arc<dyn ErasedMiddleware + Send + Sync + 'static>;

/// Implemented for every valid middleware function:
///
/// ```text
/// async fn name(req: Request) -> Option<impl IntoReply>
/// ```
///
/// `None` passes the request on, as does `Some` of an empty bare value;
/// anything else answers it.
pub trait Middleware: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_middleware(self) -> BoxedMiddleware;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<R>> + Send + 'static,
    R: IntoReply + Send + 'static,
{
}

impl<F, Fut, R> Middleware for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<R>> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn into_boxed_middleware(self) -> BoxedMiddleware {
        Arc::new(FnMiddleware(self))
    }
}

struct FnMiddleware<F>(F);

impl<F, Fut, R> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Option<R>> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<Result<Option<Reply>, HandlerError>> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.map(IntoReply::into_reply).transpose() })
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

struct Entry {
    handler: BoxedMiddleware,
    options: Options,
}

/// Ordered middleware table, keyed by pattern.
#[derive(Default)]
pub struct MiddlewareChain {
    keys: Vec<(Pattern, Vec<Entry>)>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware under `pattern`. Repeated patterns accumulate.
    pub fn add(
        &mut self,
        pattern: &str,
        handler: impl Middleware,
        options: Option<Value>,
    ) -> Result<(), RegistrationError> {
        if pattern != Pattern::WILDCARD && !pattern.starts_with('/') {
            return Err(RegistrationError::InvalidPattern(pattern.to_owned()));
        }
        let options = OptionSchema::MIDDLEWARE.validate(options)?;
        let entry = Entry { handler: handler.into_boxed_middleware(), options };

        match self.keys.iter_mut().find(|(p, _)| p.as_str() == pattern) {
            Some((_, entries)) => entries.push(entry),
            None => self.keys.push((Pattern::parse(pattern), vec![entry])),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Runs the chain for `req`.
    ///
    /// `Ok(Some(_))` is a short-circuit envelope whose options come from the
    /// middleware that produced it. `Ok(None)` means every entry passed.
    pub async fn run(&self, req: &Request) -> Result<Option<Envelope>, HandlerError> {
        let is_get = req.method() == "GET";

        for (pattern, entries) in &self.keys {
            let Some(params) = pattern.extract(req.path()) else {
                continue;
            };

            for entry in entries {
                if entry.options.imply_get() && !is_get {
                    continue;
                }

                let mut annotated = req.clone();
                annotated.params = params.clone();
                annotated.options.merge(&entry.options);
                let options = annotated.options.clone();

                let handler = Arc::clone(&entry.handler);
                match guarded(async move { handler.call(annotated).await }).await? {
                    Some(reply) if !reply.is_empty() => return Ok(Some(reply.normalize(&options))),
                    _ => {}
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    async fn pass(_req: Request) -> Option<Envelope> {
        None
    }

    async fn deny(req: Request) -> Option<Envelope> {
        Some(Envelope::new(400, json!({ "denied": req.path() })))
    }

    #[tokio::test]
    async fn passing_chain_yields_nothing() {
        let mut chain = MiddlewareChain::new();
        chain.add("*", pass, None).unwrap();
        chain.add("/a", pass, None).unwrap();
        assert_eq!(chain.run(&Request::new("GET", "/a")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn first_short_circuit_wins() {
        let mut chain = MiddlewareChain::new();
        chain.add("/a", pass, None).unwrap();
        chain.add("/a", deny, None).unwrap();
        chain.add("/a", |_req: Request| async { Some("late") }, None).unwrap();

        let env = chain.run(&Request::new("GET", "/a")).await.unwrap().unwrap();
        assert_eq!(env.status, 400);
        assert_eq!(env.body, json!({ "denied": "/a" }));
    }

    #[tokio::test]
    async fn keys_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();

        for (pattern, tag) in [("/users/:id", "var"), ("*", "wild"), ("/users/7", "lit")] {
            let seen = Arc::clone(&seen);
            chain
                .add(
                    pattern,
                    move |_req: Request| {
                        seen.lock().unwrap().push(tag);
                        async { None::<Envelope> }
                    },
                    None,
                )
                .unwrap();
        }
        // Re-using an earlier key appends to it rather than creating a new one.
        let again = Arc::clone(&seen);
        chain
            .add(
                "/users/:id",
                move |_req: Request| {
                    again.lock().unwrap().push("var-again");
                    async { None::<Envelope> }
                },
                None,
            )
            .unwrap();

        chain.run(&Request::new("GET", "/users/7")).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["var", "var-again", "wild", "lit"]);
    }

    #[tokio::test]
    async fn middleware_sees_its_own_variables_and_options() {
        let mut chain = MiddlewareChain::new();
        chain
            .add(
                "/files/:name",
                |req: Request| async move {
                    Some(Value::String(req.param("name").unwrap_or_default().to_owned()))
                },
                Some(json!({ "content_type": "text/plain" })),
            )
            .unwrap();

        let env = chain.run(&Request::new("GET", "/files/readme")).await.unwrap().unwrap();
        assert_eq!(env.status, 200);
        assert_eq!(env.body, json!("readme"));
        assert_eq!(env.options.content_type(), Some("text/plain"));
    }

    #[tokio::test]
    async fn empty_values_pass_the_request_on() {
        let mut chain = MiddlewareChain::new();
        chain.add("*", |_req: Request| async { Some("") }, None).unwrap();
        chain.add("*", |_req: Request| async { Some(Value::Null) }, None).unwrap();
        chain.add("*", |_req: Request| async { Some(json!({})) }, None).unwrap();
        chain.add("*", |_req: Request| async { Some(json!([])) }, None).unwrap();
        assert_eq!(chain.run(&Request::new("GET", "/")).await.unwrap(), None);

        chain.add("*", deny, None).unwrap();
        let env = chain.run(&Request::new("GET", "/")).await.unwrap().unwrap();
        assert_eq!(env.status, 400);
    }

    #[tokio::test]
    async fn imply_get_skips_other_methods() {
        let mut chain = MiddlewareChain::new();
        chain.add("*", deny, Some(json!({ "imply_get": true }))).unwrap();

        assert!(chain.run(&Request::new("POST", "/x")).await.unwrap().is_none());
        assert!(chain.run(&Request::new("GET", "/x")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn panicking_middleware_is_a_handler_failure() {
        let mut chain = MiddlewareChain::new();
        chain
            .add(
                "*",
                |_req: Request| async {
                    if true {
                        panic!("boom");
                    }
                    None::<Envelope>
                },
                None,
            )
            .unwrap();
        assert!(chain.run(&Request::new("GET", "/")).await.is_err());
    }

    #[test]
    fn rejects_bad_patterns_and_options() {
        let mut chain = MiddlewareChain::new();
        assert_eq!(
            chain.add("admin", pass, None),
            Err(RegistrationError::InvalidPattern("admin".into()))
        );
        assert!(matches!(
            chain.add("/admin", pass, Some(json!({ "retries": 3 }))),
            Err(RegistrationError::UnknownOption { .. })
        ));
        assert!(chain.is_empty());
    }
}

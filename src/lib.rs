//! # tsurezure
//!
//! A minimal HTTP/1.1 server on raw TCP streams: path-pattern routing,
//! middleware, and responses picked by status code.
//!
//! ## The pipeline
//!
//! One connection, one request, one response:
//!
//! ```text
//! bytes → Request parser → middleware chain ─┬─ short-circuit ─┐
//!                                            └─ endpoint ──────┴→ Envelope → writer → bytes
//! ```
//!
//! - Patterns are `/`-separated segments; `:name` binds a variable and `*`
//!   (middleware only) matches everything. See [`pattern`].
//! - Bodies are decoded as JSON. A missing body is `{}`.
//! - Handlers return a bare value (wrapped as `200`) or an [`Envelope`].
//! - Unmatched requests get `{"status":404,"message":"undefined endpoint"}`.
//!
//! Not here: keep-alive, chunked encoding, TLS, HTTP/2, timeouts. Put a
//! reverse proxy in front if you need them.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use serde_json::{Value, json};
//! use tsurezure::{Envelope, Request, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tsurezure::Error> {
//!     let app = Router::new()
//!         .get("/users/:id", get_user)?
//!         .post("/users", create_user)?;
//!
//!     Server::bind("0.0.0.0:8888")?.serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Value {
//!     json!({ "id": req.param("id") })
//! }
//!
//! async fn create_user(req: Request) -> Envelope {
//!     Envelope::new(201, req.body().clone())
//! }
//! ```

mod dispatcher;
mod error;
mod handler;
mod method;
mod options;
mod registry;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod middleware;
pub mod pattern;

pub use dispatcher::dispatch;
pub use error::{Error, HandlerError, ParseError, RegistrationError};
pub use handler::Handler;
pub use method::Method;
pub use middleware::{Middleware, MiddlewareChain};
pub use options::{OptionKind, OptionSchema, Options};
pub use registry::Registry;
pub use request::{Request, parse as parse_request};
pub use response::{Envelope, IntoReply, Reply};
pub use router::Router;
pub use server::{Server, serve_connection};
pub use status::Status;

//! Minimal tsurezure example: JSON endpoints, a redirect and middleware.
//!
//! Run with:
//!   RUST_LOG=tsurezure=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:8888/users/42
//!   curl -X POST http://localhost:8888/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -i http://localhost:8888/old-users
//!   curl -i http://localhost:8888/admin/stats

use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use tsurezure::{Envelope, Request, Router, Server};

#[tokio::main]
async fn main() -> Result<(), tsurezure::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = Router::new()
        .get("/", |_req: Request| async { json!({ "hello": "world" }) })?
        .get("/users/:id", get_user)?
        .post("/users", create_user)?
        .register("get", "/old-users", moved, Some(json!({ "location": "/users" })))?
        .register("get", "/about", about, Some(json!({ "content_type": "text/html" })))?
        .middleware("/admin/:page", require_token)?;

    Server::bind("0.0.0.0:8888")?.serve(app).await
}

// GET /users/:id → 200 with the bare value as body
async fn get_user(req: Request) -> Value {
    json!({ "id": req.param("id"), "name": "alice" })
}

// POST /users
//
// req.body() is already decoded JSON; `{}` when the client sent nothing.
async fn create_user(req: Request) -> Envelope {
    match req.body().get("name") {
        Some(name) => Envelope::new(201, json!({ "id": "99", "name": name })),
        None => Envelope::new(400, json!({ "status": 400, "message": "bad request: name is required" })),
    }
}

// GET /old-users → 301, Location from the endpoint options
async fn moved(_req: Request) -> Envelope {
    Envelope::new(301, "")
}

async fn about(_req: Request) -> &'static str {
    "<h1>tsurezure</h1>"
}

// Everything under /admin needs a token.
async fn require_token(req: Request) -> Option<Envelope> {
    if req.header("authorization").is_some() {
        return None;
    }
    Some(Envelope::new(400, json!({
        "status": 400,
        "message": format!("bad request: {} needs a token", req.param("page").unwrap_or_default()),
    })))
}

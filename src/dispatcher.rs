//! Request dispatch: middleware first, then the matched endpoint.
//!
//! Exactly one envelope comes out per request, from one of:
//! - a middleware short-circuit;
//! - the canonical `404` when no endpoint matches (including unknown methods);
//! - the endpoint handler's reply, normalised with the endpoint's options;
//! - a `500` when a handler or middleware fails.

use std::sync::Arc;

use tracing::{error, warn};

use crate::handler::guarded;
use crate::method::Method;
use crate::request::Request;
use crate::response::Envelope;
use crate::router::Router;

/// Routes one request and produces its envelope.
pub async fn dispatch(router: &Router, mut req: Request) -> Envelope {
    match router.middleware.run(&req).await {
        Ok(Some(envelope)) => return envelope,
        Ok(None) => {}
        Err(e) => {
            error!(method = req.method(), path = req.path(), "middleware failed: {e}");
            return Envelope::server_error(e);
        }
    }

    let Ok(method) = req.method().parse::<Method>() else {
        warn!(method = req.method(), "unrecognised http method");
        return Envelope::not_found();
    };

    let Some((endpoint, params)) = router.registry.lookup(method, req.path()) else {
        return Envelope::not_found();
    };

    req.params = params;
    req.options.merge(&endpoint.options);
    let path = req.path.clone();
    let handler = Arc::clone(&endpoint.handler);

    match guarded(async move { handler.call(req).await }).await {
        Ok(reply) => reply.normalize(&endpoint.options),
        Err(e) => {
            error!(%method, path = %path, "handler failed: {e}");
            Envelope::server_error(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde_json::{Value, json};

    use super::*;
    use crate::response::JSON;

    async fn hello(_req: Request) -> Value {
        json!({ "hello": "world" })
    }

    async fn echo_params(req: Request) -> Value {
        json!({ "params": req.params(), "ct": req.options().content_type() })
    }

    #[tokio::test]
    async fn raw_values_are_wrapped_as_200() {
        let router = Router::new().get("/", hello).unwrap();
        let env = dispatch(&router, Request::new("GET", "/")).await;
        assert_eq!(env.status, 200);
        assert_eq!(env.body, json!({ "hello": "world" }));
    }

    #[tokio::test]
    async fn unmatched_paths_get_the_canonical_404() {
        let router = Router::new().get("/", hello).unwrap();

        for req in [
            Request::new("GET", "/missing"),
            Request::new("POST", "/"),
            Request::new("BREW", "/"),
        ] {
            let env = dispatch(&router, req).await;
            assert_eq!(env.status, 404);
            assert_eq!(env.body, json!({ "status": 404, "message": "undefined endpoint" }));
            assert_eq!(env.options.content_type(), Some(JSON));
        }
    }

    #[tokio::test]
    async fn handler_sees_variables_and_endpoint_options() {
        let router = Router::new()
            .register("GET", "/users/:id", echo_params, Some(json!({ "content_type": "text/plain" })))
            .unwrap();

        let env = dispatch(&router, Request::new("GET", "/users/42?x=1")).await;
        assert_eq!(env.body, json!({ "params": { "id": "42" }, "ct": "text/plain" }));
        assert_eq!(env.options.content_type(), Some("text/plain"));
    }

    #[tokio::test]
    async fn endpoint_options_override_envelope_options() {
        let router = Router::new()
            .register(
                "GET",
                "/old",
                |_req: Request| async {
                    Envelope::new(301, "")
                        .with_option("location", "/from-handler")
                        .with_option("content_type", "text/html")
                },
                Some(json!({ "location": "/from-endpoint" })),
            )
            .unwrap();

        let env = dispatch(&router, Request::new("GET", "/old")).await;
        assert_eq!(env.status, 301);
        assert_eq!(env.options.location(), Some("/from-endpoint"));
        assert_eq!(env.options.content_type(), Some("text/html"));
    }

    #[tokio::test]
    async fn short_circuit_skips_the_endpoint() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);

        let router = Router::new()
            .get("/secret", move |_req: Request| {
                flag.store(true, Ordering::SeqCst);
                async { "secret" }
            })
            .and_then(|r| {
                r.middleware("/secret", |_req: Request| async {
                    Some(Envelope::new(400, json!({ "message": "no" })))
                })
            })
            .unwrap();

        let env = dispatch(&router, Request::new("GET", "/secret")).await;
        assert_eq!(env.status, 400);
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn empty_middleware_result_lets_the_endpoint_run() {
        let router = Router::new()
            .get("/", |_req: Request| async { "endpoint" })
            .and_then(|r| r.middleware("*", |_req: Request| async { Some("") }))
            .unwrap();

        let env = dispatch(&router, Request::new("GET", "/")).await;
        assert_eq!(env.status, 200);
        assert_eq!(env.body, json!("endpoint"));
    }

    #[tokio::test]
    async fn middleware_can_answer_paths_without_endpoints() {
        let router = Router::new()
            .middleware_with(
                "*",
                |req: Request| async move {
                    (req.path() == "/ping").then_some("pong")
                },
                json!({ "content_type": "text/plain" }),
            )
            .unwrap();

        let env = dispatch(&router, Request::new("GET", "/ping")).await;
        assert_eq!(env.status, 200);
        assert_eq!(env.body, json!("pong"));
        assert_eq!(env.options.content_type(), Some("text/plain"));

        let env = dispatch(&router, Request::new("GET", "/pong")).await;
        assert_eq!(env.status, 404);
    }

    #[tokio::test]
    async fn failing_handlers_become_500() {
        let router = Router::new()
            .get("/err", |_req: Request| async { Err::<Value, _>("database unavailable") })
            .and_then(|r| {
                r.get("/panic", |_req: Request| async {
                    if true {
                        panic!("boom");
                    }
                    "unreachable"
                })
            })
            .unwrap();

        let env = dispatch(&router, Request::new("GET", "/err")).await;
        assert_eq!(env.status, 500);
        assert_eq!(
            env.body,
            json!({ "status": 500, "message": "server error: database unavailable" })
        );

        let env = dispatch(&router, Request::new("GET", "/panic")).await;
        assert_eq!(env.status, 500);
    }
}

//! End-to-end tests over a real socket.
//!
//! Each test binds a server on `127.0.0.1:0`, talks to it with `reqwest` and
//! shuts it down at the end.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use callgate_core::{Accountability, CallError, InvocationContext, Partial};
use callgate_server::{
    Dispatcher, FunctionRegistry, InvocationEnvelope, Server, ServerConfig, ShutdownSignal,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Notify;

const TOKEN: &str = "e2e-token";
const MAX_BODY_SIZE: usize = 4 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct Item {
    foo: String,
    bar: i64,
}

async fn touch(_ctx: InvocationContext, mut item: Partial<Item>) -> Result<Partial<Item>, anyhow::Error> {
    item.foo = format!("{}-touched", item.foo);
    item.bar *= 2;
    Ok(item)
}

async fn caller(ctx: InvocationContext) -> Result<Option<String>, anyhow::Error> {
    Ok(ctx.accountability().and_then(|acc| acc.user.clone()))
}

async fn validate(_ctx: InvocationContext, item: Item) -> Result<(), CallError> {
    if item.foo.is_empty() {
        return Err(CallError::failed_validation("items", "foo", "must not be empty"));
    }
    Ok(())
}

async fn fail(_ctx: InvocationContext) -> Result<(), anyhow::Error> {
    anyhow::bail!("storage unavailable")
}

async fn crash(_ctx: InvocationContext) -> Result<(), anyhow::Error> {
    panic!("handler crashed")
}

async fn stall(ctx: InvocationContext) -> Result<(), anyhow::Error> {
    ctx.cancelled().await;
    Ok(())
}

struct TestServer {
    addr: SocketAddr,
    shutdown: ShutdownSignal,
    handle: tokio::task::JoinHandle<()>,
    client: reqwest::Client,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(Self::registry(), Duration::from_millis(300)).await
    }

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry
            .register("touch", touch)
            .register("caller", caller)
            .register("validate", validate)
            .register("fail", fail)
            .register("crash", crash)
            .register("stall", stall);
        registry
    }

    async fn start_with(registry: FunctionRegistry, invoke_timeout: Duration) -> Self {
        let dispatcher = Dispatcher::new(registry).with_invoke_timeout(invoke_timeout);
        let config = ServerConfig::builder()
            .http_addr("127.0.0.1:0")
            .token(TOKEN)
            .shutdown_timeout(Duration::from_millis(500))
            .max_body_size(MAX_BODY_SIZE)
            .build();

        let bound = Server::new(config, dispatcher).bind().await.unwrap();
        let addr = bound.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let handle = tokio::spawn(bound.serve(shutdown.clone()));

        Self {
            addr,
            shutdown,
            handle,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn invoke(&self, envelope: &InvocationEnvelope) -> reqwest::Response {
        self.client
            .post(self.url("/__callgo/invoke"))
            .bearer_auth(TOKEN)
            .json(envelope)
            .send()
            .await
            .unwrap()
    }

    async fn invoke_ok(&self, envelope: &InvocationEnvelope) -> Value {
        let response = self.invoke(envelope).await;
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()["content-type"],
            "application/json; charset=utf-8"
        );
        response.json().await.unwrap()
    }

    async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .unwrap()
            .unwrap();
    }
}

#[tokio::test]
async fn test_ping_answers_pong() {
    let server = TestServer::start().await;

    let reply = server
        .invoke_ok(&InvocationEnvelope::new("ping", Value::Null))
        .await;
    assert_eq!(reply, json!({"payload": "pong"}));

    server.stop().await;
}

#[tokio::test]
async fn test_partial_keeps_unknown_fields() {
    let server = TestServer::start().await;

    let reply = server
        .invoke_ok(&InvocationEnvelope::new(
            "touch",
            json!({"foo": "foo-value", "bar": 42, "baz": "baz-value", "deep": {"object": true}}),
        ))
        .await;

    assert_eq!(
        reply["payload"],
        json!({"foo": "foo-value-touched", "bar": 84, "baz": "baz-value", "deep": {"object": true}})
    );

    server.stop().await;
}

#[tokio::test]
async fn test_accountability_reaches_function() {
    let server = TestServer::start().await;

    let envelope =
        InvocationEnvelope::new("caller", Value::Null).with_accountability(Accountability::user("u-42"));
    assert_eq!(server.invoke_ok(&envelope).await, json!({"payload": "u-42"}));

    let anonymous = InvocationEnvelope::new("caller", Value::Null);
    assert_eq!(server.invoke_ok(&anonymous).await, json!({}));

    server.stop().await;
}

#[tokio::test]
async fn test_function_listing_is_sorted() {
    let server = TestServer::start().await;

    let names: Vec<String> = server
        .client
        .get(server.url("/__callgo/functions"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(
        names,
        vec!["caller", "crash", "fail", "ping", "stall", "touch", "validate"]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_transport_errors() {
    let server = TestServer::start().await;

    let unauthorized = server
        .client
        .post(server.url("/__callgo/invoke"))
        .bearer_auth("wrong")
        .json(&InvocationEnvelope::new("ping", Value::Null))
        .send()
        .await
        .unwrap();
    assert_eq!(unauthorized.status(), 401);
    assert_eq!(unauthorized.text().await.unwrap(), "wrong authorization token");

    let wrong_method = server
        .client
        .put(server.url("/__callgo/invoke"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_method.status(), 405);

    let not_found = server
        .invoke(&InvocationEnvelope::new("missing", Value::Null))
        .await;
    assert_eq!(not_found.status(), 404);
    assert_eq!(not_found.text().await.unwrap(), r#"function "missing" not found"#);

    let bad_payload = server
        .invoke(&InvocationEnvelope::new("validate", json!({"foo": 1})))
        .await;
    assert_eq!(bad_payload.status(), 400);
    assert!(bad_payload
        .text()
        .await
        .unwrap()
        .starts_with("cannot decode request payload: "));

    let malformed = server
        .client
        .post(server.url("/__callgo/invoke"))
        .bearer_auth(TOKEN)
        .body("{")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), 400);
    assert_eq!(malformed.text().await.unwrap(), "invalid request");

    let elsewhere = server.client.get(server.url("/")).send().await.unwrap();
    assert_eq!(elsewhere.status(), 404);

    server.stop().await;
}

#[tokio::test]
async fn test_structured_and_plain_errors() {
    let server = TestServer::start().await;

    let structured = server
        .invoke_ok(&InvocationEnvelope::new("validate", json!({"foo": "", "bar": 0})))
        .await;
    assert_eq!(structured["callGoError"]["code"], "FAILED_VALIDATION");
    assert_eq!(structured["callGoError"]["extensions"]["field"], "foo");
    assert!(structured.get("error").is_none());

    let plain = server
        .invoke_ok(&InvocationEnvelope::new("fail", Value::Null))
        .await;
    assert_eq!(plain, json!({"error": "storage unavailable"}));

    server.stop().await;
}

#[tokio::test]
async fn test_panic_and_timeout_keep_serving() {
    let server = TestServer::start().await;

    let crashed = server
        .invoke_ok(&InvocationEnvelope::new("crash", Value::Null))
        .await;
    assert_eq!(crashed["error"], "function crash panicked: handler crashed");

    let stalled = server
        .invoke_ok(&InvocationEnvelope::new("stall", Value::Null))
        .await;
    assert!(stalled["error"]
        .as_str()
        .unwrap()
        .starts_with("function stall timed out"));

    let alive = server
        .invoke_ok(&InvocationEnvelope::new("ping", Value::Null))
        .await;
    assert_eq!(alive["payload"], "pong");

    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_invocations() {
    let server = std::sync::Arc::new(TestServer::start().await);

    let calls: Vec<_> = (0..16)
        .map(|i| {
            let server = std::sync::Arc::clone(&server);
            tokio::spawn(async move {
                let reply = server
                    .invoke_ok(&InvocationEnvelope::new(
                        "touch",
                        json!({"foo": format!("item-{i}"), "bar": i, "extra": i}),
                    ))
                    .await;
                (i, reply)
            })
        })
        .collect();

    for call in calls {
        let (i, reply) = call.await.unwrap();
        assert_eq!(
            reply["payload"],
            json!({"foo": format!("item-{i}-touched"), "bar": i * 2, "extra": i})
        );
    }

    let server = std::sync::Arc::try_unwrap(server).ok().unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_oversized_envelope_is_rejected() {
    let server = TestServer::start().await;

    let oversized = InvocationEnvelope::new(
        "touch",
        json!({"foo": "x".repeat(MAX_BODY_SIZE * 4), "bar": 1}),
    );
    let response = server.invoke(&oversized).await;
    assert_eq!(response.status(), 413);
    assert_eq!(response.text().await.unwrap(), "request body too large");

    let alive = server
        .invoke_ok(&InvocationEnvelope::new("ping", Value::Null))
        .await;
    assert_eq!(alive["payload"], "pong");

    server.stop().await;
}

#[tokio::test]
async fn test_client_disconnect_cancels_function() {
    let started = Arc::new(Notify::new());
    let cancelled = Arc::new(Notify::new());

    let mut registry = FunctionRegistry::new();
    registry.register("watch", {
        let started = Arc::clone(&started);
        let cancelled = Arc::clone(&cancelled);
        move |ctx: InvocationContext| {
            let started = Arc::clone(&started);
            let cancelled = Arc::clone(&cancelled);
            async move {
                started.notify_one();
                ctx.cancelled().await;
                cancelled.notify_one();
                Ok::<_, anyhow::Error>(())
            }
        }
    });
    let server = TestServer::start_with(registry, Duration::from_secs(60)).await;

    let body = serde_json::to_string(&InvocationEnvelope::new("watch", Value::Null)).unwrap();
    let request = format!(
        "POST /__callgo/invoke HTTP/1.1\r\nHost: {}\r\nAuthorization: Bearer {TOKEN}\r\n\
         Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        server.addr,
        body.len()
    );
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), started.notified())
        .await
        .unwrap();
    drop(stream);

    tokio::time::timeout(Duration::from_secs(5), cancelled.notified())
        .await
        .unwrap();

    server.stop().await;
}

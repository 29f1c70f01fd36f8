//! Integration tests for the performer transports over real sockets.
//!
//! Tests:
//! - Equivalence: the same task yields the same result over HTTP and RPC
//! - Error classes: validation and method failures on both transports
//! - Health: HTTP `running`, RPC `SERVING`, streaming health unimplemented
//! - Shutdown: an in-flight task finishes within the grace period

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use hourglass::config::ServerConfig;
use hourglass::lifecycle::Component;
use hourglass::server::{performer_server, HttpServer, Performer, HTTP_ENDPOINT, RPC_ENDPOINT};
use hourglass::types::TaskResult;
use hourglass::worker::{DelayedWorker, HexSquareWorker, SquareOutput, SquareWorker, Worker};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

struct Running {
    server: HttpServer,
    http: SocketAddr,
    rpc: SocketAddr,
    client: reqwest::Client,
}

impl Running {
    async fn start(worker: Arc<dyn Worker>) -> Self {
        let server = performer_server(Performer::from_arc(worker), &ServerConfig::ephemeral());
        server.start(CancellationToken::new()).await.unwrap();
        let http = server.local_addr(HTTP_ENDPOINT).unwrap();
        let rpc = server.local_addr(RPC_ENDPOINT).unwrap();
        Self {
            server,
            http,
            rpc,
            client: reqwest::Client::new(),
        }
    }

    async fn post_task(&self, task: &Value) -> (u16, Value) {
        let response = self
            .client
            .post(format!("http://{}/tasks", self.http))
            .json(task)
            .send()
            .await
            .unwrap();
        (response.status().as_u16(), response.json().await.unwrap())
    }

    async fn rpc(&self, method: &str, params: Value) -> Value {
        let response = self
            .client
            .post(format!("http://{}/rpc", self.rpc))
            .json(&json!({"jsonrpc": "2.0", "id": 7, "method": method, "params": params}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        response.json().await.unwrap()
    }
}

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn task(id: &str, payload: &[u8]) -> Value {
    json!({
        "taskId": id,
        "avsAddress": "0xavs",
        "operatorSetId": 3,
        "payload": b64(payload),
    })
}

#[tokio::test]
async fn http_and_rpc_return_identical_results() {
    let running = Running::start(Arc::new(HexSquareWorker::new())).await;
    let task = task("t-eq", b"0xff");

    let (status, over_http) = running.post_task(&task).await;
    assert_eq!(status, 200);
    let over_rpc = running.rpc("performer.ExecuteTask", task).await;
    assert_eq!(over_rpc["id"], 7);

    let over_http: TaskResult = serde_json::from_value(over_http).unwrap();
    let over_rpc: TaskResult = serde_json::from_value(over_rpc["result"].clone()).unwrap();
    assert_eq!(over_http, over_rpc);
    assert_eq!(over_http.task_id, "t-eq");
    assert_eq!(over_http.result, b"0xfe01");

    running.server.close().await.unwrap();
}

#[tokio::test]
async fn squares_json_payload() {
    let running = Running::start(Arc::new(SquareWorker::new())).await;

    let (status, body) = running
        .post_task(&task("t-sq", br#"{"numberToBeSquared": 4}"#))
        .await;
    assert_eq!(status, 200);
    let result: TaskResult = serde_json::from_value(body).unwrap();
    let output: SquareOutput = serde_json::from_slice(&result.result).unwrap();
    assert_eq!(output.value().unwrap(), num_bigint::BigInt::from(16u32));
    assert!(output.timestamp > 0);

    running.server.close().await.unwrap();
}

#[tokio::test]
async fn failures_are_classified_on_both_transports() {
    let running = Running::start(Arc::new(SquareWorker::new())).await;
    let bad = task("t-bad", br#"{"numberToBeSquared": "four"}"#);

    let (status, body) = running.post_task(&bad).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["kind"], "validation_error");

    let response = running.rpc("performer.ExecuteTask", bad).await;
    assert_eq!(response["error"]["code"], -32602);
    assert_eq!(response["error"]["data"]["status"], "INVALID_ARGUMENT");

    let response = running
        .client
        .get(format!("http://{}/tasks", running.http))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 405);

    running.server.close().await.unwrap();
}

#[tokio::test]
async fn health_surfaces() {
    let running = Running::start(Arc::new(HexSquareWorker::new())).await;

    let body: Value = running
        .client
        .get(format!("http://{}/health", running.http))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "running"}));

    let check = running.rpc("health.Check", json!({"service": ""})).await;
    assert_eq!(check["result"], json!({"status": "SERVING"}));

    let watch = running.rpc("health.Watch", json!({})).await;
    assert_eq!(watch["error"]["data"]["status"], "UNIMPLEMENTED");

    running.server.close().await.unwrap();
}

#[tokio::test]
async fn in_flight_task_completes_during_shutdown() {
    let worker = DelayedWorker::new(HexSquareWorker::new(), Duration::from_millis(300));
    let running = Running::start(Arc::new(worker)).await;

    let client = running.client.clone();
    let url = format!("http://{}/tasks", running.http);
    let pending = tokio::spawn(async move {
        client
            .post(url)
            .json(&task("t-slow", b"0x3"))
            .send()
            .await?
            .json::<TaskResult>()
            .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    running.server.close().await.unwrap();

    let result = pending.await.unwrap().unwrap();
    assert_eq!(result.task_id, "t-slow");
    assert_eq!(result.result, b"0x9");
    assert!(reqwest::get(format!("http://{}/health", running.http))
        .await
        .is_err());
}

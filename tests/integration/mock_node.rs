//! JSON-RPC node served over HTTP for exercising `TraceClient`

use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router, Server};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A request as seen by the node
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub params: Value,
    /// Lower-cased header names
    pub headers: Vec<(String, String)>,
}

pub type RpcReply = Result<Value, (i64, String)>;
type Handler = Arc<dyn Fn(&str, &Value) -> RpcReply + Send + Sync>;

#[derive(Clone)]
struct NodeState {
    handler: Handler,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct MockNode {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl MockNode {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> RpcReply + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = NodeState {
            handler: Arc::new(handler),
            requests: requests.clone(),
        };
        let app = Router::new().route("/", post(rpc)).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind test listener");
        listener
            .set_nonblocking(true)
            .expect("failed to enable non-blocking listener");
        let addr = listener.local_addr().expect("failed to read listener address");
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let server = Server::from_tcp(listener)
            .expect("failed to build axum server")
            .serve(app.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
        let task = tokio::spawn(async move {
            let _ = server.await;
        });

        Self {
            addr,
            requests,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.task.abort();
    }
}

async fn rpc(
    State(state): State<NodeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    let params = body["params"].clone();
    let reply = (state.handler)(&method, &params);

    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    state.requests.lock().unwrap().push(RecordedRequest {
        method,
        params,
        headers,
    });

    Json(match reply {
        Ok(result) => json!({"jsonrpc": "2.0", "id": body["id"], "result": result}),
        Err((code, message)) => json!({
            "jsonrpc": "2.0",
            "id": body["id"],
            "error": {"code": code, "message": message}
        }),
    })
}

//! Local HTTP stub for exercising the reqwest-backed clients

use std::sync::Arc;
use std::time::Duration;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use axum::Router;
use parking_lot::Mutex;

/// A request as the stub server saw it
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

type Responder = Arc<dyn Fn(&Captured) -> Response + Send + Sync>;

#[derive(Clone)]
struct StubState {
    requests: Arc<Mutex<Vec<Captured>>>,
    respond: Responder,
    stall: Option<Method>,
}

pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Captured>>>,
}

impl StubServer {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&Captured) -> Response + Send + Sync + 'static,
    {
        Self::spawn(Arc::new(respond), None).await
    }

    /// Requests with `method` are recorded and then never answered
    pub async fn stalling<F>(method: Method, respond: F) -> Self
    where
        F: Fn(&Captured) -> Response + Send + Sync + 'static,
    {
        Self::spawn(Arc::new(respond), Some(method)).await
    }

    async fn spawn(respond: Responder, stall: Option<Method>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let state = StubState {
            requests: requests.clone(),
            respond,
            stall,
        };
        let app = Router::new().fallback(handle).with_state(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().clone()
    }

    /// Wait until a request with `method` has arrived
    pub async fn wait_for(&self, method: Method) -> Captured {
        for _ in 0..200 {
            if let Some(found) = self.requests().into_iter().find(|r| r.method == method) {
                return found;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no {} request arrived", method);
    }
}

async fn handle(State(state): State<StubState>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let captured = Captured {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(String::from),
        headers,
        body,
    };
    let response = (state.respond)(&captured);
    let stall = state.stall.as_ref() == Some(&captured.method);
    state.requests.lock().push(captured);

    if stall {
        std::future::pending::<()>().await;
    }
    response
}

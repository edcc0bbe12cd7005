use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use parking_lot::Mutex;
use tokio::net::TcpListener;

/// Scripted behaviour of an in-process peer.
#[allow(unused)]
#[derive(Debug, Clone)]
pub struct PeerBehaviour {
    pub info_status: StatusCode,
    pub info_body: String,
    pub items_status: StatusCode,
    pub items_body: String,
    pub delay: Duration,
}

impl Default for PeerBehaviour {
    fn default() -> Self {
        Self {
            info_status: StatusCode::OK,
            info_body: r#"{"ServerName":"peer","Version":"10.9.0"}"#.into(),
            items_status: StatusCode::OK,
            items_body: r#"{"Items":[],"TotalRecordCount":0}"#.into(),
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
struct Recorded {
    headers: Vec<HeaderMap>,
}

#[derive(Clone)]
struct PeerState {
    behaviour: Arc<PeerBehaviour>,
    recorded: Arc<Mutex<Recorded>>,
}

// Code is used by test modules, but not in this scope
#[allow(unused)]
#[derive(Debug)]
pub struct FakePeer {
    pub addr: SocketAddr,
    recorded: Arc<Mutex<Recorded>>,
}

#[allow(unused)]
impl FakePeer {
    pub async fn spawn(behaviour: PeerBehaviour) -> Result<Self> {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let state = PeerState {
            behaviour: Arc::new(behaviour),
            recorded: Arc::clone(&recorded),
        };

        let app = Router::new()
            .route("/System/Info", get(system_info))
            .route("/Items", get(items))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind fake peer")?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { addr, recorded })
    }

    /// Base address as an operator would type it.
    pub fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> usize {
        self.recorded.lock().headers.len()
    }

    pub fn last_headers(&self) -> Option<HeaderMap> {
        self.recorded.lock().headers.last().cloned()
    }
}

async fn system_info(
    State(state): State<PeerState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.recorded.lock().headers.push(headers);
    tokio::time::sleep(state.behaviour.delay).await;
    (state.behaviour.info_status, state.behaviour.info_body.clone())
}

async fn items(
    State(state): State<PeerState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.recorded.lock().headers.push(headers);
    tokio::time::sleep(state.behaviour.delay).await;
    (state.behaviour.items_status, state.behaviour.items_body.clone())
}

/// An address nothing listens on.
#[allow(unused)]
pub async fn closed_address() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}"))
}

//! HTTP handlers for the Click-to-Call API

use axum::{
    extract::{ConnectInfo, Query, State},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::call::{CallRequest, CallResult};
use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    /// Manager interface the service dials through, `host:port`
    pub manager: String,
    pub allow_list_entries: usize,
}

/// `exten` and `number`, from the query string or a form body
#[derive(Debug, Default, Deserialize)]
pub struct CallParams {
    #[serde(default)]
    pub exten: String,
    #[serde(default)]
    pub number: String,
}

impl CallParams {
    pub fn into_request(self) -> CallRequest {
        CallRequest::new(&self.exten, &self.number)
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health_report(&state))
}

fn health_report(state: &AppState) -> HealthResponse {
    HealthResponse {
        status: "healthy".to_string(),
        service: "click-to-call".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        manager: format!("{}:{}", state.config.ami.host, state.config.ami.port),
        allow_list_entries: state.workflow.allow_list().len(),
    }
}

pub async fn place_call_query(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(params): Query<CallParams>,
) -> Json<CallResult> {
    place_call(&state, peer, params).await
}

pub async fn place_call_form(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Form(params): Form<CallParams>,
) -> Json<CallResult> {
    place_call(&state, peer, params).await
}

async fn place_call(state: &AppState, peer: SocketAddr, params: CallParams) -> Json<CallResult> {
    let client_addr = client_address(peer);
    let request = params.into_request();
    Json(state.workflow.originate(&request, &client_addr).await)
}

/// Peer IP as text; IPv4 clients on a dual-stack socket show up as
/// `::ffff:a.b.c.d` and are unwrapped
fn client_address(peer: SocketAddr) -> String {
    peer.ip().to_canonical().to_string()
}

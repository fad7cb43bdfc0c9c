//! Click-to-Call Microservice
//!
//! HTTP front for the call origination workflow.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use click_to_call::{routes, AppState, CallWorkflow, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    c2c_telemetry::init("click-to-call")?;

    info!("Starting Click-to-Call microservice");

    // Load configuration
    let config = Config::from_env()?;
    let bind_addr = config.bind_address()?;

    let workflow = Arc::new(CallWorkflow::new(&config));
    if workflow.allow_list().is_empty() {
        tracing::warn!("Allow-list is empty, every call request will be refused");
    }

    info!(
        ami_host = %config.ami.host,
        ami_port = config.ami.port,
        allow_list = workflow.allow_list().len(),
        max_retry = config.max_retry,
        "Manager interface configured"
    );

    let state = AppState {
        workflow,
        config: Arc::new(config),
    };

    let app = routes::create_router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    info!("Click-to-Call listening on {}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

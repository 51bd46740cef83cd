//! Liveness endpoint for uptime monitors.

use axum::{extract::State, response::Html, routing::get, Router};
use gemwatch_alerts::escape_html;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

struct LivenessState {
    page: String,
}

/// Create the liveness router.
pub fn create_router(bot_name: &str) -> Router {
    let state = Arc::new(LivenessState {
        page: format!(
            "<h2>{} Bot is running! ✅</h2>",
            escape_html(bot_name)
        ),
    });

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index_handler(State(state): State<Arc<LivenessState>>) -> Html<String> {
    Html(state.page.clone())
}

/// Health check handler.
async fn health_handler() -> &'static str {
    "OK"
}

/// Bind `addr` and serve the liveness router in the background until
/// `shutdown` turns true. Returns the bound address.
pub async fn start_liveness_server(
    addr: SocketAddr,
    bot_name: &str,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(SocketAddr, JoinHandle<()>), std::io::Error> {
    let app = create_router(bot_name);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("Liveness endpoint listening on http://{}", local_addr);

    let handle = tokio::spawn(async move {
        let stop = async move {
            let _ = shutdown.wait_for(|stopping| *stopping).await;
        };
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(stop).await {
            error!("Liveness server error: {}", e);
        }
    });

    Ok((local_addr, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test]
    async fn test_liveness_routes() {
        let (tx, rx) = watch::channel(false);
        let (addr, handle) = start_liveness_server(([127, 0, 0, 1], 0).into(), "Zeus Gems", rx)
            .await
            .unwrap();
        let client = reqwest::Client::new();

        let index = client.get(format!("http://{}/", addr)).send().await.unwrap();
        assert_eq!(index.status().as_u16(), 200);
        assert!(index
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/html")));
        assert_eq!(
            index.text().await.unwrap(),
            "<h2>Zeus Gems Bot is running! ✅</h2>"
        );

        let health = client.get(format!("http://{}/health", addr)).send().await.unwrap();
        assert_eq!(health.status().as_u16(), 200);
        assert_eq!(health.text().await.unwrap(), "OK");

        let missing = client.get(format!("http://{}/nope", addr)).send().await.unwrap();
        assert_eq!(missing.status().as_u16(), 404);

        drop(client);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_bot_name_is_escaped() {
        let (_tx, rx) = watch::channel(false);
        let (addr, handle) = start_liveness_server(([127, 0, 0, 1], 0).into(), "<Gems>", rx)
            .await
            .unwrap();

        let body = reqwest::get(format!("http://{}/", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "<h2>&lt;Gems&gt; Bot is running! ✅</h2>");
        handle.abort();
    }
}

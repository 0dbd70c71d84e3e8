//! Console demo: open a session, send one message, print whatever arrives.
//!
//! Usage: `cargo run --example echo_client [ws://host:port/path]`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use wsession::{init_logging, ConnectionState, Endpoint, Session, SessionHandler};

struct ConsoleHandler;

impl SessionHandler for ConsoleHandler {
    fn on_status_changed(&self, status: &str) {
        println!("[status] {status}");
    }

    fn on_message_received(&self, text: &str, index: u64) {
        println!("[response {index}] {text}");
    }

    fn on_send_enabled_changed(&self, enabled: bool) {
        println!("[send {}]", if enabled { "enabled" } else { "disabled" });
    }
}

async fn wait_for_state(session: &Session, wanted: ConnectionState) -> Result<()> {
    tokio::time::timeout(Duration::from_secs(10), async {
        while session.state() != wanted {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("timed out waiting for {:?}", wanted))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("info");

    let uri = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "wss://ws.postman-echo.com/raw".to_string());
    let endpoint = Endpoint::new(uri)?;
    let session = Session::new(endpoint, Arc::new(ConsoleHandler));

    session.request_open();
    wait_for_state(&session, ConnectionState::Established).await?;

    session.request_send("hello from wsession");
    tokio::time::sleep(Duration::from_secs(2)).await;

    session.request_close();
    wait_for_state(&session, ConnectionState::Closed).await?;

    println!("probe rtt: {:?}", session.stats().last_probe_rtt);
    Ok(())
}

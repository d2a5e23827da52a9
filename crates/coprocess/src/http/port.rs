//! Local port availability

use tokio::net::TcpListener;

use crate::error::{ProcessError, Result};

/// True when `port` on `host` can be bound right now.
///
/// The answer is only a snapshot; another process may take the port before
/// the server binds it.
pub async fn port_available(host: &str, port: u16) -> bool {
    TcpListener::bind((host, port)).await.is_ok()
}

/// First free port in `from..=to`.
pub async fn find_free_port(host: &str, from: u16, to: u16) -> Result<u16> {
    for port in from..=to {
        if port_available(host, port).await {
            return Ok(port);
        }
    }
    Err(ProcessError::NoFreePort {
        host: host.to_string(),
        from,
        to,
    })
}

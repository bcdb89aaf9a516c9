//! Reachability probing for the companion routing service
//!
//! Presence of the routing service is determined solely by TCP reachability,
//! not by a handshake protocol.

use std::time::Duration;
use tokio::net::TcpStream;

/// Check whether a TCP listener is reachable at `host:port` within `timeout`.
///
/// Returns `true` if a connection is established, `false` on connection error
/// or timeout. An unreachable port is the expected false case, never an error.
/// The probing socket is dropped (and therefore closed) on every path.
pub async fn is_reachable(host: &str, port: u16, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_reachable_when_listener_bound() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(is_reachable("127.0.0.1", port, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_unreachable_when_no_listener() {
        // Bind and immediately drop to obtain a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(!is_reachable("127.0.0.1", port, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_unreachable_on_timeout() {
        // RFC 5737 TEST-NET address; connection attempts hang until timeout.
        assert!(!is_reachable("192.0.2.1", 8554, Duration::from_millis(100)).await);
    }
}

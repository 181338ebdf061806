//! TCP liveness probing.
//!
//! A probe only opens and drops a connection; it never speaks the RPC
//! protocol. That is enough to tell "serving" from "bound but hung" from
//! "nothing there".

use std::io;
use std::time::Duration;

use smartmem_core::Liveness;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Classify `host:port`. Never blocks longer than `limit`.
pub async fn probe(host: &str, port: u16, limit: Duration) -> Liveness {
    match timeout(limit, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            drop(stream);
            Liveness::Responsive
        }
        Ok(Err(e)) => classify_connect_error(&e),
        Err(_) => {
            trace!(host, port, "probe timed out after {limit:?}");
            Liveness::Unresponsive
        }
    }
}

fn classify_connect_error(e: &io::Error) -> Liveness {
    match e.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrNotAvailable => Liveness::Unbound,
        // Can't prove nothing is there; keep the conservative answer.
        _ => {
            trace!("probe connect failed: {e}");
            Liveness::Unresponsive
        }
    }
}

use async_trait::async_trait;
use std::io;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

use super::PortConnector;

/// Plain TCP connect probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl PortConnector for TcpConnector {
    async fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<Duration> {
        let started = Instant::now();
        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => Ok(started.elapsed()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("timed out after {:.3} seconds", timeout.as_secs_f64()),
            )),
        }
    }
}

//! StatsD UDP listener
//!
//! Receives datagrams, parses them and merges the metrics into the shared
//! aggregator. Runs as its own task until the cancellation token fires.

use std::net::SocketAddr;
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::common::SourceMetrics;

use super::aggregator::StatsdAggregator;
use super::parser::{content_lines, parse};

/// Bound StatsD socket plus the state it feeds
pub struct StatsdListener {
    socket: UdpSocket,
    aggregator: Arc<StatsdAggregator>,
    metrics: Arc<SourceMetrics>,
    buffer_size: usize,
}

impl StatsdListener {
    /// Bind the UDP socket; must be called inside a tokio runtime
    pub fn bind(
        addr: SocketAddr,
        buffer_size: usize,
        aggregator: Arc<StatsdAggregator>,
        metrics: Arc<SourceMetrics>,
    ) -> std::io::Result<Self> {
        Ok(Self {
            socket: bind_udp(addr)?,
            aggregator,
            metrics,
            buffer_size: buffer_size.max(1),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        let mut buf = vec![0u8; self.buffer_size];

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, peer)) => {
                            self.metrics.datagram_received(len as u64);
                            let message = String::from_utf8_lossy(&buf[..len]);
                            tracing::trace!(peer = %peer, len, "statsd datagram");
                            self.handle_message(&message);
                        }
                        Err(e) => {
                            self.metrics.error();
                            tracing::debug!(error = %e, "statsd recv error");
                        }
                    }
                }
            }
        }

        tracing::debug!("statsd listener stopped");
    }

    /// Parse one datagram payload and merge its metrics
    pub fn handle_message(&self, message: &str) {
        let message = trim_trailing_newlines(message);
        if message.is_empty() {
            return;
        }

        let metrics = parse(message);
        let lines = content_lines(message).count() as u64;
        let parsed = metrics.len() as u64;
        self.metrics.lines(parsed, lines.saturating_sub(parsed));

        for metric in metrics {
            self.aggregator.add_metric(metric);
        }
    }
}

/// Create a reuse-address UDP socket bound to `addr`
fn bind_udp(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

/// Trim every trailing CR and LF
#[inline]
pub fn trim_trailing_newlines(message: &str) -> &str {
    message.trim_end_matches(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_trailing_newlines() {
        assert_eq!(trim_trailing_newlines("a:1|c\r\n"), "a:1|c");
        assert_eq!(trim_trailing_newlines("a:1|c\n\n"), "a:1|c");
        assert_eq!(trim_trailing_newlines("a:1|c\nb:2|g"), "a:1|c\nb:2|g");
        assert_eq!(trim_trailing_newlines("\r\n"), "");
    }
}

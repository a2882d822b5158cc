//! Upstream resolver selection and question forwarding.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::Record;
use tokio::net::UdpSocket;

use super::DnsError;

/// Resolver used when the system configuration names none.
pub const DEFAULT_UPSTREAM: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);

/// Largest UDP response accepted from upstream.
const MAX_RESPONSE_SIZE: usize = 4096;

/// Read the first `nameserver` entry from a resolv.conf style file.
///
/// A missing file or a file without an IPv4 nameserver yields
/// [`DEFAULT_UPSTREAM`]. Other I/O errors propagate.
pub async fn resolve_upstream(resolv_conf: &Path) -> Result<Ipv4Addr, std::io::Error> {
    match tokio::fs::read_to_string(resolv_conf).await {
        Ok(contents) => Ok(parse_nameserver(&contents).unwrap_or(DEFAULT_UPSTREAM)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(DEFAULT_UPSTREAM),
        Err(e) => Err(e),
    }
}

/// First IPv4 `nameserver` address in `contents`.
pub fn parse_nameserver(contents: &str) -> Option<Ipv4Addr> {
    contents.lines().find_map(|line| {
        let line = line.trim();
        if line.starts_with('#') || line.starts_with(';') {
            return None;
        }
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some("nameserver") => fields.next()?.parse().ok(),
            _ => None,
        }
    })
}

/// Ask `upstream` a single question and return the answer records.
///
/// Fails with [`DnsError::Timeout`] if no matching reply arrives within `timeout`.
pub async fn forward(
    query: &Query,
    upstream: SocketAddr,
    timeout: Duration,
) -> Result<Vec<Record>, DnsError> {
    let id: u16 = rand::random();

    let mut request = Message::new();
    request
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(query.clone());
    let payload = request.to_vec()?;

    let exchange = async {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
        socket.connect(upstream).await?;
        socket.send(&payload).await?;

        let mut buf = vec![0u8; MAX_RESPONSE_SIZE];
        loop {
            let len = socket.recv(&mut buf).await?;
            match Message::from_vec(&buf[..len]) {
                Ok(mut response) if response.id() == id => {
                    return Ok::<_, DnsError>(response.take_answers());
                }
                Ok(response) => {
                    tracing::trace!(expected = id, got = response.id(), "Ignoring stray upstream reply");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Ignoring undecodable upstream reply");
                }
            }
        }
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| DnsError::Timeout(timeout))?
}

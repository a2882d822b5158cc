//! UDP and TCP receive loops for the DNS responder.
//!
//! UDP datagrams and TCP connections share one listening address. Every
//! datagram and every TCP connection runs on a task owned by the server, so
//! shutdown can drain them and abort whatever outlives the drain timeout.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use super::responder::{Transport, MAX_UDP_PAYLOAD};
use super::Responder;
use crate::lifecycle::InFlightTracker;

/// Idle time allowed between messages on a TCP connection.
const TCP_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// DNS server answering each datagram and each TCP connection on its own task.
pub struct DnsServer {
    responder: Arc<Responder>,
    tracker: InFlightTracker,
    drain_timeout: Duration,
}

impl DnsServer {
    pub fn new(responder: Arc<Responder>, tracker: InFlightTracker, drain_timeout: Duration) -> Self {
        Self {
            responder,
            tracker,
            drain_timeout,
        }
    }

    /// Serve `udp` and `tcp` until a shutdown signal arrives.
    ///
    /// Messages already being answered get `drain_timeout` to finish; the
    /// remaining tasks are then aborted.
    pub async fn run(
        self,
        udp: UdpSocket,
        tcp: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = udp.local_addr()?;
        tracing::info!(address = %addr, "DNS server starting");

        let udp = Arc::new(udp);
        let mut buf = vec![0u8; usize::from(MAX_UDP_PAYLOAD)];
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                received = udp.recv_from(&mut buf) => {
                    let (len, src) = match received {
                        Ok(received) => received,
                        Err(e) => {
                            // ICMP port-unreachable from a previous reply surfaces here on some platforms.
                            tracing::debug!(error = %e, "DNS receive error");
                            continue;
                        }
                    };
                    self.spawn_reply(&mut tasks, udp.clone(), buf[..len].to_vec(), src);
                }
                accepted = tcp.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let responder = self.responder.clone();
                            let tracker = self.tracker.clone();
                            tasks.spawn(serve_connection(responder, tracker, stream, peer));
                        }
                        Err(e) => tracing::debug!(error = %e, "DNS TCP accept error"),
                    }
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
                _ = shutdown.recv() => {
                    tracing::info!("DNS server received shutdown signal, no longer accepting queries");
                    break;
                }
            }
        }

        if !self.tracker.wait_idle(self.drain_timeout).await {
            tracing::warn!(
                in_flight = self.tracker.active_count(),
                "DNS queries still in flight at drain deadline, aborting"
            );
        }
        // Idle TCP connections and anything past the deadline.
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}

        tracing::info!("DNS server stopped");
        Ok(())
    }

    fn spawn_reply(
        &self,
        tasks: &mut JoinSet<()>,
        socket: Arc<UdpSocket>,
        packet: Vec<u8>,
        src: SocketAddr,
    ) {
        let guard = self.tracker.track();
        let responder = self.responder.clone();

        tasks.spawn(async move {
            tracing::trace!(task_id = %guard.id(), src = %src, len = packet.len(), "DNS query received");
            if let Some(reply) = responder.handle_packet(&packet, src, Transport::Udp).await {
                if let Err(e) = socket.send_to(&reply, src).await {
                    tracing::debug!(src = %src, error = %e, "Failed to send DNS reply");
                }
            }
            drop(guard);
        });
    }
}

/// Answer length-prefixed messages on one TCP connection until the peer goes quiet.
async fn serve_connection(
    responder: Arc<Responder>,
    tracker: InFlightTracker,
    mut stream: TcpStream,
    peer: SocketAddr,
) {
    loop {
        let packet = match tokio::time::timeout(TCP_IDLE_TIMEOUT, read_message(&mut stream)).await {
            Ok(Ok(Some(packet))) => packet,
            Ok(Ok(None)) => break,
            Ok(Err(e)) => {
                tracing::debug!(src = %peer, error = %e, "DNS TCP read error");
                break;
            }
            Err(_) => {
                tracing::debug!(src = %peer, "Closing idle DNS TCP connection");
                break;
            }
        };

        let guard = tracker.track();
        tracing::trace!(task_id = %guard.id(), src = %peer, len = packet.len(), "DNS query received over TCP");
        let Some(reply) = responder.handle_packet(&packet, peer, Transport::Tcp).await else {
            break;
        };
        let written = write_message(&mut stream, &reply).await;
        drop(guard);
        if let Err(e) = written {
            tracing::debug!(src = %peer, error = %e, "Failed to send DNS reply over TCP");
            break;
        }
    }
}

/// Read one two-byte length-prefixed message; `None` on a clean close.
async fn read_message(stream: &mut TcpStream) -> io::Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; 2];
    match stream.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let mut packet = vec![0u8; usize::from(u16::from_be_bytes(prefix))];
    stream.read_exact(&mut packet).await?;
    Ok(Some(packet))
}

async fn write_message(stream: &mut TcpStream, reply: &[u8]) -> io::Result<()> {
    let len = u16::try_from(reply.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "DNS reply exceeds 65535 bytes"))?;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(reply).await?;
    stream.flush().await
}

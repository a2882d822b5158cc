//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::Method;
use hickory_proto::op::{Message, MessageType, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

use vhost_proxy::dns::StaticInterfaces;
use vhost_proxy::lifecycle::Running;
use vhost_proxy::{ProxyConfig, Supervisor};

/// Start a mock backend on an ephemeral port that returns `response` and echoes the Host header.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 4096];
                        let len = socket.read(&mut buf).await.unwrap_or(0);
                        let request = String::from_utf8_lossy(&buf[..len]).to_string();
                        let host = request
                            .lines()
                            .find_map(|line| {
                                let (name, value) = line.split_once(':')?;
                                name.eq_ignore_ascii_case("host").then(|| value.trim().to_string())
                            })
                            .unwrap_or_default();

                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nX-Seen-Host: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            host,
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Backend that reads the request head and closes the connection without replying.
pub async fn start_dropping_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            drop(socket);
        }
    });

    addr
}

/// Backend that answers every request with its own body, along with the method it saw.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = axum::Router::new().fallback(|method: Method, body: Bytes| async move {
        ([("x-seen-method", method.to_string())], body)
    });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    addr
}

/// A port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Fake upstream resolver answering every A question with `answer` after `delay`.
///
/// Names listed in `silent` never get a reply.
pub async fn start_fake_upstream(
    answer: Ipv4Addr,
    delay: Duration,
    silent: &'static [&'static str],
) -> SocketAddr {
    let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let Ok(request) = Message::from_vec(&buf[..len]) else {
                continue;
            };
            let socket = socket.clone();
            tokio::spawn(async move {
                let Some(question) = request.queries().first().cloned() else {
                    return;
                };
                let name = question.name().to_ascii();
                if silent.iter().any(|s| name.trim_end_matches('.') == *s) {
                    return;
                }
                tokio::time::sleep(delay).await;

                let mut response = Message::new();
                response
                    .set_id(request.id())
                    .set_message_type(MessageType::Response)
                    .add_query(question.clone())
                    .add_answer(Record::from_rdata(
                        question.name().clone(),
                        60,
                        RData::A(A::from(answer)),
                    ));
                let _ = socket.send_to(&response.to_vec().unwrap(), peer).await;
            });
        }
    });

    addr
}

/// Config bound to ephemeral loopback ports with the registry in `dir`.
pub fn test_config(dir: &Path) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.registry.dir = dir.to_path_buf();
    config.dns.bind_address = "127.0.0.1:0".to_string();
    config.http.bind_address = "127.0.0.1:0".to_string();
    config.shutdown.drain_timeout_secs = 2;
    config
}

/// Point upstream forwarding at `upstream` through a temporary resolv.conf in `dir`.
pub fn use_upstream(config: &mut ProxyConfig, dir: &Path, upstream: SocketAddr) {
    let resolv_conf = dir.join("resolv.conf");
    std::fs::write(&resolv_conf, format!("nameserver {}\n", upstream.ip())).unwrap();
    config.dns.resolv_conf = resolv_conf;
    config.dns.upstream_port = upstream.port();
}

pub async fn start_proxy(config: ProxyConfig) -> Running {
    Supervisor::new(config)
        .with_interfaces(Arc::new(StaticInterfaces(Vec::new())))
        .start()
        .await
        .unwrap()
}

/// Write a registry entry the way the CLI does.
pub fn register(dir: &Path, domain: &str, port: u16) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(domain), port.to_string()).unwrap();
}

fn dns_request(id: u16, questions: &[(&str, RecordType)]) -> Message {
    let mut request = Message::new();
    request
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_recursion_desired(true);
    for (name, rtype) in questions {
        request.add_query(Query::query(Name::from_ascii(name).unwrap(), *rtype));
    }
    request
}

/// Send one DNS message with the given questions and wait for the reply.
pub async fn dns_query(server: SocketAddr, id: u16, questions: &[(&str, RecordType)]) -> Message {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let request = dns_request(id, questions);

    socket.send_to(&request.to_vec().unwrap(), server).await.unwrap();

    let mut buf = [0u8; 4096];
    let (len, _) = tokio::time::timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
        .await
        .expect("DNS reply timed out")
        .unwrap();
    Message::from_vec(&buf[..len]).unwrap()
}

/// Same as [`dns_query`], over a TCP connection with a two-byte length prefix.
pub async fn dns_query_tcp(server: SocketAddr, id: u16, questions: &[(&str, RecordType)]) -> Message {
    let mut stream = TcpStream::connect(server).await.unwrap();
    let request = dns_request(id, questions).to_vec().unwrap();

    stream.write_all(&(request.len() as u16).to_be_bytes()).await.unwrap();
    stream.write_all(&request).await.unwrap();

    let read = async {
        let len = stream.read_u16().await.unwrap();
        let mut reply = vec![0u8; usize::from(len)];
        stream.read_exact(&mut reply).await.unwrap();
        reply
    };
    let reply = tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .expect("DNS reply timed out");
    Message::from_vec(&reply).unwrap()
}

/// IPv4 addresses carried by A records in `message`'s answer section.
pub fn a_answers(message: &Message) -> Vec<Ipv4Addr> {
    message
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::A(a)) => Some(a.0),
            _ => None,
        })
        .collect()
}

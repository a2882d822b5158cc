//! Split-horizon answering for registered domains.
//!
//! One message in, one message out:
//!
//! ```text
//! questions ──┬─ owned (type A, name ending with a registered domain)
//!             │     → requester on loopback: 127.0.0.1
//!             │     → otherwise: address of each interface on the requester's subnet
//!             └─ foreign (everything else)
//!                   → forwarded upstream concurrently, 1s deadline each
//! ```
//!
//! Registry or resolver-config failures produce an empty answer section; an
//! upstream failure only drops that question's records.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use hickory_proto::op::{Edns, Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};

use super::interfaces::{addresses_serving, InterfaceSource};
use super::upstream;
use super::DnsError;
use crate::config::DnsConfig;
use crate::observability::metrics;
use crate::registry::DomainSource;

/// Largest UDP payload we advertise and accept.
pub const MAX_UDP_PAYLOAD: u16 = 4096;

/// How a message reached the responder; only UDP replies are size-limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp,
    Tcp,
}

/// Answers DNS messages using the registry, interface table and upstream resolver.
pub struct Responder {
    source: Arc<dyn DomainSource>,
    interfaces: Arc<dyn InterfaceSource>,
    config: DnsConfig,
}

impl Responder {
    pub fn new(
        source: Arc<dyn DomainSource>,
        interfaces: Arc<dyn InterfaceSource>,
        config: DnsConfig,
    ) -> Self {
        Self {
            source,
            interfaces,
            config,
        }
    }

    /// Decode a message, answer it, and encode the reply.
    ///
    /// Returns `None` for messages that are not decodable queries. UDP replies
    /// larger than the requester's advertised payload size are truncated with TC set.
    pub async fn handle_packet(
        &self,
        packet: &[u8],
        src: SocketAddr,
        transport: Transport,
    ) -> Option<Vec<u8>> {
        let request = match Message::from_vec(packet) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(src = %src, error = %e, "Dropping undecodable DNS message");
                metrics::record_dns_message("malformed");
                return None;
            }
        };
        if request.message_type() != MessageType::Query {
            tracing::debug!(src = %src, "Dropping DNS message that is not a query");
            metrics::record_dns_message("malformed");
            return None;
        }

        let mut response = self.respond(&request, src).await;
        if request.extensions().is_some() {
            let mut edns = Edns::new();
            edns.set_max_payload(MAX_UDP_PAYLOAD);
            response.set_edns(edns);
        }

        let encoded = match response.to_vec() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(src = %src, error = %e, "Failed to encode DNS response");
                return None;
            }
        };

        let limit = usize::from(request.max_payload());
        if transport == Transport::Udp && encoded.len() > limit {
            tracing::debug!(src = %src, size = encoded.len(), limit, "Truncating DNS response");
            metrics::record_dns_message("truncated");
            return truncate(response, limit);
        }
        Some(encoded)
    }

    /// Build the response to `request` received from `src`.
    pub async fn respond(&self, request: &Message, src: SocketAddr) -> Message {
        let answers = match self.answers(request.queries(), src.ip()).await {
            Ok(answers) => {
                metrics::record_dns_message("answered");
                answers
            }
            Err(e) => {
                tracing::warn!(src = %src, id = request.id(), error = %e, "Answering with empty answer section");
                metrics::record_dns_message("empty");
                Vec::new()
            }
        };

        let mut response = Message::new();
        response
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(request.op_code())
            .set_recursion_desired(request.recursion_desired())
            .set_recursion_available(true)
            .set_response_code(ResponseCode::NoError);
        response.add_queries(request.queries().to_vec());
        response.add_answers(answers);
        response
    }

    /// Answers for every question, owned first, then foreign.
    pub async fn answers(
        &self,
        questions: &[Query],
        requester: IpAddr,
    ) -> Result<Vec<Record>, DnsError> {
        let domains = self.source.list_domains().await?;
        let (owned, foreign): (Vec<&Query>, Vec<&Query>) =
            questions.iter().partition(|q| is_owned(q, &domains));

        let mut answers = Vec::new();

        if !owned.is_empty() {
            let addresses = self.local_addresses(requester);
            for question in &owned {
                metrics::record_dns_question("owned");
                tracing::debug!(
                    name = %question.name(),
                    requester = %requester,
                    addresses = ?addresses,
                    "Answering owned question"
                );
                answers.extend(
                    addresses
                        .iter()
                        .map(|addr| a_record(question.name().clone(), *addr, self.config.ttl)),
                );
            }
        }

        if !foreign.is_empty() {
            let upstream_ip = upstream::resolve_upstream(&self.config.resolv_conf).await?;
            let server = SocketAddr::new(upstream_ip.into(), self.config.upstream_port);
            let timeout = Duration::from_millis(self.config.upstream_timeout_ms);

            let forwarded = join_all(foreign.iter().map(|question| async move {
                metrics::record_dns_question("foreign");
                match upstream::forward(question, server, timeout).await {
                    Ok(records) => records,
                    Err(e) => {
                        tracing::debug!(
                            name = %question.name(),
                            rtype = %question.query_type(),
                            upstream = %server,
                            error = %e,
                            "Upstream question failed"
                        );
                        metrics::record_upstream_failure();
                        Vec::new()
                    }
                }
            }))
            .await;
            answers.extend(forwarded.into_iter().flatten());
        }

        Ok(answers)
    }

    /// Addresses handed out for owned names, chosen by the requester's network.
    fn local_addresses(&self, requester: IpAddr) -> Vec<Ipv4Addr> {
        let requester = requester.to_canonical();
        if requester.is_loopback() {
            return vec![Ipv4Addr::LOCALHOST];
        }

        let IpAddr::V4(requester) = requester else {
            return Vec::new();
        };

        match self.interfaces.interfaces() {
            Ok(table) => addresses_serving(&table, requester),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot enumerate network interfaces");
                Vec::new()
            }
        }
    }
}

/// Owned questions are A queries for a name within a registered domain.
fn is_owned(question: &Query, domains: &BTreeSet<String>) -> bool {
    if question.query_type() != RecordType::A {
        return false;
    }
    let name = question_name(question.name());
    domains.iter().any(|domain| name.ends_with(domain.as_str()))
}

/// `name` as written by the client, without the trailing root dot.
fn question_name(name: &Name) -> String {
    let mut ascii = name.to_ascii();
    if ascii.ends_with('.') {
        ascii.pop();
    }
    ascii
}

/// Empty the record sections and set TC so the client retries over TCP.
///
/// The question section is kept when it fits in `limit` on its own.
fn truncate(mut response: Message, limit: usize) -> Option<Vec<u8>> {
    response.set_truncated(true);
    response.take_answers();
    response.take_name_servers();
    response.take_additionals();
    let encoded = response.to_vec().ok()?;
    if encoded.len() <= limit {
        return Some(encoded);
    }
    response.take_queries();
    response.to_vec().ok()
}

fn a_record(name: Name, addr: Ipv4Addr, ttl: u32) -> Record {
    Record::from_rdata(name, ttl, RData::A(A::from(addr)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::interfaces::{NetworkInterface, StaticInterfaces};
    use crate::registry::DirectoryRegistry;

    fn responder(dir: &std::path::Path, table: Vec<NetworkInterface>) -> Responder {
        let config = DnsConfig {
            resolv_conf: dir.join(".resolv.conf"),
            upstream_timeout_ms: 100,
            ..DnsConfig::default()
        };
        Responder::new(
            Arc::new(DirectoryRegistry::new(dir)),
            Arc::new(StaticInterfaces(table)),
            config,
        )
    }

    fn lan() -> NetworkInterface {
        NetworkInterface {
            name: "en0".into(),
            address: Ipv4Addr::new(192, 168, 1, 20),
            cidr: "192.168.1.20/24".parse().unwrap(),
            is_internal: false,
        }
    }

    fn query(name: &str, rtype: RecordType) -> Query {
        Query::query(Name::from_ascii(name).unwrap(), rtype)
    }

    #[test]
    fn ownership_requires_type_a() {
        let domains: BTreeSet<String> = ["svc.localhost".to_string()].into();

        assert!(is_owned(&query("svc.localhost.", RecordType::A), &domains));
        assert!(is_owned(&query("api.svc.localhost.", RecordType::A), &domains));
        assert!(!is_owned(&query("svc.localhost.", RecordType::AAAA), &domains));
        assert!(!is_owned(&query("other.localhost.", RecordType::A), &domains));
    }

    #[test]
    fn ownership_is_a_plain_case_sensitive_suffix() {
        let domains: BTreeSet<String> = ["svc.localhost".to_string()].into();

        assert!(is_owned(&query("xsvc.localhost.", RecordType::A), &domains));
        assert!(!is_owned(&query("SVC.LOCALHOST.", RecordType::A), &domains));
        assert!(!is_owned(&query("svc.localhost.evil.", RecordType::A), &domains));
    }

    #[tokio::test]
    async fn loopback_requester_gets_localhost() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("svc.localhost"), "4000").unwrap();
        let responder = responder(tmp.path(), vec![lan()]);

        let answers = responder
            .answers(&[query("svc.localhost.", RecordType::A)], "127.0.0.1".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].ttl(), 1800);
        assert_eq!(answers[0].data(), Some(&RData::A(A::new(127, 0, 0, 1))));
    }

    #[tokio::test]
    async fn lan_requester_gets_interface_address() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("svc.localhost"), "4000").unwrap();
        let responder = responder(tmp.path(), vec![lan()]);

        let answers = responder
            .answers(&[query("svc.localhost.", RecordType::A)], "192.168.1.99".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].data(), Some(&RData::A(A::new(192, 168, 1, 20))));

        let answers = responder
            .answers(&[query("svc.localhost.", RecordType::A)], "10.9.9.9".parse().unwrap())
            .await
            .unwrap();
        assert!(answers.is_empty());
    }

    fn many_owned_questions(edns: Option<u16>) -> Vec<u8> {
        let mut request = Message::new();
        request.set_id(77).set_recursion_desired(true);
        for i in 0..30 {
            request.add_query(query(&format!("host{i}.svc.localhost."), RecordType::A));
        }
        if let Some(size) = edns {
            let mut opt = Edns::new();
            opt.set_max_payload(size);
            request.set_edns(opt);
        }
        request.to_vec().unwrap()
    }

    #[tokio::test]
    async fn oversized_udp_reply_without_edns_is_truncated() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("svc.localhost"), "4000").unwrap();
        let responder = responder(tmp.path(), vec![lan()]);
        let src: SocketAddr = "127.0.0.1:5300".parse().unwrap();

        let reply = responder
            .handle_packet(&many_owned_questions(None), src, Transport::Udp)
            .await
            .unwrap();

        assert!(reply.len() <= 512);
        let reply = Message::from_vec(&reply).unwrap();
        assert_eq!(reply.id(), 77);
        assert!(reply.truncated());
        assert!(reply.answers().is_empty());
    }

    #[tokio::test]
    async fn edns_payload_size_allows_large_udp_reply() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("svc.localhost"), "4000").unwrap();
        let responder = responder(tmp.path(), vec![lan()]);
        let src: SocketAddr = "127.0.0.1:5300".parse().unwrap();

        let reply = responder
            .handle_packet(&many_owned_questions(Some(4096)), src, Transport::Udp)
            .await
            .unwrap();

        assert!(reply.len() > 512);
        let reply = Message::from_vec(&reply).unwrap();
        assert!(!reply.truncated());
        assert_eq!(reply.answers().len(), 30);
        assert!(reply.extensions().is_some());
    }

    #[tokio::test]
    async fn tcp_reply_is_never_truncated() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("svc.localhost"), "4000").unwrap();
        let responder = responder(tmp.path(), vec![lan()]);
        let src: SocketAddr = "127.0.0.1:5300".parse().unwrap();

        let reply = responder
            .handle_packet(&many_owned_questions(None), src, Transport::Tcp)
            .await
            .unwrap();

        let reply = Message::from_vec(&reply).unwrap();
        assert!(!reply.truncated());
        assert_eq!(reply.answers().len(), 30);
    }

    #[tokio::test]
    async fn unreadable_registry_answers_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not-a-dir");
        std::fs::write(&file, "").unwrap();
        let responder = responder(&file, vec![lan()]);

        let mut request = Message::new();
        request.set_id(42).add_query(query("svc.localhost.", RecordType::A));
        let response = responder.respond(&request, "127.0.0.1:5300".parse().unwrap()).await;

        assert_eq!(response.id(), 42);
        assert_eq!(response.message_type(), MessageType::Response);
        assert!(response.answers().is_empty());
    }
}

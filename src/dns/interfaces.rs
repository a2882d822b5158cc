//! Local network interface enumeration.
//!
//! Split-horizon answers need the machine's IPv4 addresses together with the
//! subnet each one serves. The table is read at request time so interfaces
//! that come and go (VPNs, Wi-Fi) are reflected immediately.

use std::io;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

/// An IPv4 address assigned to a local interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub address: Ipv4Addr,
    pub cidr: Ipv4Net,
    /// Loopback interfaces are internal and never used in answers.
    pub is_internal: bool,
}

impl NetworkInterface {
    /// Whether `addr` lies inside this interface's subnet.
    pub fn serves(&self, addr: Ipv4Addr) -> bool {
        self.cidr.contains(&addr)
    }
}

/// Source of the interface table.
pub trait InterfaceSource: Send + Sync {
    fn interfaces(&self) -> io::Result<Vec<NetworkInterface>>;
}

/// Reads the host's live interface table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> io::Result<Vec<NetworkInterface>> {
        let mut interfaces = Vec::new();

        for iface in if_addrs::get_if_addrs()? {
            let if_addrs::IfAddr::V4(ref v4) = iface.addr else {
                continue;
            };
            let prefix = u32::from(v4.netmask).leading_ones() as u8;
            let Ok(cidr) = Ipv4Net::new(v4.ip, prefix) else {
                continue;
            };

            interfaces.push(NetworkInterface {
                is_internal: iface.is_loopback(),
                name: iface.name,
                address: v4.ip,
                cidr,
            });
        }

        Ok(interfaces)
    }
}

/// A fixed interface table, for hosts where enumeration is managed elsewhere
/// and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaces(pub Vec<NetworkInterface>);

impl InterfaceSource for StaticInterfaces {
    fn interfaces(&self) -> io::Result<Vec<NetworkInterface>> {
        Ok(self.0.clone())
    }
}

/// Addresses of non-internal interfaces whose subnet contains `requester`.
pub fn addresses_serving(interfaces: &[NetworkInterface], requester: Ipv4Addr) -> Vec<Ipv4Addr> {
    interfaces
        .iter()
        .filter(|iface| !iface.is_internal && iface.serves(requester))
        .map(|iface| iface.address)
        .collect()
}

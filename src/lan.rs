use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use log::debug;

/// First IPv4 address that is not a loopback interface.
pub fn first_lan_ipv4(interfaces: impl IntoIterator<Item = (IpAddr, bool)>) -> Option<Ipv4Addr> {
    interfaces
        .into_iter()
        .find_map(|(addr, is_loopback)| match addr {
            IpAddr::V4(addr) if !is_loopback && !addr.is_loopback() => Some(addr),
            _ => None,
        })
}

/// Host other devices on the network should use to reach a server bound to `bind`.
pub fn network_host(bind: SocketAddr) -> String {
    if !bind.ip().is_unspecified() {
        return bind.ip().to_string();
    }
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            debug!("failed to list network interfaces: {e}");
            return "localhost".to_string();
        }
    };
    first_lan_ipv4(interfaces.iter().map(|x| (x.ip(), x.is_loopback())))
        .map(|x| x.to_string())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use std::net::Ipv6Addr;

    use super::*;

    #[test]
    fn skips_loopback_and_ipv6() {
        let interfaces = [
            (IpAddr::V4(Ipv4Addr::LOCALHOST), true),
            (IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)), false),
            (IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)), false),
            (IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), false),
        ];
        assert_eq!(first_lan_ipv4(interfaces), Some(Ipv4Addr::new(192, 168, 1, 20)));
    }

    #[test]
    fn none_without_external_ipv4() {
        let interfaces = [
            (IpAddr::V4(Ipv4Addr::LOCALHOST), true),
            (IpAddr::V6(Ipv6Addr::LOCALHOST), true),
        ];
        assert_eq!(first_lan_ipv4(interfaces), None);
        assert_eq!(first_lan_ipv4([]), None);
    }

    #[test]
    fn explicit_bind_address_is_used() {
        assert_eq!(network_host("192.168.1.7:3000".parse().unwrap()), "192.168.1.7");
        assert!(!network_host("0.0.0.0:3000".parse().unwrap()).is_empty());
    }
}

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::messaging::link_addr::LinkAddr;

/// a distinct, deterministic endpoint per number: system id `number`, component id 1, and a
///  loopback socket address with a port derived from `number`
pub fn test_link_addr_from_number(number: u8) -> LinkAddr {
    LinkAddr::new(number, 1, test_socket_addr_from_number(number))
}

pub fn test_socket_addr_from_number(number: u8) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 14550 + number as u16)
}

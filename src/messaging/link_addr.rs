use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;

use bytes::{Buf, BufMut};

/// Identifies one endpoint of a link: a ground station or a vehicle is a 'system', and each
///  system can host several 'components' (autopilot, camera, companion computer, ...).
///
/// Only system and component id go on the wire; the socket address is what the transport saw
///  as the datagram's origin.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct LinkAddr {
    pub system_id: u8,
    pub component_id: u8,
    pub socket_addr: SocketAddr,
}

impl Debug for LinkAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}@{}/{}]", self.socket_addr, self.system_id, self.component_id)
    }
}

impl LinkAddr {
    pub fn new(system_id: u8, component_id: u8, socket_addr: SocketAddr) -> LinkAddr {
        LinkAddr {
            system_id,
            component_id,
            socket_addr,
        }
    }

    /// true if both addresses refer to the same system and component, regardless of the
    ///  network address they are reached through
    pub fn is_same_endpoint(&self, other: &LinkAddr) -> bool {
        self.system_id == other.system_id && self.component_id == other.component_id
    }

    pub fn ser_ids(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.system_id);
        buf.put_u8(self.component_id);
    }

    pub fn try_deser_ids(buf: &mut impl Buf, socket_addr: SocketAddr) -> anyhow::Result<LinkAddr> {
        let system_id = buf.try_get_u8()?;
        let component_id = buf.try_get_u8()?;
        Ok(LinkAddr {
            system_id,
            component_id,
            socket_addr,
        })
    }
}

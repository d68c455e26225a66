use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;

use bytes::{Buf, BufMut, BytesMut};
use crc::Crc;

use crate::messaging::link_addr::LinkAddr;
use crate::messaging::message_module::MessageModuleId;

#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Checksum(pub u64);
impl Debug for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x?}", self.0)
    }
}
impl Checksum {
    pub fn new(from: LinkAddr, to: LinkAddr, message_module_id: MessageModuleId, msg: &[u8]) -> Checksum {
        let hasher = Crc::<u64>::new(&crc::CRC_64_REDIS);
        let mut digest = hasher.digest();

        digest.update(&[from.system_id, from.component_id, to.system_id, to.component_id]);
        digest.update(&message_module_id.0.to_be_bytes());
        digest.update(msg);

        Checksum(
            digest.finalize()
        )
    }
}


#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Envelope {
    pub from: LinkAddr,
    pub to: LinkAddr,
    pub checksum: Checksum,
    pub message_module_id: MessageModuleId,
}
impl Envelope {
    /// `from` and `to` are the socket addresses the datagram was received from and on
    pub fn try_read(buf: &mut impl Buf, from: SocketAddr, to: SocketAddr) -> anyhow::Result<Envelope> {
        let from = LinkAddr::try_deser_ids(buf, from)?;
        let to = LinkAddr::try_deser_ids(buf, to)?;
        let checksum = Checksum(buf.try_get_u64()?);

        let message_module_id = buf.try_get_u64()?;

        Ok(Envelope {
            from,
            to,
            checksum,
            message_module_id: MessageModuleId(message_module_id),
        })
    }

    pub fn write(from: LinkAddr, to: LinkAddr, checksum: Checksum, message_module_id: MessageModuleId, buf: &mut BytesMut) {
        from.ser_ids(buf);
        to.ser_ids(buf);
        buf.put_u64(checksum.0);
        buf.put_u64(message_module_id.0);
    }
}

use std::any::Any;
use std::sync::Arc;

use anyhow::anyhow;
use bytes::{Buf, BufMut, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use tokio::sync::mpsc;
use tracing::error;

use crate::messaging::envelope::Envelope;
use crate::messaging::link_addr::LinkAddr;
use crate::messaging::message_module::{Message, MessageModule, MessageModuleId};
use crate::trajectory::trajectory_item::TrajectoryItem;

pub const TRAJECTORY_MESSAGE_MODULE_ID: MessageModuleId = MessageModuleId::new(b"TrajXfer");

pub struct TrajectoryMessageModule {
    channel: mpsc::Sender<(LinkAddr, TrajectoryMessage)>,
}
impl TrajectoryMessageModule {
    pub fn new(channel: mpsc::Sender<(LinkAddr, TrajectoryMessage)>) -> Arc<TrajectoryMessageModule> {
        Arc::new({
            TrajectoryMessageModule {
                channel,
            }
        })
    }

    async fn _on_message(&self, envelope: &Envelope, buf: &[u8]) -> anyhow::Result<()> {
        let msg = TrajectoryMessage::deser(buf)?;
        self.channel.send((envelope.from, msg)).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageModule for TrajectoryMessageModule {
    fn id(&self) -> MessageModuleId {
        TRAJECTORY_MESSAGE_MODULE_ID
    }

    async fn on_message(&self, envelope: &Envelope, buf: &[u8]) {
        if let Err(e) = self._on_message(envelope, buf).await {
            error!("error handling trajectory message: {}", e);
        }
    }
}


const ID_REQUEST_LIST: u8 = 1;
const ID_COUNT: u8 = 2;
const ID_ITEM_REQUEST: u8 = 3;
const ID_ITEM: u8 = 4;
const ID_ACK: u8 = 5;
const ID_CLEAR_ALL: u8 = 6;

#[derive(PartialEq, Debug, Clone)]
pub enum TrajectoryMessage {
    /// "send me your count"
    RequestList,
    Count(CountData),
    ItemRequest(ItemRequestData),
    Item(TrajectoryItem),
    Ack(AckData),
    ClearAll,
}
impl Message for TrajectoryMessage {
    fn module_id(&self) -> MessageModuleId {
        TRAJECTORY_MESSAGE_MODULE_ID
    }

    fn ser(&self, buf: &mut BytesMut) {
        buf.put_u8(self.id());
        match self {
            TrajectoryMessage::RequestList => {}
            TrajectoryMessage::Count(data) => buf.put_u16(data.count),
            TrajectoryMessage::ItemRequest(data) => buf.put_u16(data.seq),
            TrajectoryMessage::Item(item) => Self::ser_item(item, buf),
            TrajectoryMessage::Ack(data) => buf.put_u8(data.result.into()),
            TrajectoryMessage::ClearAll => {}
        }
    }

    fn box_clone(&self) -> Box<dyn Message> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl TrajectoryMessage {
    pub fn id(&self) -> u8 {
        match self {
            TrajectoryMessage::RequestList => ID_REQUEST_LIST,
            TrajectoryMessage::Count(_) => ID_COUNT,
            TrajectoryMessage::ItemRequest(_) => ID_ITEM_REQUEST,
            TrajectoryMessage::Item(_) => ID_ITEM,
            TrajectoryMessage::Ack(_) => ID_ACK,
            TrajectoryMessage::ClearAll => ID_CLEAR_ALL,
        }
    }

    /// human-readable message kind for logging
    pub fn kind(&self) -> &'static str {
        match self {
            TrajectoryMessage::RequestList => "RequestList",
            TrajectoryMessage::Count(_) => "Count",
            TrajectoryMessage::ItemRequest(_) => "ItemRequest",
            TrajectoryMessage::Item(_) => "Item",
            TrajectoryMessage::Ack(_) => "Ack",
            TrajectoryMessage::ClearAll => "ClearAll",
        }
    }

    fn ser_item(item: &TrajectoryItem, buf: &mut impl BufMut) {
        buf.put_u16(item.sequence);
        buf.put_u16(item.command);
        buf.put_u8(item.frame);
        buf.put_i32(item.param1);
        buf.put_i32(item.param2);
        buf.put_i32(item.param3);
        buf.put_f32(item.x);
        buf.put_f32(item.y);
        buf.put_f32(item.z);
    }

    pub fn deser(buf: &[u8]) -> anyhow::Result<TrajectoryMessage> {
        let mut buf = buf;
        let msg = match buf.try_get_u8()? {
            ID_REQUEST_LIST => TrajectoryMessage::RequestList,
            ID_COUNT => TrajectoryMessage::Count(CountData { count: buf.try_get_u16()? }),
            ID_ITEM_REQUEST => TrajectoryMessage::ItemRequest(ItemRequestData { seq: buf.try_get_u16()? }),
            ID_ITEM => TrajectoryMessage::Item(Self::deser_item(&mut buf)?),
            ID_ACK => TrajectoryMessage::Ack(Self::deser_ack(&mut buf)?),
            ID_CLEAR_ALL => TrajectoryMessage::ClearAll,
            id => return Err(anyhow!("invalid message discriminator {}", id)),
        };

        if buf.has_remaining() {
            return Err(anyhow!("{} trailing bytes after {} message", buf.remaining(), msg.kind()));
        }
        Ok(msg)
    }

    fn deser_item(buf: &mut impl Buf) -> anyhow::Result<TrajectoryItem> {
        Ok(TrajectoryItem {
            sequence: buf.try_get_u16()?,
            command: buf.try_get_u16()?,
            frame: buf.try_get_u8()?,
            param1: buf.try_get_i32()?,
            param2: buf.try_get_i32()?,
            param3: buf.try_get_i32()?,
            x: buf.try_get_f32()?,
            y: buf.try_get_f32()?,
            z: buf.try_get_f32()?,
        })
    }

    fn deser_ack(buf: &mut impl Buf) -> anyhow::Result<AckData> {
        let raw = buf.try_get_u8()?;
        let result = AckResult::try_from(raw)
            .map_err(|_| anyhow!("invalid ack result {}", raw))?;
        Ok(AckData { result })
    }
}


#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct CountData {
    pub count: u16,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct ItemRequestData {
    pub seq: u16,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct AckData {
    pub result: AckResult,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum AckResult {
    Accepted = 0,
    Rejected = 1,
}


#[cfg(test)]
mod test {
    use rstest::*;

    use super::TrajectoryMessage::*;

    use super::*;
    use crate::test_util::link::test_link_addr_from_number;
    use crate::test_util::trajectory::test_item;

    #[rstest]
    #[case::request_list(RequestList, ID_REQUEST_LIST)]
    #[case::count(Count(CountData { count: 17 }), ID_COUNT)]
    #[case::item_request(ItemRequest(ItemRequestData { seq: 3 }), ID_ITEM_REQUEST)]
    #[case::item(Item(test_item(3)), ID_ITEM)]
    #[case::ack_accepted(Ack(AckData { result: AckResult::Accepted }), ID_ACK)]
    #[case::ack_rejected(Ack(AckData { result: AckResult::Rejected }), ID_ACK)]
    #[case::clear_all(ClearAll, ID_CLEAR_ALL)]
    fn test_ser_trajectory_message(#[case] msg: TrajectoryMessage, #[case] msg_id: u8) {
        assert_eq!(msg.id(), msg_id);

        let mut buf = BytesMut::new();
        msg.ser(&mut buf);
        assert_eq!(buf[0], msg_id);
        let deser_msg = TrajectoryMessage::deser(&buf).unwrap();
        assert_eq!(msg, deser_msg);
    }

    #[test]
    fn test_ser_item_layout() {
        let item = TrajectoryItem {
            sequence: 0x0102,
            command: 0x0304,
            frame: 5,
            param1: -1,
            param2: 0x0a0b0c0d,
            param3: 0,
            x: 1.0,
            y: -2.5,
            z: 0.0,
        };

        let mut buf = BytesMut::new();
        Item(item).ser(&mut buf);

        assert_eq!(&buf[..], &[
            ID_ITEM,
            1, 2,
            3, 4,
            5,
            0xff, 0xff, 0xff, 0xff,
            0x0a, 0x0b, 0x0c, 0x0d,
            0, 0, 0, 0,
            0x3f, 0x80, 0, 0,
            0xc0, 0x20, 0, 0,
            0, 0, 0, 0,
        ]);
    }

    #[rstest]
    #[case::empty(b"".as_slice())]
    #[case::unknown_discriminator(b"\x07".as_slice())]
    #[case::count_truncated(b"\x02\x01".as_slice())]
    #[case::item_truncated(b"\x04\0\x01\0\x10\x01".as_slice())]
    #[case::ack_unknown_result(b"\x05\x02".as_slice())]
    #[case::trailing_bytes(b"\x01\x00".as_slice())]
    fn test_deser_invalid(#[case] buf: &[u8]) {
        assert!(TrajectoryMessage::deser(buf).is_err());
    }

    #[tokio::test]
    async fn test_message_module_forwards_with_sender() {
        let (send, mut recv) = mpsc::channel(4);
        let module = TrajectoryMessageModule::new(send);

        let from = test_link_addr_from_number(1);
        let envelope = Envelope {
            from,
            to: test_link_addr_from_number(2),
            checksum: crate::messaging::envelope::Checksum(0),
            message_module_id: TRAJECTORY_MESSAGE_MODULE_ID,
        };

        let mut buf = BytesMut::new();
        ItemRequest(ItemRequestData { seq: 9 }).ser(&mut buf);
        module.on_message(&envelope, &buf).await;
        // garbage is dropped without reaching the channel
        module.on_message(&envelope, b"\x09").await;

        assert_eq!(recv.recv().await, Some((from, ItemRequest(ItemRequestData { seq: 9 }))));
        assert!(recv.try_recv().is_err());
    }
}

use std::any::Any;
use std::fmt::{Debug, Formatter};

use bytes::BytesMut;

use crate::messaging::envelope::Envelope;


/// A [MessageModuleId] is sent as part of a message's envelope to identify the module for
///  deserialization and dispatch on the receiving side.
///
/// An id is technically a u64, but it is intended to be used as a sequence of up to eight ASCII
///  characters to give it a human-readable name, both for uniqueness and for debugging at the
///  wire level.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MessageModuleId(pub u64);

impl MessageModuleId {
    pub const fn new(value: &[u8; 8]) -> MessageModuleId {
        Self(u64::from_be_bytes(*value))
    }
}

impl Debug for MessageModuleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let bytes = self.0.to_be_bytes();
        let used = bytes.iter()
            .position(|&b| b == 0)
            .map(|len| &bytes[..len])
            .unwrap_or(&bytes);

        let string_repr = std::str::from_utf8(used).unwrap_or("???");

        write!(f, "0x{:016X}({:?})", self.0, string_repr)
    }
}


/// A message that can be sent through [crate::messaging::messaging::MessageSender]. Each message
///  type belongs to exactly one [MessageModule] which deserializes it on the receiving side.
pub trait Message: Debug + Send + Sync + 'static {
    fn module_id(&self) -> MessageModuleId;

    fn ser(&self, buf: &mut BytesMut);

    fn box_clone(&self) -> Box<dyn Message>;

    fn as_any(&self) -> &dyn Any;
}


/// Messages are pluggable, and they are organized in [MessageModule]s. Each module has its own
///  (single) type of messages, it takes care of deserializing them, and for handling received
///  messages.
///
/// Messages for a given module are identified in the envelope by a specific and (hopefully) unique
///  [MessageModuleId].
#[async_trait::async_trait]
pub trait MessageModule: 'static + Sync + Send {
    fn id(&self) -> MessageModuleId;

    /// called to handle a message that was received for this message module. It contains the
    ///  module specific message buffer, i.e. starting immediately *after* the envelope.
    ///
    /// This is a blocking call, holding up the central receive loop. Modules should hand the
    ///  deserialized message off to their own processing loop rather than doing work here.
    async fn on_message(&self, envelope: &Envelope, buf: &[u8]);
}

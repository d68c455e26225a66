use std::collections::hash_map::Entry;
use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::BytesMut;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

use crate::messaging::envelope::{Checksum, Envelope};
use crate::messaging::link_addr::LinkAddr;
use crate::messaging::message_module::{Message, MessageModule, MessageModuleId};
use crate::messaging::transport::udp::UdpTransport;
use crate::messaging::transport::{MessageHandler, Transport};


/// Trajectory messages are far smaller than this; anything bigger is garbage or not for us
pub const MAX_MSG_SIZE: usize = 1024;

#[async_trait]
pub trait MessageSender: Debug + Send + Sync + 'static {
    fn get_self_addr(&self) -> LinkAddr;

    /// fire-and-forget: failures are logged, not returned
    async fn send<T: Message>(&self, to: LinkAddr, msg: &T) {
        if let Err(e) = self.try_send(to, msg).await {
            error!("Error sending message: {}", e);
        }
    }

    async fn try_send<T: Message>(&self, to: LinkAddr, msg: &T) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Messaging: MessageSender {
    async fn register_module(&self, message_module: Arc<dyn MessageModule>) -> anyhow::Result<()>;
    async fn deregister_module(&self, id: MessageModuleId) -> anyhow::Result<()>;
    async fn recv(&self) -> anyhow::Result<()>;
    fn cancel_recv(&self);
}

pub struct MessagingImpl {
    myself: LinkAddr,
    message_modules: Arc<RwLock<FxHashMap<MessageModuleId, Arc<dyn MessageModule>>>>,
    transport: Arc<dyn Transport>,
}

impl Debug for MessagingImpl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MessagingImpl{{myself:{:?}}}", &self.myself)
    }
}

#[async_trait]
impl MessageSender for MessagingImpl {
    fn get_self_addr(&self) -> LinkAddr {
        self.myself
    }

    async fn try_send<T: Message>(&self, to: LinkAddr, msg: &T) -> anyhow::Result<()> {
        let msg_module_id = msg.module_id();
        self._send(to, msg_module_id, msg).await
    }
}

#[async_trait]
impl Messaging for MessagingImpl {
    async fn register_module(&self, message_module: Arc<dyn MessageModule>) -> anyhow::Result<()> {
        match self.message_modules.write().await
            .entry(message_module.id())
        {
            Entry::Occupied(_) => {
                Err(anyhow!("a message module is already registered for module id {:?}", message_module.id()))
            }
            Entry::Vacant(e) => {
                e.insert(message_module);
                Ok(())
            },
        }
    }

    async fn deregister_module(&self, id: MessageModuleId) -> anyhow::Result<()> {
        let prev = self.message_modules.write().await
            .remove(&id);
        if prev.is_none() {
            return Err(anyhow!("deregistering a module that was not previously registered: {:?}", id));
        }
        Ok(())
    }

    #[tracing::instrument]
    async fn recv(&self) -> anyhow::Result<()> {
        let handler = ReceivedMessageHandler {
            myself: self.myself,
            message_modules: self.message_modules.clone(),
        };

        match self.transport.recv_loop(Arc::new(handler)).await {
            Ok(()) => {
                info!("shutting down receiver");
                Ok(())
            }
            Err(e) => {
                error!("error: {}", e);
                Err(e)
            }
        }
    }

    fn cancel_recv(&self) {
        self.transport.cancel_recv_loop();
    }
}

impl MessagingImpl {
    pub async fn new(system_id: u8, component_id: u8, bind_addr: SocketAddr) -> anyhow::Result<MessagingImpl> {
        let transport = UdpTransport::new(bind_addr).await?;
        Ok(Self::new_with_transport(system_id, component_id, Arc::new(transport)))
    }

    pub fn new_with_transport(system_id: u8, component_id: u8, transport: Arc<dyn Transport>) -> MessagingImpl {
        MessagingImpl {
            myself: LinkAddr::new(system_id, component_id, transport.local_addr()),
            message_modules: Default::default(),
            transport,
        }
    }

    async fn _send(&self, to: LinkAddr, msg_module_id: MessageModuleId, msg: &dyn Message) -> anyhow::Result<()> {
        trace!(from=?self.myself, ?to, ?msg, "sending message");

        let mut msg_buf = BytesMut::new();
        msg.ser(&mut msg_buf);

        let checksum = Checksum::new(self.myself, to, msg_module_id, &msg_buf);

        let mut buf = BytesMut::new();
        Envelope::write(self.myself, to, checksum, msg_module_id, &mut buf);

        buf.extend_from_slice(&msg_buf);

        if buf.len() > MAX_MSG_SIZE {
            return Err(anyhow!("message of {} bytes exceeds max message size of {} bytes", buf.len(), MAX_MSG_SIZE));
        }

        self.transport.send(to.socket_addr, &buf).await?;
        Ok(())
    }
}


struct ReceivedMessageHandler {
    myself: LinkAddr,
    message_modules: Arc<RwLock<FxHashMap<MessageModuleId, Arc<dyn MessageModule>>>>,
}

#[async_trait]
impl MessageHandler for ReceivedMessageHandler {
    async fn handle_message(&self, msg_buf: &[u8], sender: SocketAddr) {
        trace!("received message {:?}", msg_buf);

        if msg_buf.len() > MAX_MSG_SIZE {
            warn!("received a message exceeding max message size of {} bytes - skipping", MAX_MSG_SIZE);
            return;
        }

        let mut msg_buf = msg_buf;
        match Envelope::try_read(&mut msg_buf, sender, self.myself.socket_addr) {
            Ok(envelope) => {
                trace!("message is from {:?}", envelope.from);

                if !envelope.to.is_same_endpoint(&self.myself) {
                    warn!("received a message for {:?} which is not this endpoint - ignoring the message", envelope.to);
                    return;
                }

                let actual_checksum = Checksum::new(envelope.from, envelope.to, envelope.message_module_id, msg_buf);
                if envelope.checksum != actual_checksum {
                    warn!("checksum error in message - skipping");
                    return;
                }

                let message_module = self.message_modules.read().await
                    .get(&envelope.message_module_id)
                    .cloned();
                if let Some(message_module) = message_module {
                    message_module.on_message(&envelope, msg_buf).await;
                }
                else {
                    debug!("received message for module {:?} for which there is no handler (yet?) - ignoring.", envelope.message_module_id);
                }
            }
            Err(e) => {
                warn!("received a message without a valid envelope - discarding: {}", e);
            }
        }
    }
}


#[cfg(test)]
mod test {
    use std::any::Any;
    use std::str::FromStr;
    use std::sync::Mutex;

    use bytes::BufMut;

    use super::*;
    use crate::messaging::transport::MockTransport;

    const TEST_MODULE_ID: MessageModuleId = MessageModuleId::new(b"TestModl");

    #[derive(Debug, Clone, Eq, PartialEq)]
    struct TestMessage(u16);
    impl Message for TestMessage {
        fn module_id(&self) -> MessageModuleId {
            TEST_MODULE_ID
        }

        fn ser(&self, buf: &mut BytesMut) {
            buf.put_u16(self.0);
        }

        fn box_clone(&self) -> Box<dyn Message> {
            Box::new(self.clone())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Default)]
    struct RecordingModule {
        received: Mutex<Vec<(LinkAddr, Vec<u8>)>>,
    }
    #[async_trait]
    impl MessageModule for RecordingModule {
        fn id(&self) -> MessageModuleId {
            TEST_MODULE_ID
        }

        async fn on_message(&self, envelope: &Envelope, buf: &[u8]) {
            self.received.lock().unwrap()
                .push((envelope.from, buf.to_vec()));
        }
    }

    fn local() -> SocketAddr {
        SocketAddr::from_str("127.0.0.1:14550").unwrap()
    }
    fn remote() -> SocketAddr {
        SocketAddr::from_str("127.0.0.1:14555").unwrap()
    }

    fn mock_transport() -> MockTransport {
        let mut transport = MockTransport::new();
        transport.expect_local_addr()
            .return_const(local());
        transport
    }

    fn datagram(from: LinkAddr, to: LinkAddr, payload: &[u8], checksum: Option<Checksum>) -> Vec<u8> {
        let checksum = checksum.unwrap_or_else(|| Checksum::new(from, to, TEST_MODULE_ID, payload));
        let mut buf = BytesMut::new();
        Envelope::write(from, to, checksum, TEST_MODULE_ID, &mut buf);
        buf.extend_from_slice(payload);
        buf.to_vec()
    }

    fn handler(myself: LinkAddr, module: Arc<RecordingModule>) -> ReceivedMessageHandler {
        let mut modules: FxHashMap<MessageModuleId, Arc<dyn MessageModule>> = Default::default();
        modules.insert(TEST_MODULE_ID, module);
        ReceivedMessageHandler {
            myself,
            message_modules: Arc::new(RwLock::new(modules)),
        }
    }

    #[tokio::test]
    async fn test_try_send_writes_envelope_and_payload() {
        let myself = LinkAddr::new(255, 190, local());
        let to = LinkAddr::new(1, 1, remote());
        let expected = datagram(myself, to, &[0, 42], None);

        let mut transport = mock_transport();
        transport.expect_send()
            .withf(move |addr, buf| *addr == remote() && buf.to_vec() == expected)
            .times(1)
            .returning(|_, _| Ok(()));

        let messaging = MessagingImpl::new_with_transport(255, 190, Arc::new(transport));
        assert_eq!(messaging.get_self_addr(), myself);
        messaging.try_send(to, &TestMessage(42)).await.unwrap();
    }

    #[tokio::test]
    async fn test_try_send_propagates_transport_error() {
        let mut transport = mock_transport();
        transport.expect_send()
            .returning(|_, _| Err(anyhow!("network is down")));

        let messaging = MessagingImpl::new_with_transport(255, 190, Arc::new(transport));
        assert!(messaging.try_send(LinkAddr::new(1, 1, remote()), &TestMessage(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_register_module_twice() {
        let messaging = MessagingImpl::new_with_transport(255, 190, Arc::new(mock_transport()));
        messaging.register_module(Arc::new(RecordingModule::default())).await.unwrap();
        assert!(messaging.register_module(Arc::new(RecordingModule::default())).await.is_err());

        messaging.deregister_module(TEST_MODULE_ID).await.unwrap();
        assert!(messaging.deregister_module(TEST_MODULE_ID).await.is_err());
    }

    #[test]
    fn test_cancel_recv_stops_transport_loop() {
        let mut transport = mock_transport();
        transport.expect_cancel_recv_loop()
            .times(1)
            .return_const(());

        let messaging = MessagingImpl::new_with_transport(255, 190, Arc::new(transport));
        messaging.cancel_recv();
    }

    #[tokio::test]
    async fn test_handle_message_dispatches_to_module() {
        let myself = LinkAddr::new(255, 190, local());
        let from = LinkAddr::new(1, 1, remote());
        let module = Arc::new(RecordingModule::default());

        handler(myself, module.clone())
            .handle_message(&datagram(from, myself, b"payload", None), remote()).await;

        assert_eq!(*module.received.lock().unwrap(), vec![(from, b"payload".to_vec())]);
    }

    #[tokio::test]
    async fn test_handle_message_discards_bad_checksum() {
        let myself = LinkAddr::new(255, 190, local());
        let from = LinkAddr::new(1, 1, remote());
        let module = Arc::new(RecordingModule::default());

        handler(myself, module.clone())
            .handle_message(&datagram(from, myself, b"payload", Some(Checksum(5))), remote()).await;

        assert!(module.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handle_message_discards_other_target() {
        let myself = LinkAddr::new(255, 190, local());
        let from = LinkAddr::new(1, 1, remote());
        let module = Arc::new(RecordingModule::default());

        handler(myself, module.clone())
            .handle_message(&datagram(from, LinkAddr::new(255, 191, local()), b"payload", None), remote()).await;

        assert!(module.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handle_message_discards_garbage() {
        let myself = LinkAddr::new(255, 190, local());
        let module = Arc::new(RecordingModule::default());
        let handler = handler(myself, module.clone());

        handler.handle_message(b"\x01\x02", remote()).await;
        handler.handle_message(&vec![0u8; MAX_MSG_SIZE + 1], remote()).await;

        assert!(module.received.lock().unwrap().is_empty());
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::messaging::link_addr::LinkAddr;
use crate::messaging::message_module::Message;
use crate::messaging::messaging::MessageSender;

/// Records sent messages instead of sending them, for verification in tests.
#[derive(Debug)]
pub struct TrackingMockMessageSender {
    myself: LinkAddr,
    tracker: Arc<RwLock<Vec<(LinkAddr, Box<dyn Message>)>>>,
}
impl TrackingMockMessageSender {
    pub fn new(myself: LinkAddr) -> Self {
        TrackingMockMessageSender {
            myself,
            tracker: Default::default()
        }
    }

    /// checks the oldest unverified message and removes it
    pub async fn assert_message_sent<M: Message + PartialEq>(&self, to: LinkAddr, message: M) {
        let mut lock = self.tracker.write().await;
        if lock.is_empty() {
            panic!("no message was sent, expected {:?}", message);
        }

        let (actual_to, actual_msg) = lock.remove(0);
        match actual_msg.as_any().downcast_ref::<M>() {
            Some(actual) => {
                assert_eq!(actual, &message);
                assert_eq!(actual_to, to);
            }
            None => panic!("expected message {:?}, was {:?}", message, actual_msg),
        }
    }

    pub async fn assert_no_remaining_messages(&self) {
        let lock = self.tracker.read().await;
        assert!(lock.is_empty(), "unverified messages: {:?}", *lock);
    }
}

#[async_trait]
impl MessageSender for TrackingMockMessageSender {
    fn get_self_addr(&self) -> LinkAddr {
        self.myself
    }

    async fn try_send<T: Message>(&self, to: LinkAddr, msg: &T) -> anyhow::Result<()> {
        self.tracker.write().await.push((to, msg.box_clone()));
        Ok(())
    }
}

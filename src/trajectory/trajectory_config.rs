use std::net::SocketAddr;
use std::time::Duration;

use crate::messaging::link_addr::LinkAddr;
use crate::messaging::messaging::MessagingImpl;

#[derive(Debug)]
pub struct TrajectoryConfig {
    pub self_addr: SocketAddr,
    pub system_id: u8,
    pub component_id: u8,

    /// the single remote endpoint this link talks to. Messages from anywhere else are discarded.
    pub peer: LinkAddr,

    /// time to wait for a response before re-sending the outstanding message
    pub retry_timeout: Duration,
    /// number of re-sends before a session is given up
    pub max_retries: u32,

    pub inbound_queue_capacity: usize,
    pub command_queue_capacity: usize,
    pub event_queue_capacity: usize,
}

impl TrajectoryConfig {
    pub fn new(self_addr: SocketAddr, peer: LinkAddr) -> TrajectoryConfig {
        TrajectoryConfig {
            self_addr,
            system_id: 255,
            component_id: 190,
            peer,
            retry_timeout: Duration::from_secs(1),
            max_retries: 5,
            inbound_queue_capacity: 32,
            command_queue_capacity: 8,
            event_queue_capacity: 128,
        }
    }

    /// this link's own address as its peer sees it
    pub fn myself(&self) -> LinkAddr {
        LinkAddr::new(self.system_id, self.component_id, self.self_addr)
    }

    /// Binds the UDP endpoint for this link, identified by the configured system and component ids
    pub async fn bind_messaging(&self) -> anyhow::Result<MessagingImpl> {
        MessagingImpl::new(self.system_id, self.component_id, self.self_addr).await
    }
}

use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace};

use crate::messaging::messaging::MAX_MSG_SIZE;
use crate::messaging::transport::{MessageHandler, Transport};


/// Plain UDP: no retransmission, no ordering, no deduplication. Reliability of trajectory
///  transfers is handled by the transfer session on top of this.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    cancel_sender: broadcast::Sender<()>,
}
impl Debug for UdpTransport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "UdpTransport{{local_addr:{:?}}}", self.local_addr)
    }
}

impl UdpTransport {
    pub async fn new(addr: SocketAddr) -> anyhow::Result<UdpTransport> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        let (cancel_sender, _) = broadcast::channel(1);

        debug!(?local_addr, "bound UDP socket");
        Ok(UdpTransport {
            socket,
            local_addr,
            cancel_sender,
        })
    }
}

#[async_trait::async_trait]
impl Transport for UdpTransport {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn send(&self, to: SocketAddr, buf: &[u8]) -> anyhow::Result<()> {
        trace!(?to, len = buf.len(), "sending datagram");
        self.socket.send_to(buf, to).await?;
        Ok(())
    }

    async fn recv_loop(&self, handler: Arc<dyn MessageHandler>) -> anyhow::Result<()> {
        // one byte more than the maximum so that oversized datagrams are detectable
        let mut buf = vec![0u8; MAX_MSG_SIZE + 1];
        let mut cancel_receiver = self.cancel_sender.subscribe();

        trace!(addr = ?self.local_addr, "starting receive loop");

        loop {
            tokio::select! {
                r = self.socket.recv_from(&mut buf) => {
                    match r {
                        Ok((len, from)) => {
                            handler.handle_message(&buf[..len], from).await;
                        }
                        Err(e) => {
                            // on some platforms, an ICMP 'port unreachable' for an earlier send
                            //  surfaces here - the socket itself is still usable
                            error!(error = ?e, "error receiving from datagram socket");
                        }
                    }
                }
                _ = cancel_receiver.recv() => break,
            }
        }

        info!(addr = ?self.local_addr, "receive loop stopped");
        Ok(())
    }

    fn cancel_recv_loop(&self) {
        match self.cancel_sender.send(()) {
            Ok(_) => info!("canceling receive loop"),
            Err(_) => debug!("call to cancel_recv_loop while no receive loop is running"),
        }
    }
}

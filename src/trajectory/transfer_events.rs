use tokio::sync::broadcast;
use tracing::trace;

use crate::trajectory::trajectory_item::TrajectorySet;
use crate::trajectory::transfer_session::{Outcome, Role};

#[derive(Clone, Debug, PartialEq)]
pub enum TransferEvent {
    Started { role: Role },
    Finished(TransferReport),
    /// a session was replaced by a new one before it terminated
    Abandoned { role: Role },
    /// the remote told us to discard our trajectory
    Cleared,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransferReport {
    pub role: Role,
    pub outcome: Outcome,
    pub count: u16,
    /// the downloaded set, for a successful download
    pub items: Option<TrajectorySet>,
}
impl TransferReport {
    pub fn is_accepted(&self) -> bool {
        self.outcome == Outcome::Accepted
    }
}


pub struct TransferEventNotifier {
    sender: broadcast::Sender<TransferEvent>,
}
impl TransferEventNotifier {
    pub fn new(capacity: usize) -> TransferEventNotifier {
        let (sender, _) = broadcast::channel(capacity);

        TransferEventNotifier {
            sender
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.sender.subscribe()
    }

    pub fn send_event(&self, event: TransferEvent) {
        trace!("event: {:?}", event);
        let _ = self.sender.send(event);
    }
}

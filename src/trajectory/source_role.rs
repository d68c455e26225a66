use tracing::{debug, trace, warn};

use crate::trajectory::trajectory_item::{TrajectorySet, UploadStore};
use crate::trajectory::trajectory_messages::{AckResult, CountData, TrajectoryMessage};
use crate::trajectory::transfer_error::TransferError;
use crate::trajectory::transfer_session::{Outcome, Role, SessionState, TransferSession};

/// Source side: announce the held set, then answer item requests one at a time until the
///  Initiator acknowledges.
impl TransferSession {
    /// Replaces the held set and announces it to the remote. A session in progress is abandoned.
    pub fn begin_upload(&mut self, set: TrajectorySet) -> Option<TrajectoryMessage> {
        self.upload_store = Some(UploadStore::new(set));
        self.announce()
    }

    /// The remote wants to (re-)read the held set. This is either a retry because the count
    ///  announcement got lost, or the start of a new transfer of the set held from an earlier upload.
    pub fn on_list_request(&mut self) -> Result<Option<TrajectoryMessage>, TransferError> {
        match self.state {
            SessionState::Announced | SessionState::Serving(_) => {
                debug!("list requested during upload - re-announcing");
                self.state = SessionState::Announced;
                self.cursor = 0;
                Ok(self.emit(TrajectoryMessage::Count(CountData { count: self.expected_count })))
            }
            SessionState::Idle | SessionState::Terminated if self.upload_store.is_some() => {
                Ok(self.announce())
            }
            _ => Err(self.mismatch("RequestList")),
        }
    }

    /// Serves the requested item. Requests are idempotent: a repeated request for the same item
    ///  (after a lost response) is answered in the same way.
    pub fn on_item_request(&mut self, seq: u16) -> Result<Option<TrajectoryMessage>, TransferError> {
        if !matches!(self.state, SessionState::Announced | SessionState::Serving(_)) {
            return Err(self.mismatch("ItemRequest"));
        }
        let Some(store) = &self.upload_store else {
            return Err(self.mismatch("ItemRequest"));
        };
        // after a (re-)announcement the download starts from 0. A later in-range index is left
        //  over from an abandoned session, and the count retry restarts the remote.
        if self.state == SessionState::Announced && seq != 0 && seq < store.len() {
            return Err(self.mismatch("ItemRequest"));
        }

        let requested = store.get(seq).copied();
        match requested {
            Ok(item) => {
                trace!(seq, count = self.expected_count, "serving item");
                self.cursor = seq + 1;
                self.state = SessionState::Serving(seq);
                Ok(self.emit(TrajectoryMessage::Item(item)))
            }
            Err(cause) => {
                warn!("{}", cause);
                Ok(self.terminate(Outcome::Rejected(cause), Some(Self::ack(AckResult::Rejected))))
            }
        }
    }

    fn announce(&mut self) -> Option<TrajectoryMessage> {
        let count = self.upload_store.as_ref()
            .map(|store| store.len())
            .unwrap_or(0);

        self.start(Role::Source);
        self.expected_count = count;
        self.state = SessionState::Announced;
        self.emit(TrajectoryMessage::Count(CountData { count }))
    }
}

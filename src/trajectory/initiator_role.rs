use tracing::{debug, info, trace};

use crate::trajectory::trajectory_item::{DownloadAccumulator, TrajectoryItem};
use crate::trajectory::trajectory_messages::{AckResult, ItemRequestData, TrajectoryMessage};
use crate::trajectory::transfer_error::TransferError;
use crate::trajectory::transfer_session::{Outcome, Role, SessionState, TransferSession};

/// Initiator side: request the count, then pull the items strictly in order, one outstanding
///  request at a time.
impl TransferSession {
    /// Asks the remote for its trajectory. A session in progress is abandoned.
    pub fn begin_list(&mut self) -> Option<TrajectoryMessage> {
        self.start(Role::Initiator);
        self.state = SessionState::AwaitingCount;
        self.emit(TrajectoryMessage::RequestList)
    }

    /// A count announcement either answers our list request, or it is the remote starting an
    ///  upload. Either way the download (re-)starts from the first item.
    pub fn on_count_announced(&mut self, count: u16) -> Result<Option<TrajectoryMessage>, TransferError> {
        match self.state {
            SessionState::AwaitingCount => {}
            SessionState::RequestingItem(_) => {
                info!(count, "count was re-announced - restarting download");
            }
            SessionState::Idle | SessionState::Terminated => {
                self.start(Role::Initiator);
            }
            SessionState::Announced | SessionState::Serving(_) => {
                return Err(self.mismatch("Count"));
            }
        }

        debug!(count, "remote announced trajectory");
        self.expected_count = count;
        self.cursor = 0;

        let download = DownloadAccumulator::new(count);
        let complete = download.is_complete();
        self.download = Some(download);

        if complete {
            return Ok(self.terminate(Outcome::Accepted, Some(Self::ack(AckResult::Accepted))));
        }
        self.request_item(0)
    }

    /// Only the item at the cursor is accepted. Anything else is a stale duplicate and is dropped
    ///  without a response: the outstanding request is re-sent on timeout.
    pub fn on_item_received(&mut self, item: TrajectoryItem) -> Result<Option<TrajectoryMessage>, TransferError> {
        if !matches!(self.state, SessionState::RequestingItem(_)) {
            return Err(self.mismatch("Item"));
        }
        let Some(download) = self.download.as_mut() else {
            return Err(self.mismatch("Item"));
        };

        if !download.push(item) {
            debug!(expected = self.cursor, received = item.sequence, "discarding out-of-sequence item");
            return Ok(None);
        }
        trace!(seq = item.sequence, count = self.expected_count, "received item");

        let next_seq = download.next_seq();
        let complete = download.is_complete();
        self.cursor = next_seq;

        if complete {
            return Ok(self.terminate(Outcome::Accepted, Some(Self::ack(AckResult::Accepted))));
        }
        self.request_item(next_seq)
    }

    fn request_item(&mut self, seq: u16) -> Result<Option<TrajectoryMessage>, TransferError> {
        self.state = SessionState::RequestingItem(seq);
        Ok(self.emit(TrajectoryMessage::ItemRequest(ItemRequestData { seq })))
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::trajectory::trajectory_item::TrajectorySet;
    use crate::trajectory::trajectory_messages::AckData;
    use crate::trajectory::transfer_events::{TransferEvent, TransferReport};
    use crate::test_util::trajectory::{test_item, test_items};

    fn request(seq: u16) -> Option<TrajectoryMessage> {
        Some(TrajectoryMessage::ItemRequest(ItemRequestData { seq }))
    }

    fn accepted() -> Option<TrajectoryMessage> {
        Some(TrajectoryMessage::Ack(AckData { result: AckResult::Accepted }))
    }

    #[test]
    fn test_begin_list() {
        let mut session = TransferSession::new(3);

        assert_eq!(session.begin_list(), Some(TrajectoryMessage::RequestList));
        assert_eq!(session.state(), SessionState::AwaitingCount);
        assert_eq!(session.role(), Role::Initiator);
        assert_eq!(session.last_outbound(), Some(&TrajectoryMessage::RequestList));
        assert_eq!(session.take_events(), vec![TransferEvent::Started { role: Role::Initiator }]);
    }

    #[test]
    fn test_download_in_lockstep() {
        let mut session = TransferSession::new(3);
        let _ = session.begin_list();

        assert_eq!(session.on_count_announced(3), Ok(request(0)));
        assert_eq!(session.on_item_received(test_item(0)), Ok(request(1)));
        assert_eq!(session.cursor(), 1);
        assert_eq!(session.on_item_received(test_item(1)), Ok(request(2)));
        assert_eq!(session.on_item_received(test_item(2)), Ok(accepted()));

        assert_eq!(session.state(), SessionState::Terminated);
        assert_eq!(session.outcome(), &Outcome::Accepted);
        assert_eq!(session.cursor(), 3);

        let events = session.take_events();
        assert_eq!(events.last(), Some(&TransferEvent::Finished(TransferReport {
            role: Role::Initiator,
            outcome: Outcome::Accepted,
            count: 3,
            items: Some(TrajectorySet::new(test_items(3)).unwrap()),
        })));
    }

    #[test]
    fn test_zero_count_completes_immediately() {
        let mut session = TransferSession::new(3);
        let _ = session.begin_list();

        assert_eq!(session.on_count_announced(0), Ok(accepted()));
        assert_eq!(session.outcome(), &Outcome::Accepted);
        assert_eq!(session.last_outbound(), None);

        let events = session.take_events();
        assert_eq!(events.last(), Some(&TransferEvent::Finished(TransferReport {
            role: Role::Initiator,
            outcome: Outcome::Accepted,
            count: 0,
            items: Some(TrajectorySet::default()),
        })));
    }

    #[test]
    fn test_out_of_sequence_items_are_discarded() {
        let mut session = TransferSession::new(3);
        let _ = session.begin_list();
        let _ = session.on_count_announced(3);
        let _ = session.on_item_received(test_item(0));

        assert_eq!(session.on_item_received(test_item(0)), Ok(None));
        assert_eq!(session.on_item_received(test_item(2)), Ok(None));
        assert_eq!(session.state(), SessionState::RequestingItem(1));
        assert_eq!(session.cursor(), 1);
        // the outstanding request is unchanged
        assert_eq!(session.last_outbound(), request(1).as_ref());
    }

    #[test]
    fn test_unsolicited_count_starts_download() {
        let mut session = TransferSession::new(3);

        assert_eq!(session.on_count_announced(2), Ok(request(0)));
        assert_eq!(session.role(), Role::Initiator);
        assert_eq!(session.take_events(), vec![TransferEvent::Started { role: Role::Initiator }]);
    }

    #[test]
    fn test_reannounced_count_restarts_download() {
        let mut session = TransferSession::new(3);
        let _ = session.begin_list();
        let _ = session.on_count_announced(3);
        let _ = session.on_item_received(test_item(0));
        session.take_events();

        assert_eq!(session.on_count_announced(2), Ok(request(0)));
        assert_eq!(session.expected_count(), 2);
        assert_eq!(session.cursor(), 0);
        // still the same session
        assert!(session.take_events().is_empty());
    }

    #[test]
    fn test_count_while_serving_is_mismatch() {
        let mut session = TransferSession::new(3);
        let _ = session.begin_upload(TrajectorySet::new(test_items(2)).unwrap());

        assert!(matches!(session.on_count_announced(5), Err(TransferError::ProtocolMismatch { message: "Count", .. })));
        assert_eq!(session.role(), Role::Source);
    }

    #[test]
    fn test_item_without_request_is_mismatch() {
        let mut session = TransferSession::new(3);
        assert!(session.on_item_received(test_item(0)).is_err());

        let _ = session.begin_list();
        assert!(session.on_item_received(test_item(0)).is_err());
        assert_eq!(session.state(), SessionState::AwaitingCount);
    }

    #[test]
    fn test_begin_list_abandons_session_in_progress() {
        let mut session = TransferSession::new(3);
        let _ = session.begin_list();
        let _ = session.on_count_announced(3);
        session.take_events();

        assert_eq!(session.begin_list(), Some(TrajectoryMessage::RequestList));
        assert_eq!(session.take_events(), vec![
            TransferEvent::Abandoned { role: Role::Initiator },
            TransferEvent::Started { role: Role::Initiator },
        ]);
    }
}

use tracing::debug;

use crate::trajectory::trajectory_item::TrajectorySet;
use crate::trajectory::trajectory_messages::TrajectoryMessage;
use crate::trajectory::transfer_session::TransferSession;

/// Local requests to a trajectory link
#[derive(Debug, Clone, PartialEq)]
pub enum TrajectoryCommand {
    Upload(TrajectorySet),
    List,
    Clear,
}

/// Routes an inbound message to the handler for its kind. Messages that do not fit the session's
///  current state are logged and discarded.
pub fn dispatch(session: &mut TransferSession, msg: TrajectoryMessage) -> Option<TrajectoryMessage> {
    let kind = msg.kind();
    let result = match msg {
        TrajectoryMessage::RequestList => session.on_list_request(),
        TrajectoryMessage::Count(data) => session.on_count_announced(data.count),
        TrajectoryMessage::ItemRequest(data) => session.on_item_request(data.seq),
        TrajectoryMessage::Item(item) => session.on_item_received(item),
        TrajectoryMessage::Ack(data) => session.on_ack(data.result),
        TrajectoryMessage::ClearAll => session.on_clear_all(),
    };

    match result {
        Ok(reply) => reply,
        Err(e) => {
            debug!("discarding {} message: {}", kind, e);
            None
        }
    }
}

pub fn execute(session: &mut TransferSession, command: TrajectoryCommand) -> Option<TrajectoryMessage> {
    match command {
        TrajectoryCommand::Upload(set) => session.begin_upload(set),
        TrajectoryCommand::List => session.begin_list(),
        TrajectoryCommand::Clear => session.clear(),
    }
}

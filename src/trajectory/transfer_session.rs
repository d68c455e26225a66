use std::fmt::{Display, Formatter};

use tracing::{debug, info, warn};

use crate::trajectory::trajectory_item::{DownloadAccumulator, UploadStore};
use crate::trajectory::trajectory_messages::{AckData, AckResult, TrajectoryMessage};
use crate::trajectory::transfer_error::TransferError;
use crate::trajectory::transfer_events::{TransferEvent, TransferReport};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Role {
    Idle,
    /// holds the authoritative trajectory and answers item requests
    Source,
    /// pulls a trajectory from the remote Source
    Initiator,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Outcome {
    InProgress,
    Accepted,
    Rejected(TransferError),
}
impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::InProgress => write!(f, "in progress"),
            Outcome::Accepted => write!(f, "accepted"),
            Outcome::Rejected(cause) => write!(f, "rejected: {}", cause),
        }
    }
}

/// Initiator: `Idle -> AwaitingCount -> RequestingItem(seq) -> ... -> Terminated`
///
/// Source: `Idle -> Announced -> Serving(last_served) -> ... -> Terminated`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SessionState {
    Idle,
    AwaitingCount,
    RequestingItem(u16),
    Announced,
    Serving(u16),
    Terminated,
}


/// The state machine for one trajectory transfer on a link, playing either the Source or the
///  Initiator role. It is purely reactive: every handler consumes one stimulus (a local command,
///  an inbound message or a timeout) and returns the single message to send in response, if any.
///  Sending and timing are up to the caller.
///
/// Entering any non-terminal state goes together with exactly one outbound message, which is
///  remembered for re-sending on timeout. So at most one request is outstanding at any time.
///
/// `Terminated` is absorbing: messages belonging to a finished session are discarded. A new
///  session starts with a local command, or when the remote starts one (a count announcement, or
///  a list request while an uploaded set is held).
///
/// The role handlers live in [super::source_role] and [super::initiator_role].
#[derive(Debug)]
pub struct TransferSession {
    pub(super) state: SessionState,
    pub(super) role: Role,
    pub(super) expected_count: u16,
    pub(super) cursor: u16,
    pub(super) outcome: Outcome,

    /// survives termination of the session that announced it: the remote can list it again
    pub(super) upload_store: Option<UploadStore>,
    pub(super) download: Option<DownloadAccumulator>,

    last_outbound: Option<TrajectoryMessage>,
    retries: u32,
    max_retries: u32,

    events: Vec<TransferEvent>,
}

impl TransferSession {
    pub fn new(max_retries: u32) -> TransferSession {
        TransferSession {
            state: SessionState::Idle,
            role: Role::Idle,
            expected_count: 0,
            cursor: 0,
            outcome: Outcome::InProgress,
            upload_store: None,
            download: None,
            last_outbound: None,
            retries: 0,
            max_retries,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// the role of the current session - after termination, the role it terminated in
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn expected_count(&self) -> u16 {
        self.expected_count
    }

    /// Initiator: the next sequence number expected. Source: one past the last item served.
    pub fn cursor(&self) -> u16 {
        self.cursor
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn is_in_progress(&self) -> bool {
        !matches!(self.state, SessionState::Idle | SessionState::Terminated)
    }

    pub fn upload_store(&self) -> Option<&UploadStore> {
        self.upload_store.as_ref()
    }

    /// the message that is re-sent if the current one goes unanswered
    pub fn last_outbound(&self) -> Option<&TrajectoryMessage> {
        self.last_outbound.as_ref()
    }

    /// drains events accumulated since the last call
    pub fn take_events(&mut self) -> Vec<TransferEvent> {
        std::mem::take(&mut self.events)
    }

    /// To be called when the outstanding message went unanswered for too long. Returns the
    ///  message to re-send, or terminates the session once retries are exhausted.
    pub fn on_timeout(&mut self) -> Option<TrajectoryMessage> {
        if !self.is_in_progress() {
            return None;
        }

        if self.retries >= self.max_retries {
            let cause = TransferError::Timeout { retries: self.retries };
            warn!(role = ?self.role, state = ?self.state, "giving up: {}", cause);
            let reply = match self.role {
                Role::Source => Some(Self::ack(AckResult::Rejected)),
                _ => None,
            };
            return self.terminate(Outcome::Rejected(cause), reply);
        }

        self.retries += 1;
        debug!(retry = self.retries, max_retries = self.max_retries, msg = ?self.last_outbound, "no response - re-sending");
        self.last_outbound.clone()
    }

    /// Local 'clear' command: asks the remote to discard its trajectory. The request is not
    ///  acknowledged, so nothing is awaited.
    pub fn clear(&mut self) -> Option<TrajectoryMessage> {
        self.abandon_if_in_progress();
        Some(TrajectoryMessage::ClearAll)
    }

    pub fn on_clear_all(&mut self) -> Result<Option<TrajectoryMessage>, TransferError> {
        info!("remote requested to clear the trajectory");
        self.abandon_if_in_progress();
        self.upload_store = None;
        self.events.push(TransferEvent::Cleared);
        Ok(None)
    }

    /// The remote's final verdict. A Source accepts either verdict; an Initiator can only be told
    ///  that the remote gave up.
    pub fn on_ack(&mut self, result: AckResult) -> Result<Option<TrajectoryMessage>, TransferError> {
        match (self.state, result) {
            (SessionState::Announced | SessionState::Serving(_), AckResult::Accepted) => {
                Ok(self.terminate(Outcome::Accepted, None))
            }
            (SessionState::Announced | SessionState::Serving(_), AckResult::Rejected) |
            (SessionState::AwaitingCount | SessionState::RequestingItem(_), AckResult::Rejected) => {
                Ok(self.terminate(Outcome::Rejected(TransferError::RemoteRejected), None))
            }
            _ => Err(self.mismatch("Ack")),
        }
    }

    /// Starts a new session in the given role, abandoning the one in progress (if any).
    pub(super) fn start(&mut self, role: Role) {
        self.abandon_if_in_progress();

        info!(?role, "starting trajectory transfer");
        self.role = role;
        self.outcome = Outcome::InProgress;
        self.expected_count = 0;
        self.cursor = 0;
        self.download = None;
        self.events.push(TransferEvent::Started { role });
    }

    /// Records `msg` as the outstanding message and returns it for sending.
    pub(super) fn emit(&mut self, msg: TrajectoryMessage) -> Option<TrajectoryMessage> {
        self.retries = 0;
        self.last_outbound = Some(msg.clone());
        Some(msg)
    }

    pub(super) fn terminate(&mut self, outcome: Outcome, reply: Option<TrajectoryMessage>) -> Option<TrajectoryMessage> {
        match &outcome {
            Outcome::Rejected(cause) => warn!(role = ?self.role, "trajectory transfer rejected: {}", cause),
            _ => info!(role = ?self.role, count = self.expected_count, "trajectory transfer {}", outcome),
        }

        self.state = SessionState::Terminated;
        self.outcome = outcome.clone();
        self.last_outbound = None;
        self.retries = 0;

        let items = match (&outcome, self.role) {
            (Outcome::Accepted, Role::Initiator) => self.download.take().map(|d| d.into_set()),
            _ => None,
        };
        self.download = None;

        self.events.push(TransferEvent::Finished(TransferReport {
            role: self.role,
            outcome,
            count: self.expected_count,
            items,
        }));
        reply
    }

    pub(super) fn mismatch(&self, message: &'static str) -> TransferError {
        TransferError::ProtocolMismatch {
            message,
            state: format!("{:?}", self.state),
        }
    }

    pub(super) fn ack(result: AckResult) -> TrajectoryMessage {
        TrajectoryMessage::Ack(AckData { result })
    }

    /// The abandoned session is dropped without a verdict; no further messages are sent for it.
    fn abandon_if_in_progress(&mut self) {
        if self.is_in_progress() {
            info!(role = ?self.role, state = ?self.state, "abandoning trajectory transfer in progress");
            self.events.push(TransferEvent::Abandoned { role: self.role });
        }

        self.state = SessionState::Idle;
        self.role = Role::Idle;
        self.outcome = Outcome::InProgress;
        self.download = None;
        self.last_outbound = None;
        self.retries = 0;
    }
}

use thiserror::Error;

/// Faults of a trajectory transfer. None of these ever escape a [super::transfer_session::TransferSession]:
///  they either terminate the session with a verdict, or they cause an inbound message to be
///  discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("item {seq} was requested, but only {count} items were announced")]
    IndexOutOfRange { seq: u16, count: u16 },

    #[error("{message} is not expected in state {state}")]
    ProtocolMismatch { message: &'static str, state: String },

    #[error("no response after {retries} retries")]
    Timeout { retries: u32 },

    #[error("the remote endpoint rejected the transfer")]
    RemoteRejected,

    #[error("malformed trajectory input in line {line}: {reason}")]
    InputMalformed { line: usize, reason: String },

    #[error("a trajectory can hold at most {max} items, got {len}")]
    TooManyItems { len: usize, max: usize },
}

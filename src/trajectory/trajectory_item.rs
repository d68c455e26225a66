use crate::trajectory::transfer_error::TransferError;

/// A single waypoint. Apart from `sequence`, the transfer treats all fields as opaque payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryItem {
    pub sequence: u16,
    /// navigation command code
    pub command: u16,
    /// coordinate frame code
    pub frame: u8,
    pub param1: i32,
    pub param2: i32,
    pub param3: i32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}


/// An ordered, gap-less sequence of items: the item at index `i` has sequence number `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrajectorySet {
    items: Vec<TrajectoryItem>,
}
impl TrajectorySet {
    pub const MAX_LEN: usize = u16::MAX as usize;

    /// Sequence numbers are (re-)assigned from each item's position.
    pub fn new(items: Vec<TrajectoryItem>) -> Result<TrajectorySet, TransferError> {
        let mut result = TrajectorySet::default();
        result.set(items)?;
        Ok(result)
    }

    /// Replaces the held items as a whole. On error, the previous items are left untouched.
    pub fn set(&mut self, mut items: Vec<TrajectoryItem>) -> Result<(), TransferError> {
        if items.len() > Self::MAX_LEN {
            return Err(TransferError::TooManyItems { len: items.len(), max: Self::MAX_LEN });
        }

        for (idx, item) in items.iter_mut().enumerate() {
            // `idx` fits into a u16 because of the length check above
            item.sequence = idx as u16;
        }
        self.items = items;
        Ok(())
    }

    pub fn get(&self, seq: u16) -> Result<&TrajectoryItem, TransferError> {
        self.items.get(seq as usize)
            .ok_or(TransferError::IndexOutOfRange { seq, count: self.len() })
    }

    pub fn len(&self) -> u16 {
        self.items.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[TrajectoryItem] {
        &self.items
    }
}


/// The set held by the Source role. It is never modified while it is being served, only
///  replaced as a whole by a new upload.
#[derive(Debug, Clone)]
pub struct UploadStore {
    set: TrajectorySet,
}
impl UploadStore {
    pub fn new(set: TrajectorySet) -> UploadStore {
        UploadStore { set }
    }

    pub fn get(&self, seq: u16) -> Result<&TrajectoryItem, TransferError> {
        self.set.get(seq)
    }

    pub fn len(&self) -> u16 {
        self.set.len()
    }
}


/// Collects items on the Initiator side. Items can only be appended in sequence, so the
///  accumulated items are always a gap-less prefix of the remote set.
#[derive(Debug, Clone)]
pub struct DownloadAccumulator {
    expected_count: u16,
    items: Vec<TrajectoryItem>,
}
impl DownloadAccumulator {
    pub fn new(expected_count: u16) -> DownloadAccumulator {
        DownloadAccumulator {
            expected_count,
            items: Vec::with_capacity(expected_count as usize),
        }
    }

    /// the sequence number of the next item this accumulator accepts
    pub fn next_seq(&self) -> u16 {
        self.items.len() as u16
    }

    pub fn is_complete(&self) -> bool {
        self.items.len() == self.expected_count as usize
    }

    /// Returns `false` and leaves the accumulator unchanged if the item is not the next one in
    ///  sequence or the accumulator is already complete.
    #[must_use]
    pub fn push(&mut self, item: TrajectoryItem) -> bool {
        if self.is_complete() || item.sequence != self.next_seq() {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn into_set(self) -> TrajectorySet {
        TrajectorySet { items: self.items }
    }
}

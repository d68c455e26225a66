use crate::trajectory::trajectory_item::TrajectoryItem;

/// an item with sequence number `n` and a payload derived from `n`, so that items with
///  different numbers are distinguishable
pub fn test_item(n: u16) -> TrajectoryItem {
    TrajectoryItem {
        sequence: n,
        command: 16,
        frame: 3,
        param1: n as i32,
        param2: -(n as i32),
        param3: 0,
        x: 47.0 + n as f32 * 0.001,
        y: 8.0 + n as f32 * 0.002,
        z: 100.0,
    }
}

pub fn test_items(len: u16) -> Vec<TrajectoryItem> {
    (0..len)
        .map(test_item)
        .collect()
}

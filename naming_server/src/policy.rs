/// Replication/invalidation policy. Stateless decision functions consulted
/// by the coordinator once the governing lock is held.

/// One extra replica should exist for roughly every this many reads.
pub const REPLICATION_SCALE: u64 = 20;

/// True when a file is due for one more replica: the read counter has just
/// reached a multiple of the scale and the replica set has not caught up.
/// The counter is reset whenever a replica is added, so the check re-arms
/// at the next multiple.
pub fn needs_replication(is_file: bool, read_count: u64, replica_count: usize) -> bool {
    is_file
        && read_count > 0
        && read_count % REPLICATION_SCALE == 0
        && read_count / REPLICATION_SCALE != replica_count.saturating_sub(1) as u64
}

/// True when a write is about to be granted on a file that still has more
/// than one replica; all but one must be dropped first.
pub fn needs_invalidation(is_file: bool, replica_count: usize) -> bool {
    is_file && replica_count > 1
}

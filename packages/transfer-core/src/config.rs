//! Tunable constants for the chunk plan, send pipeline, and rendezvous
//! pairing. All of these have sane defaults but are exposed as plain
//! fields so a binary crate can override them (e.g. via CLI flags).

/// Size of a main chunk, in bytes. The chunk plan groups consecutive
/// sub-chunks into main chunks purely for progress reporting and
/// coarse-grained retry bookkeeping.
pub const DEFAULT_MAIN_CHUNK_SIZE: u64 = 50 * 1024 * 1024;

/// Size of a sub-chunk, in bytes. This is the unit of transmission,
/// integrity verification, and acknowledgement.
pub const DEFAULT_SUB_CHUNK_SIZE: u32 = 1024 * 1024;

/// Sender backs off once the transport's buffered-but-unsent bytes
/// reach this level.
pub const DEFAULT_HIGH_WATER_MARK: u64 = 64 * 1024 * 1024;

/// Sender resumes once the transport's buffered amount drops to this
/// level (the `lowWaterEvent` threshold).
pub const DEFAULT_LOW_WATER_THRESHOLD: u64 = 1024 * 1024;

/// Maximum number of sub-chunks the sender will have in flight
/// (announced but not yet acked) at once.
pub const DEFAULT_MAX_CONCURRENT_SENDS: usize = 3;

/// Maximum number of retransmission attempts per sub-chunk before it
/// is treated as a fatal transfer failure.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Room codes are four decimal digits, drawn from this range.
pub const ROOM_CODE_MIN: u32 = 1000;
pub const ROOM_CODE_MAX: u32 = 9999;

/// Default TCP port for the rendezvous service.
pub const DEFAULT_RENDEZVOUS_PORT: u16 = 3000;

/// Grace period with no progress before the receiver emits a gap-detection
/// NACK batch for outstanding sub-chunks.
pub const DEFAULT_GAP_DETECTION_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

/// Tunables for a single send pipeline run. Constructed with
/// [`SendConfig::default`] and overridden field-by-field.
#[derive(Debug, Clone)]
pub struct SendConfig {
    pub main_chunk_size: u64,
    pub sub_chunk_size: u32,
    pub high_water_mark: u64,
    pub low_water_threshold: u64,
    pub max_concurrent_sends: usize,
    pub max_retries: u32,
    /// Enables [`crate::adaptive::AdaptiveTuner`]'s inter-send delay,
    /// which grows with recent retry pressure and decays once
    /// sub-chunks start acking cleanly again.
    pub adaptive: bool,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            main_chunk_size: DEFAULT_MAIN_CHUNK_SIZE,
            sub_chunk_size: DEFAULT_SUB_CHUNK_SIZE,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            low_water_threshold: DEFAULT_LOW_WATER_THRESHOLD,
            max_concurrent_sends: DEFAULT_MAX_CONCURRENT_SENDS,
            max_retries: DEFAULT_MAX_RETRIES,
            adaptive: false,
        }
    }
}

/// Tunables for a single receive pipeline run.
#[derive(Debug, Clone)]
pub struct ReceiveConfig {
    pub gap_detection_grace: std::time::Duration,
    pub max_nack_batch: usize,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            gap_detection_grace: DEFAULT_GAP_DETECTION_GRACE,
            max_nack_batch: 64,
        }
    }
}

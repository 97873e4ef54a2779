pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Previous-hash sentinel carried by the genesis block.
pub const GENESIS_PREV_HASH: &str = "0";
pub const GENESIS_CREATOR_ID: u64 = 0;

pub const DEFAULT_DIFFICULTY: u32 = 4;
/// Range offered by the host's difficulty control. Values above 5 make the
/// single-threaded search impractically slow.
pub const MIN_DIFFICULTY: u32 = 1;
pub const MAX_DIFFICULTY: u32 = 5;

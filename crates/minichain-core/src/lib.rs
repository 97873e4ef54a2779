use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod constants;
pub mod mine;

use constants::{GENESIS_CREATOR_ID, GENESIS_PREV_HASH};

/// One transfer: sender, receiver, amount. Immutable once constructed;
/// every block owns its own Record by value.
///
/// Amounts are `u64`, so negative values are unrepresentable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub sender: String,
    pub receiver: String,
    pub amount: u64,
}

impl Record {
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, amount: u64) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
        }
    }
}

impl fmt::Display for Record {
    /// Composite string fed into the block hash, so the rendering is part
    /// of the hashing contract and must stay stable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record {{ sender: {}, receiver: {}, amount: {} }}",
            self.sender, self.receiver, self.amount
        )
    }
}

/// A sealed unit: one Record plus linkage metadata.
///
/// All fields are fixed at construction except `nonce`, which is mutated
/// only by the proof-of-work search and is final once the search succeeds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub record: Record,
    pub creator_id: u64,
    pub prev_hash: String,
    pub timestamp: String,
    pub nonce: u64,
}

impl Block {
    /// Candidate block with the timestamp captured now and nonce 0. The
    /// caller supplies `prev_hash` from the current chain tip.
    pub fn new(record: Record, creator_id: u64, prev_hash: String) -> Self {
        Self {
            record,
            creator_id,
            prev_hash,
            timestamp: wall_clock_hms(),
            nonce: 0,
        }
    }

    /// The first block of a chain: placeholder record, creator 0 and the
    /// `"0"` previous-hash sentinel. Never mined.
    pub fn genesis() -> Self {
        Self::new(
            Record::new("genesis", "genesis", 0),
            GENESIS_CREATOR_ID,
            GENESIS_PREV_HASH.to_string(),
        )
    }

    /// SHA-256 over the string renderings of the block fields, in a fixed
    /// order: record, creator_id, timestamp, prev_hash, nonce. Returns the
    /// 64-char lowercase hex digest. Pure function of the current field
    /// values.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.record.to_string().as_bytes());
        hasher.update(self.creator_id.to_string().as_bytes());
        hasher.update(self.timestamp.as_bytes());
        hasher.update(self.prev_hash.as_bytes());
        hasher.update(self.nonce.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Wall-clock UTC time as `HH:MM:SS`.
fn wall_clock_hms() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs();
    let day = secs % 86_400;
    format!("{:02}:{:02}:{:02}", day / 3_600, day % 3_600 / 60, day % 60)
}

pub mod pow {
    use super::Block;
    use tracing::info;

    /// Number of leading `'0'` characters in a hex digest.
    pub fn leading_zero_hex_chars(hash: &str) -> u32 {
        hash.bytes().take_while(|b| *b == b'0').count() as u32
    }

    /// A digest satisfies `difficulty` when its first `difficulty` hex
    /// chars are all `'0'`.
    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        leading_zero_hex_chars(hash) >= difficulty
    }

    /// Sequential brute-force nonce search, starting from the block's
    /// current nonce and incrementing by one per attempt. Unbounded:
    /// expected work is 16^difficulty hash evaluations. Mutates only
    /// `nonce`; returns the winning hash.
    ///
    /// Blocks the calling thread for the whole search. Interactive hosts
    /// should use [`crate::mine::spawn_mine`] instead.
    pub fn mine(block: &mut Block, difficulty: u32) -> String {
        let mut hash = block.hash();
        while !meets_difficulty(&hash, difficulty) {
            block.nonce += 1;
            hash = block.hash();
        }
        info!(nonce = block.nonce, hash = %hash, "winning hash");
        hash
    }
}

pub mod chain {
    use super::{pow, Block, Record};
    use crate::constants::DEFAULT_DIFFICULTY;
    use serde::{Deserialize, Serialize};
    use thiserror::Error;
    use tracing::debug;

    #[derive(Debug, Error)]
    pub enum ChainError {
        #[error("chain has no blocks; create it with a genesis block first")]
        EmptyChain,
        #[error("candidate prev_hash {found} does not reference the current tip {expected}")]
        StaleTip { expected: String, found: String },
    }

    /// An append-only sequence of blocks. Admission mines each candidate
    /// at the current difficulty; the sequence never shrinks or reorders.
    ///
    /// `&mut self` on the admission methods keeps admissions serialized:
    /// reading the tip, mining and appending happen as one exclusive unit.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct Chain {
        pub blocks: Vec<Block>,
        /// Required count of leading zero hex chars for future admissions.
        /// May be changed at any time; never re-applied to past blocks.
        pub difficulty: u32,
    }

    impl Chain {
        /// Chain holding exactly one genesis block, at [`DEFAULT_DIFFICULTY`].
        pub fn new() -> Self {
            Self::with_difficulty(DEFAULT_DIFFICULTY)
        }

        pub fn with_difficulty(difficulty: u32) -> Self {
            Self {
                blocks: vec![Block::genesis()],
                difficulty,
            }
        }

        pub fn tip(&self) -> Result<&Block, ChainError> {
            self.blocks.last().ok_or(ChainError::EmptyChain)
        }

        pub fn len(&self) -> usize {
            self.blocks.len()
        }

        pub fn is_empty(&self) -> bool {
            self.blocks.is_empty()
        }

        /// Admit a fully-populated candidate: verify it references the
        /// current tip, mine it at the chain's difficulty, append it.
        ///
        /// A candidate whose `prev_hash` does not match the tip is
        /// rejected up front rather than mined into an invalid link.
        pub fn admit(&mut self, mut candidate: Block) -> Result<(), ChainError> {
            let tip_hash = self.tip()?.hash();
            if candidate.prev_hash != tip_hash {
                return Err(ChainError::StaleTip {
                    expected: tip_hash,
                    found: candidate.prev_hash,
                });
            }
            pow::mine(&mut candidate, self.difficulty);
            debug!(
                index = self.blocks.len(),
                nonce = candidate.nonce,
                "block admitted"
            );
            self.blocks.push(candidate);
            Ok(())
        }

        /// Build a candidate from `record` referencing the current tip,
        /// run admission, and return the appended block.
        pub fn add_block(&mut self, record: Record, creator_id: u64) -> Result<&Block, ChainError> {
            let prev_hash = self.tip()?.hash();
            let candidate = Block::new(record, creator_id, prev_hash);
            self.admit(candidate)?;
            self.blocks.last().ok_or(ChainError::EmptyChain)
        }

        /// Link-integrity walk: recompute each block's hash and compare it
        /// against the `prev_hash` recorded by its successor, returning
        /// false at the first mismatch. A single-block chain is trivially
        /// valid.
        ///
        /// The leading-zero difficulty property is enforced at admission
        /// and deliberately not re-checked here.
        pub fn is_valid(&self) -> bool {
            let Some(first) = self.blocks.first() else {
                return true;
            };
            let mut expected = first.hash();
            for block in &self.blocks[1..] {
                if block.prev_hash != expected {
                    return false;
                }
                expected = block.hash();
            }
            true
        }
    }

    impl Default for Chain {
        fn default() -> Self {
            Self::new()
        }
    }
}

//! Background proof-of-work search.
//!
//! [`crate::pow::mine`] blocks its caller for the whole search, which for
//! difficulty 5 and above can be minutes on one thread. Interactive hosts
//! run the same sequential search on a dedicated worker instead, polling
//! for completion and cancelling when the user gives up.

use crate::{pow, Block};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::info;

#[derive(Debug)]
pub enum MineOutcome {
    /// Search succeeded; the block's nonce is fixed and its hash satisfies
    /// the difficulty it was mined at.
    Mined(Block, String),
    /// Search was cancelled; the block is returned with whatever nonce the
    /// search had reached.
    Cancelled(Block),
}

/// Handle to an in-flight search on a worker thread.
#[derive(Debug)]
pub struct MineJob {
    cancel: Arc<AtomicBool>,
    attempts: Arc<AtomicU64>,
    handle: Option<JoinHandle<MineOutcome>>,
}

/// Start the nonce search for `block` on a dedicated thread.
pub fn spawn_mine(mut block: Block, difficulty: u32) -> MineJob {
    let cancel = Arc::new(AtomicBool::new(false));
    let attempts = Arc::new(AtomicU64::new(0));

    let handle = thread::spawn({
        let cancel = cancel.clone();
        let attempts = attempts.clone();
        move || loop {
            if cancel.load(Ordering::Relaxed) {
                info!(nonce = block.nonce, "search cancelled");
                return MineOutcome::Cancelled(block);
            }
            let hash = block.hash();
            attempts.fetch_add(1, Ordering::Relaxed);
            if pow::meets_difficulty(&hash, difficulty) {
                info!(nonce = block.nonce, hash = %hash, "winning hash");
                return MineOutcome::Mined(block, hash);
            }
            block.nonce += 1;
        }
    });

    MineJob {
        cancel,
        attempts,
        handle: Some(handle),
    }
}

impl MineJob {
    /// Ask the worker to stop. The search ends after its current attempt.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Nonces tried so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Non-blocking poll. Returns the outcome once the worker has stopped,
    /// `None` while it is still searching or after the outcome was taken.
    pub fn try_finish(&mut self) -> Option<MineOutcome> {
        if self.handle.as_ref()?.is_finished() {
            let handle = self.handle.take()?;
            Some(handle.join().expect("miner thread panicked"))
        } else {
            None
        }
    }

    /// Block until the worker stops and return the outcome.
    pub fn join(mut self) -> MineOutcome {
        let handle = self.handle.take().expect("outcome already taken");
        handle.join().expect("miner thread panicked")
    }
}

impl Drop for MineJob {
    fn drop(&mut self) {
        // An abandoned handle must not leave the worker spinning forever.
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Record;

    fn candidate() -> Block {
        Block::new(Record::new("A", "B", 10), 42, "0".to_string())
    }

    #[test]
    fn spawn_mine_finds_winning_nonce() {
        let job = spawn_mine(candidate(), 2);
        match job.join() {
            MineOutcome::Mined(block, hash) => {
                assert!(hash.starts_with("00"));
                assert_eq!(hash, block.hash());
            }
            MineOutcome::Cancelled(_) => panic!("search should complete at difficulty 2"),
        }
    }

    #[test]
    fn cancel_stops_the_search() {
        // 64 leading zeros would need an all-zero digest; the search can
        // only end via cancellation.
        let job = spawn_mine(candidate(), 64);
        while job.attempts() == 0 {
            thread::yield_now();
        }
        job.cancel();
        match job.join() {
            MineOutcome::Cancelled(block) => assert_eq!(block.record.sender, "A"),
            MineOutcome::Mined(..) => panic!("difficulty 64 cannot be mined"),
        }
    }

    #[test]
    fn try_finish_polls_without_blocking() {
        let mut job = spawn_mine(candidate(), 1);
        let outcome = loop {
            if let Some(outcome) = job.try_finish() {
                break outcome;
            }
            thread::yield_now();
        };
        assert!(matches!(outcome, MineOutcome::Mined(..)));
        // Outcome can only be taken once.
        assert!(job.try_finish().is_none());
    }

    #[test]
    fn attempts_counts_hash_evaluations() {
        let job = spawn_mine(candidate(), 0);
        while !job.is_finished() {
            thread::yield_now();
        }
        assert_eq!(job.attempts(), 1);
        match job.join() {
            MineOutcome::Mined(block, _) => assert_eq!(block.nonce, 0),
            MineOutcome::Cancelled(_) => panic!("difficulty 0 succeeds immediately"),
        }
    }
}

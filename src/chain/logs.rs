//! Chunked Event Search
//!
//! Nodes cap `eth_getLogs` ranges, and freshly mined events may not be
//! indexed yet. The search walks backward from the chain head in bounded
//! chunks, stops at the first match and gives up past a fixed lookback.

use thiserror::Error;
use tracing::{debug, warn};

use super::{GameChain, RevealEvent};
use crate::core::address::{Address, RoomId};

/// Search bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogSearchConfig {
    /// Max blocks per `eth_getLogs` query.
    pub chunk_blocks: u64,
    /// Max distance below the head to search.
    pub max_lookback: u64,
}

impl Default for LogSearchConfig {
    fn default() -> Self {
        Self {
            chunk_blocks: 990,
            max_lookback: 5_000,
        }
    }
}

impl LogSearchConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chunk_blocks: std::env::var("LOG_CHUNK_BLOCKS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u64| *v > 0)
                .unwrap_or(defaults.chunk_blocks),
            max_lookback: std::env::var("LOG_MAX_LOOKBACK")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_lookback),
        }
    }
}

/// Log search failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogSearchError {
    /// Walked the whole lookback window without a match.
    #[error("no matching event within {scanned} blocks")]
    Exhausted {
        /// Blocks covered by the search.
        scanned: u64,
    },
    /// Could not read the chain head.
    #[error("could not read block number: {0}")]
    Head(String),
}

/// Backward iterator over inclusive `(from, to)` block ranges.
///
/// ```
/// use mafia_coordinator::chain::BlockRanges;
///
/// let ranges: Vec<_> = BlockRanges::new(2_000, 990, 1_500).collect();
/// assert_eq!(ranges, vec![(1_011, 2_000), (500, 1_010)]);
/// ```
#[derive(Clone, Debug)]
pub struct BlockRanges {
    next_to: Option<u64>,
    floor: u64,
    chunk: u64,
}

impl BlockRanges {
    /// Ranges from `latest` down to `latest - max_lookback` (saturating at 0).
    pub fn new(latest: u64, chunk: u64, max_lookback: u64) -> Self {
        Self {
            next_to: Some(latest),
            floor: latest.saturating_sub(max_lookback),
            chunk: chunk.max(1),
        }
    }

    /// Total blocks the full iteration covers.
    pub fn span(latest: u64, max_lookback: u64) -> u64 {
        latest - latest.saturating_sub(max_lookback) + 1
    }
}

impl Iterator for BlockRanges {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let to = self.next_to?;
        let from = to.saturating_sub(self.chunk - 1).max(self.floor);
        self.next_to = if from > self.floor { Some(from - 1) } else { None };
        Some((from, to))
    }
}

/// Find the most recent reveal by `detective` targeting `target`.
///
/// A failed chunk query is logged and treated as "not in this chunk".
pub async fn search_reveal_event<C: GameChain>(
    chain: &C,
    room_id: RoomId,
    detective: Address,
    target: Address,
    config: LogSearchConfig,
) -> Result<RevealEvent, LogSearchError> {
    let latest = chain
        .block_number()
        .await
        .map_err(|e| LogSearchError::Head(e.to_string()))?;

    for (from, to) in BlockRanges::new(latest, config.chunk_blocks, config.max_lookback) {
        match chain.reveal_events(room_id, detective, from, to).await {
            Ok(events) => {
                // Newest first within the chunk
                if let Some(event) = events
                    .into_iter()
                    .filter(|e| e.detective == detective && e.target == target)
                    .max_by_key(|e| e.block_number)
                {
                    debug!("Found reveal for room {} at block {}", room_id, event.block_number);
                    return Ok(event);
                }
            }
            Err(e) => {
                warn!("Log query {}..={} failed, continuing: {}", from, to, e);
            }
        }
    }

    Err(LogSearchError::Exhausted {
        scanned: BlockRanges::span(latest, config.max_lookback),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::RoomPhase;
    use crate::testing::MockChain;

    #[test]
    fn test_ranges_cover_lookback_without_overlap() {
        let ranges: Vec<_> = BlockRanges::new(10_000, 990, 5_000).collect();
        assert_eq!(ranges.first(), Some(&(9_011, 10_000)));
        assert_eq!(ranges.last().map(|r| r.0), Some(5_000));
        for pair in ranges.windows(2) {
            assert_eq!(pair[1].1 + 1, pair[0].0);
        }
        for (from, to) in &ranges {
            assert!(to - from < 990);
        }
        let covered: u64 = ranges.iter().map(|(f, t)| t - f + 1).sum();
        assert_eq!(covered, BlockRanges::span(10_000, 5_000));
    }

    #[test]
    fn test_ranges_near_genesis() {
        let ranges: Vec<_> = BlockRanges::new(100, 990, 5_000).collect();
        assert_eq!(ranges, vec![(0, 100)]);
        let ranges: Vec<_> = BlockRanges::new(0, 990, 5_000).collect();
        assert_eq!(ranges, vec![(0, 0)]);
    }

    async fn chain_with_room() -> (MockChain, Address, Address) {
        let chain = MockChain::new();
        let detective = Address::new([0xde; 20]);
        let target = Address::new([0x7a; 20]);
        chain.add_room(1, detective, RoomPhase::Night, &[detective, target]).await;
        chain.set_block_number(20_000).await;
        (chain, detective, target)
    }

    #[tokio::test]
    async fn test_finds_event_in_older_chunk() {
        let (chain, detective, target) = chain_with_room().await;
        chain.push_reveal_event(1, 17_500, detective, target).await;

        let event = search_reveal_event(&chain, 1, detective, target, LogSearchConfig::default())
            .await
            .unwrap();
        assert_eq!(event.block_number, 17_500);
        assert!(chain.log_queries().await >= 3);
    }

    #[tokio::test]
    async fn test_stops_at_first_match() {
        let (chain, detective, target) = chain_with_room().await;
        chain.push_reveal_event(1, 19_900, detective, target).await;
        chain.push_reveal_event(1, 16_000, detective, target).await;

        let event = search_reveal_event(&chain, 1, detective, target, LogSearchConfig::default())
            .await
            .unwrap();
        assert_eq!(event.block_number, 19_900);
        assert_eq!(chain.log_queries().await, 1);
    }

    #[tokio::test]
    async fn test_failed_chunk_does_not_abort() {
        let (chain, detective, target) = chain_with_room().await;
        chain.fail_log_range_containing(19_500).await;
        chain.push_reveal_event(1, 18_500, detective, target).await;

        let event = search_reveal_event(&chain, 1, detective, target, LogSearchConfig::default())
            .await
            .unwrap();
        assert_eq!(event.block_number, 18_500);
    }

    #[tokio::test]
    async fn test_exhausted_past_lookback() {
        let (chain, detective, target) = chain_with_room().await;
        // Too old to be found
        chain.push_reveal_event(1, 10_000, detective, target).await;
        // Wrong target
        chain.push_reveal_event(1, 19_000, detective, Address::new([1; 20])).await;

        let err = search_reveal_event(&chain, 1, detective, target, LogSearchConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err, LogSearchError::Exhausted { scanned: 5_001 });
    }
}

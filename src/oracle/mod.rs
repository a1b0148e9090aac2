//! # Oracle Module - Level-Up Stat Allocation
//!
//! Every level-up grants [`LEVEL_UP_POINTS`] stat points. An external advisory
//! service (the oracle) may propose a split themed on the account's quests;
//! whatever it answers, the split that reaches the account is always four
//! non-negative values summing to exactly [`LEVEL_UP_POINTS`].
//!
//! Resolution rules for a proposal:
//!
//! - exact non-negative split: used as-is
//! - non-negative with a positive but wrong total: scaled proportionally,
//!   the rounding residual settled in STR, VIT, AGI, INT order
//! - anything else (error, timeout, negative value, zero total): a uniformly
//!   random split
//!
//! Oracle failures are logged and never reach the caller.

#[cfg(feature = "gemini")]
pub mod gemini;

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use rand::seq::index;
use serde::Deserialize;
use thiserror::Error;

use crate::config::OracleConfig;
use crate::quest::{LevelUpReward, Stats};

pub const LEVEL_UP_POINTS: u32 = 4;

/// Raw oracle answer. Values are signed so that out-of-contract replies can be
/// recognised instead of failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StatProposal {
    #[serde(rename = "str")]
    pub strength: i64,
    #[serde(rename = "vit")]
    pub vitality: i64,
    #[serde(rename = "agi")]
    pub agility: i64,
    #[serde(rename = "int")]
    pub intelligence: i64,
}

impl StatProposal {
    fn to_array(self) -> [i64; 4] {
        [self.strength, self.vitality, self.agility, self.intelligence]
    }
}

/// Where an applied stat split came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationSource {
    Oracle,
    Rescaled,
    Random,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle disabled")]
    Disabled,

    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle request failed: {0}")]
    Http(String),

    #[error("oracle returned status {0}")]
    Status(u16),

    #[error("malformed oracle response: {0}")]
    Malformed(String),
}

/// An advisory service that proposes how to spend level-up points.
#[async_trait]
pub trait StatOracle: Send + Sync {
    async fn propose(
        &self,
        quest_names: &[String],
        level: u32,
        points: u32,
    ) -> Result<StatProposal, OracleError>;
}

/// Time-bounded oracle access with a total fallback.
pub struct StatAllocator {
    oracle: Option<Box<dyn StatOracle>>,
    timeout: Duration,
}

impl StatAllocator {
    pub fn new(oracle: Box<dyn StatOracle>, timeout: Duration) -> Self {
        StatAllocator {
            oracle: Some(oracle),
            timeout,
        }
    }

    /// Allocator that never calls out; every split is random.
    pub fn offline() -> Self {
        StatAllocator {
            oracle: None,
            timeout: Duration::ZERO,
        }
    }

    /// Build from configuration. Falls back to [`StatAllocator::offline`] when
    /// the oracle is disabled, compiled out, or has no API key.
    pub fn from_config(config: &OracleConfig) -> Self {
        if !config.enabled {
            debug!("Stat oracle disabled in config");
            return Self::offline();
        }
        #[cfg(feature = "gemini")]
        {
            if let Some(oracle) = gemini::GeminiOracle::from_config(config) {
                return Self::new(
                    Box::new(oracle),
                    Duration::from_secs(config.timeout_seconds),
                );
            }
            info!("No stat oracle API key configured; level-ups use random allocation");
        }
        #[cfg(not(feature = "gemini"))]
        info!("Stat oracle support not compiled in; level-ups use random allocation");
        Self::offline()
    }

    pub fn is_online(&self) -> bool {
        self.oracle.is_some()
    }

    /// Stat gain for reaching `level`. Never fails.
    pub async fn allocate(&self, quest_names: &[String], level: u32) -> LevelUpReward {
        let proposal = match self.consult(quest_names, level).await {
            Ok(p) => Some(p),
            Err(OracleError::Disabled) => None,
            Err(e) => {
                warn!("Stat oracle failed for level {}: {} (using fallback)", level, e);
                None
            }
        };
        let (gain, source) = resolve_proposal(proposal);
        LevelUpReward { level, gain, source }
    }

    async fn consult(&self, quest_names: &[String], level: u32) -> Result<StatProposal, OracleError> {
        let oracle = self.oracle.as_ref().ok_or(OracleError::Disabled)?;
        tokio::time::timeout(
            self.timeout,
            oracle.propose(quest_names, level, LEVEL_UP_POINTS),
        )
        .await
        .map_err(|_| OracleError::Timeout(self.timeout))?
    }
}

/// Turn an optional oracle answer into a valid split.
pub fn resolve_proposal(proposal: Option<StatProposal>) -> (Stats, AllocationSource) {
    let Some(p) = proposal else {
        return (random_split(LEVEL_UP_POINTS), AllocationSource::Random);
    };
    let values = p.to_array();
    if values.iter().any(|v| *v < 0) {
        debug!("Oracle proposal has negative values: {:?}", p);
        return (random_split(LEVEL_UP_POINTS), AllocationSource::Random);
    }
    let total: i128 = values.iter().map(|v| i128::from(*v)).sum();
    if total == 0 {
        return (random_split(LEVEL_UP_POINTS), AllocationSource::Random);
    }
    if total == i128::from(LEVEL_UP_POINTS) {
        let exact = values.map(|v| v as u32);
        return (Stats::from_array(exact), AllocationSource::Oracle);
    }
    (rescale(values, LEVEL_UP_POINTS), AllocationSource::Rescaled)
}

/// Proportional rescale of non-negative `values` with a positive total.
/// Shares are floored, then the residual is added to or taken from the stats
/// in priority order until the sum is exactly `points`.
fn rescale(values: [i64; 4], points: u32) -> Stats {
    let total: i128 = values.iter().map(|v| i128::from(*v)).sum();
    let mut scaled = values.map(|v| (i128::from(v) * i128::from(points) / total) as i64);

    let mut diff = i64::from(points) - scaled.iter().sum::<i64>();
    if diff > 0 {
        scaled[0] += diff;
    }
    let mut slot = 0;
    while diff < 0 && slot < scaled.len() {
        let take = scaled[slot].min(-diff);
        scaled[slot] -= take;
        diff += take;
        slot += 1;
    }
    Stats::from_array(scaled.map(|v| v.max(0) as u32))
}

/// Uniformly random split of `points` across four stats.
///
/// Places three dividers among `points + 3` slots (stars and bars), so every
/// composition is equally likely.
pub fn random_split(points: u32) -> Stats {
    let slots = points as usize + 3;
    let mut bars = index::sample(&mut rand::thread_rng(), slots, 3).into_vec();
    bars.sort_unstable();
    let parts = [
        bars[0],
        bars[1] - bars[0] - 1,
        bars[2] - bars[1] - 1,
        slots - 1 - bars[2],
    ];
    Stats::from_array(parts.map(|p| p as u32))
}

/// Pull the first `{...}` object out of free-form oracle text (which may be
/// wrapped in markdown fences) and parse it as a proposal.
pub fn extract_proposal(text: &str) -> Result<StatProposal, OracleError> {
    let start = text
        .find('{')
        .ok_or_else(|| OracleError::Malformed("no JSON object in reply".into()))?;
    let end = text[start..]
        .find('}')
        .map(|i| start + i)
        .ok_or_else(|| OracleError::Malformed("unterminated JSON object".into()))?;
    serde_json::from_str(&text[start..=end]).map_err(|e| OracleError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal(s: i64, v: i64, a: i64, i: i64) -> StatProposal {
        StatProposal {
            strength: s,
            vitality: v,
            agility: a,
            intelligence: i,
        }
    }

    struct FixedOracle(Result<StatProposal, ()>);

    #[async_trait]
    impl StatOracle for FixedOracle {
        async fn propose(&self, _: &[String], _: u32, _: u32) -> Result<StatProposal, OracleError> {
            self.0.map_err(|_| OracleError::Http("connection refused".into()))
        }
    }

    struct SlowOracle;

    #[async_trait]
    impl StatOracle for SlowOracle {
        async fn propose(&self, _: &[String], _: u32, _: u32) -> Result<StatProposal, OracleError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(proposal(4, 0, 0, 0))
        }
    }

    #[test]
    fn exact_proposal_is_used() {
        let (gain, source) = resolve_proposal(Some(proposal(1, 1, 0, 2)));
        assert_eq!(source, AllocationSource::Oracle);
        assert_eq!(gain, Stats::from_array([1, 1, 0, 2]));
    }

    #[test]
    fn oversized_proposal_is_rescaled() {
        // 2,2,2,2 -> 1,1,1,1
        let (gain, source) = resolve_proposal(Some(proposal(2, 2, 2, 2)));
        assert_eq!(source, AllocationSource::Rescaled);
        assert_eq!(gain, Stats::uniform(1));

        // 3,3,3,0 -> floors 1,1,1,0; residual 1 goes to strength
        let (gain, _) = resolve_proposal(Some(proposal(3, 3, 3, 0)));
        assert_eq!(gain, Stats::from_array([2, 1, 1, 0]));
    }

    #[test]
    fn undersized_proposal_is_scaled_up() {
        let (gain, source) = resolve_proposal(Some(proposal(0, 1, 0, 1)));
        assert_eq!(source, AllocationSource::Rescaled);
        assert_eq!(gain, Stats::from_array([0, 2, 0, 2]));
    }

    #[test]
    fn negative_or_empty_proposals_fall_back_to_random() {
        for p in [proposal(5, -1, 0, 0), proposal(0, 0, 0, 0)] {
            let (gain, source) = resolve_proposal(Some(p));
            assert_eq!(source, AllocationSource::Random);
            assert_eq!(gain.total(), LEVEL_UP_POINTS);
        }
        let (gain, source) = resolve_proposal(None);
        assert_eq!(source, AllocationSource::Random);
        assert_eq!(gain.total(), LEVEL_UP_POINTS);
    }

    #[test]
    fn any_proposal_sums_to_budget() {
        let samples = [-3i64, 0, 1, 2, 3, 4, 7, 13, 1_000_000, i64::MAX / 8];
        for s in samples {
            for v in samples {
                for a in [0i64, 1, 9] {
                    for i in [0i64, 2, -1] {
                        let (gain, _) = resolve_proposal(Some(proposal(s, v, a, i)));
                        assert_eq!(gain.total(), LEVEL_UP_POINTS, "{s} {v} {a} {i}");
                    }
                }
            }
        }
    }

    #[test]
    fn random_split_is_valid_and_varies() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            let split = random_split(LEVEL_UP_POINTS);
            assert_eq!(split.total(), LEVEL_UP_POINTS);
            seen.insert(split.to_array());
        }
        // 35 compositions of 4 into 4 parts; 500 draws should see most of them
        assert!(seen.len() > 20);
    }

    #[test]
    fn extracts_json_from_fenced_reply() {
        let text = "```json\n{\"str\": 2, \"vit\": 1, \"agi\": 0, \"int\": 1}\n```";
        assert_eq!(extract_proposal(text).unwrap(), proposal(2, 1, 0, 1));
        assert!(matches!(
            extract_proposal("I cannot help with that"),
            Err(OracleError::Malformed(_))
        ));
        assert!(extract_proposal("{\"str\": \"lots\"}").is_err());
    }

    #[tokio::test]
    async fn failing_oracle_uses_fallback() {
        let allocator = StatAllocator::new(Box::new(FixedOracle(Err(()))), Duration::from_secs(1));
        let reward = allocator.allocate(&["Run".into()], 2).await;
        assert_eq!(reward.level, 2);
        assert_eq!(reward.source, AllocationSource::Random);
        assert_eq!(reward.gain.total(), LEVEL_UP_POINTS);
    }

    #[tokio::test]
    async fn slow_oracle_times_out() {
        let allocator = StatAllocator::new(Box::new(SlowOracle), Duration::from_millis(50));
        let reward = allocator.allocate(&[], 3).await;
        assert_eq!(reward.source, AllocationSource::Random);
        assert_eq!(reward.gain.total(), LEVEL_UP_POINTS);
    }

    #[test]
    fn good_oracle_answer_is_applied() {
        let allocator = StatAllocator::new(
            Box::new(FixedOracle(Ok(proposal(0, 0, 1, 3)))),
            Duration::from_secs(1),
        );
        let reward = tokio_test::block_on(allocator.allocate(&["Study".into()], 5));
        assert_eq!(reward.source, AllocationSource::Oracle);
        assert_eq!(reward.gain, Stats::from_array([0, 0, 1, 3]));
    }
}

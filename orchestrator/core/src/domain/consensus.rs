// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Weighted Quorum Consensus (value objects)
//!
//! Proposal state, vote weighting and the resolution rule. The stateful engine
//! that accepts votes and waits on outcomes is `conclave_swarm::ConsensusEngine`.
//!
//! ## Resolution
//! | Step | Rule |
//! |------|------|
//! | override | a non-abstaining vote from the override voter decides immediately |
//! | no signal | `effective = total - abstain <= 0` → `Expired` |
//! | accept | `approval / effective >= threshold` → `Accepted` |
//! | reject | `rejection / effective >= threshold` → `Rejected` |
//! | otherwise | configured [`TieBreaker`] |
//!
//! Vote weight is `base × multiplier`, where `base` comes from the voter
//! weight table (1.0 when unset or when `weight_by_table` is off) and the
//! multiplier applies when the voter's domain matches the configured affinity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::agent::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub Uuid);

impl ProposalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProposalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Approve,
    Reject,
    Abstain,
}

/// A ballot as submitted by a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub voter: AgentId,
    pub choice: VoteChoice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Vote {
    pub fn approve(voter: impl Into<AgentId>) -> Self {
        Self::new(voter, VoteChoice::Approve)
    }

    pub fn reject(voter: impl Into<AgentId>) -> Self {
        Self::new(voter, VoteChoice::Reject)
    }

    pub fn abstain(voter: impl Into<AgentId>) -> Self {
        Self::new(voter, VoteChoice::Abstain)
    }

    pub fn new(voter: impl Into<AgentId>, choice: VoteChoice) -> Self {
        Self {
            voter: voter.into(),
            choice,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// A ballot after weight resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedVote {
    pub voter: AgentId,
    pub choice: VoteChoice,
    pub weight: f64,
    pub domain: Option<String>,
    pub affinity_match: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl ProposalStatus {
    pub fn is_terminal(self) -> bool {
        self != Self::Pending
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Strategy for the undecided band between the two thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TieBreaker {
    /// The single heaviest voter decides; an abstaining one means rejection
    #[default]
    HighestWeight,
    /// Majority among voters whose domain matches the affinity tag
    AffinityMatch,
    /// Coin flip. Last resort only; not deterministic unless seeded.
    Random,
}

/// How a proposal reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPath {
    Override,
    Threshold,
    TieBreak(TieBreaker),
    NoDecisiveSignal,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Votes required before standard resolution runs
    #[serde(default = "default_quorum_size")]
    pub quorum_size: usize,

    #[serde(default = "default_approval_threshold")]
    pub approval_threshold: f64,

    #[serde(default)]
    pub tie_breaker: TieBreaker,

    /// Domain tag that earns the affinity multiplier
    #[serde(default)]
    pub affinity: Option<String>,

    #[serde(default = "default_affinity_multiplier")]
    pub affinity_multiplier: f64,

    /// When false every voter starts from base weight 1.0
    #[serde(default = "default_true")]
    pub weight_by_table: bool,

    #[serde(default)]
    pub voter_weights: HashMap<AgentId, f64>,

    #[serde(default)]
    pub override_enabled: bool,

    #[serde(default)]
    pub override_voter: Option<AgentId>,

    #[serde(default = "default_vote_timeout_ms")]
    pub vote_timeout_ms: u64,

    /// Seed for the `Random` tie-breaker
    #[serde(default)]
    pub random_seed: Option<u64>,
}

fn default_quorum_size() -> usize {
    5
}

fn default_approval_threshold() -> f64 {
    0.6
}

fn default_affinity_multiplier() -> f64 {
    1.25
}

fn default_true() -> bool {
    true
}

fn default_vote_timeout_ms() -> u64 {
    30_000
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            quorum_size: default_quorum_size(),
            approval_threshold: default_approval_threshold(),
            tie_breaker: TieBreaker::default(),
            affinity: None,
            affinity_multiplier: default_affinity_multiplier(),
            weight_by_table: true,
            voter_weights: HashMap::new(),
            override_enabled: false,
            override_voter: None,
            vote_timeout_ms: default_vote_timeout_ms(),
            random_seed: None,
        }
    }
}

impl ConsensusConfig {
    pub fn vote_timeout(&self) -> Duration {
        Duration::from_millis(self.vote_timeout_ms)
    }

    /// Override voter, when the override authority is switched on.
    pub fn override_authority(&self) -> Option<&AgentId> {
        if self.override_enabled {
            self.override_voter.as_ref()
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.quorum_size == 0 {
            return Err("quorum_size must be at least 1".to_string());
        }
        if !(self.approval_threshold > 0.0 && self.approval_threshold <= 1.0) {
            return Err(format!(
                "approval_threshold must be in (0.0, 1.0], got {}",
                self.approval_threshold
            ));
        }
        if self.affinity_multiplier <= 0.0 {
            return Err(format!(
                "affinity_multiplier must be positive, got {}",
                self.affinity_multiplier
            ));
        }
        if let Some((voter, weight)) = self.voter_weights.iter().find(|(_, w)| **w < 0.0) {
            return Err(format!("weight for voter {} must not be negative, got {}", voter, weight));
        }
        if self.override_enabled && self.override_voter.is_none() {
            return Err("override_enabled requires override_voter".to_string());
        }
        Ok(())
    }

    /// Resolve the weight of a ballot from `voter` with the given domain tag.
    pub fn weigh(&self, voter: &AgentId, domain: Option<&str>) -> (f64, bool) {
        let base = if self.weight_by_table {
            self.voter_weights.get(voter).copied().unwrap_or(1.0)
        } else {
            1.0
        };
        let affinity_match = match (self.affinity.as_deref(), domain) {
            (Some(affinity), Some(domain)) => affinity == domain,
            _ => false,
        };
        let weight = if affinity_match {
            base * self.affinity_multiplier
        } else {
            base
        };
        (weight, affinity_match)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Tally {
    pub total_weight: f64,
    pub approval_weight: f64,
    pub rejection_weight: f64,
    pub abstain_weight: f64,
}

impl Tally {
    pub fn of(votes: &[WeightedVote]) -> Self {
        votes.iter().fold(Self::default(), |mut t, v| {
            t.total_weight += v.weight;
            match v.choice {
                VoteChoice::Approve => t.approval_weight += v.weight,
                VoteChoice::Reject => t.rejection_weight += v.weight,
                VoteChoice::Abstain => t.abstain_weight += v.weight,
            }
            t
        })
    }

    pub fn effective_total(&self) -> f64 {
        self.total_weight - self.abstain_weight
    }

    /// Approval share of non-abstaining weight; 0.0 with no decisive weight.
    pub fn approval_ratio(&self) -> f64 {
        let effective = self.effective_total();
        if effective <= 0.0 {
            0.0
        } else {
            self.approval_weight / effective
        }
    }
}

/// Apply the standard weighted rule to a closed ballot set. `coin` is only
/// consulted by the `Random` tie-breaker.
pub fn resolve_votes(
    votes: &[WeightedVote],
    config: &ConsensusConfig,
    coin: impl FnOnce() -> bool,
) -> (ProposalStatus, ResolutionPath) {
    let tally = Tally::of(votes);
    let effective = tally.effective_total();
    if effective <= 0.0 {
        return (ProposalStatus::Expired, ResolutionPath::NoDecisiveSignal);
    }

    if tally.approval_weight / effective >= config.approval_threshold {
        return (ProposalStatus::Accepted, ResolutionPath::Threshold);
    }
    if tally.rejection_weight / effective >= config.approval_threshold {
        return (ProposalStatus::Rejected, ResolutionPath::Threshold);
    }

    let approved = match config.tie_breaker {
        TieBreaker::HighestWeight => votes
            .iter()
            .fold(None::<&WeightedVote>, |best, v| match best {
                Some(b) if b.weight >= v.weight => Some(b),
                _ => Some(v),
            })
            .is_some_and(|v| v.choice == VoteChoice::Approve),
        TieBreaker::AffinityMatch => {
            let matching: Vec<_> = votes
                .iter()
                .filter(|v| v.affinity_match && v.choice != VoteChoice::Abstain)
                .collect();
            let approvals = matching.iter().filter(|v| v.choice == VoteChoice::Approve).count();
            approvals * 2 > matching.len()
        }
        TieBreaker::Random => coin(),
    };

    let status = if approved {
        ProposalStatus::Accepted
    } else {
        ProposalStatus::Rejected
    };
    (status, ResolutionPath::TieBreak(config.tie_breaker))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub value: serde_json::Value,
    pub status: ProposalStatus,
    /// One entry per voter; re-votes replace in place
    pub votes: Vec<WeightedVote>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<ResolutionPath>,
}

impl Proposal {
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            id: ProposalId::new(),
            value,
            status: ProposalStatus::Pending,
            votes: Vec::new(),
            created_at: Utc::now(),
            resolved_at: None,
            resolution: None,
        }
    }

    /// Insert or replace the voter's ballot.
    pub fn record_vote(&mut self, vote: WeightedVote) {
        match self.votes.iter_mut().find(|v| v.voter == vote.voter) {
            Some(existing) => *existing = vote,
            None => self.votes.push(vote),
        }
    }

    pub fn close(&mut self, status: ProposalStatus, path: ResolutionPath) {
        self.status = status;
        self.resolution = Some(path);
        self.resolved_at = Some(Utc::now());
    }

    pub fn tally(&self) -> Tally {
        Tally::of(&self.votes)
    }
}

/// Outcome handed back by `await_consensus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub proposal_id: ProposalId,
    pub status: ProposalStatus,
    pub approved: bool,
    pub approval_ratio: f64,
    /// Votes cast / known voters
    pub participation_ratio: f64,
    pub tally: Tally,
    pub votes: Vec<WeightedVote>,
    pub resolution: Option<ResolutionPath>,
    pub value: serde_json::Value,
    pub duration_ms: u64,
}

impl ConsensusResult {
    pub fn override_used(&self) -> bool {
        self.resolution == Some(ResolutionPath::Override)
    }

    pub fn is_expired(&self) -> bool {
        self.status == ProposalStatus::Expired
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConsensusError {
    #[error("Proposal {0} not found")]
    ProposalNotFound(ProposalId),

    #[error("Proposal {id} is already {status}")]
    ProposalClosed { id: ProposalId, status: ProposalStatus },

    #[error("Invalid consensus configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ballot(voter: &str, choice: VoteChoice, weight: f64) -> WeightedVote {
        WeightedVote {
            voter: AgentId::from(voter),
            choice,
            weight,
            domain: None,
            affinity_match: false,
            reason: None,
            cast_at: Utc::now(),
        }
    }

    fn never() -> bool {
        panic!("coin must not be flipped")
    }

    #[test]
    fn test_three_of_five_meets_threshold() {
        let config = ConsensusConfig::default();
        let votes = vec![
            ballot("a", VoteChoice::Approve, 1.0),
            ballot("b", VoteChoice::Approve, 1.0),
            ballot("c", VoteChoice::Approve, 1.0),
            ballot("d", VoteChoice::Reject, 1.0),
            ballot("e", VoteChoice::Reject, 1.0),
        ];
        assert_eq!(
            resolve_votes(&votes, &config, never),
            (ProposalStatus::Accepted, ResolutionPath::Threshold)
        );
        assert_eq!(Tally::of(&votes).approval_ratio(), 0.6);
    }

    #[test]
    fn test_two_of_five_is_rejected() {
        let config = ConsensusConfig::default();
        let votes = vec![
            ballot("a", VoteChoice::Approve, 1.0),
            ballot("b", VoteChoice::Approve, 1.0),
            ballot("c", VoteChoice::Reject, 1.0),
            ballot("d", VoteChoice::Reject, 1.0),
            ballot("e", VoteChoice::Reject, 1.0),
        ];
        assert_eq!(resolve_votes(&votes, &config, never).0, ProposalStatus::Rejected);
    }

    #[test]
    fn test_all_abstain_expires() {
        let config = ConsensusConfig::default();
        let votes = vec![ballot("a", VoteChoice::Abstain, 1.0), ballot("b", VoteChoice::Abstain, 2.0)];
        assert_eq!(
            resolve_votes(&votes, &config, never),
            (ProposalStatus::Expired, ResolutionPath::NoDecisiveSignal)
        );
    }

    #[test]
    fn test_highest_weight_breaks_tie() {
        let config = ConsensusConfig::default();
        // 1.0 approve vs 1.2 reject → ratio ≈ 0.45, inside the undecided band
        let votes = vec![
            ballot("light", VoteChoice::Approve, 1.0),
            ballot("heavy", VoteChoice::Reject, 1.2),
        ];
        assert_eq!(
            resolve_votes(&votes, &config, never),
            (
                ProposalStatus::Rejected,
                ResolutionPath::TieBreak(TieBreaker::HighestWeight)
            )
        );
    }

    #[test]
    fn test_heaviest_abstainer_rejects_on_tie() {
        let config = ConsensusConfig::default();
        // 1.2 approve vs 1.0 reject → ratio ≈ 0.55; the abstainer outweighs both
        let votes = vec![
            ballot("approver", VoteChoice::Approve, 1.2),
            ballot("skeptic", VoteChoice::Reject, 1.0),
            ballot("observer", VoteChoice::Abstain, 3.0),
        ];
        assert_eq!(
            resolve_votes(&votes, &config, never),
            (
                ProposalStatus::Rejected,
                ResolutionPath::TieBreak(TieBreaker::HighestWeight)
            )
        );
    }

    #[test]
    fn test_affinity_match_breaks_tie() {
        let config = ConsensusConfig {
            tie_breaker: TieBreaker::AffinityMatch,
            affinity: Some("security".to_string()),
            ..Default::default()
        };
        let mut votes = vec![
            ballot("a", VoteChoice::Approve, 1.0),
            ballot("b", VoteChoice::Reject, 1.0),
        ];
        votes[0].affinity_match = true;
        assert_eq!(resolve_votes(&votes, &config, never).0, ProposalStatus::Accepted);

        votes[0].affinity_match = false;
        assert_eq!(resolve_votes(&votes, &config, never).0, ProposalStatus::Rejected);
    }

    #[test]
    fn test_random_tie_break_uses_coin() {
        let config = ConsensusConfig {
            tie_breaker: TieBreaker::Random,
            ..Default::default()
        };
        let votes = vec![ballot("a", VoteChoice::Approve, 1.0), ballot("b", VoteChoice::Reject, 1.0)];
        assert_eq!(resolve_votes(&votes, &config, || true).0, ProposalStatus::Accepted);
        assert_eq!(resolve_votes(&votes, &config, || false).0, ProposalStatus::Rejected);
    }

    #[test]
    fn test_weigh_applies_table_and_affinity() {
        let mut config = ConsensusConfig {
            affinity: Some("security".to_string()),
            ..Default::default()
        };
        config.voter_weights.insert(AgentId::from("senior"), 2.0);

        assert_eq!(config.weigh(&AgentId::from("senior"), Some("security")), (2.5, true));
        assert_eq!(config.weigh(&AgentId::from("senior"), Some("frontend")), (2.0, false));
        assert_eq!(config.weigh(&AgentId::from("junior"), None), (1.0, false));

        config.weight_by_table = false;
        assert_eq!(config.weigh(&AgentId::from("senior"), Some("security")), (1.25, true));
    }

    #[test]
    fn test_revote_replaces_prior_ballot() {
        let mut proposal = Proposal::new(serde_json::json!({"plan": "ship"}));
        proposal.record_vote(ballot("a", VoteChoice::Reject, 1.0));
        proposal.record_vote(ballot("a", VoteChoice::Approve, 1.0));
        assert_eq!(proposal.votes.len(), 1);
        assert_eq!(proposal.votes[0].choice, VoteChoice::Approve);
    }

    #[test]
    fn test_config_validation() {
        assert!(ConsensusConfig::default().validate().is_ok());

        let bad = ConsensusConfig {
            quorum_size: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = ConsensusConfig {
            approval_threshold: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = ConsensusConfig {
            override_enabled: true,
            ..Default::default()
        };
        assert!(bad.validate().unwrap_err().contains("override_voter"));
    }
}

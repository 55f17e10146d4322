// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Consensus Engine
//!
//! Holds in-flight proposals and applies [`resolve_votes`] once a proposal
//! collects `quorum_size` ballots. The override voter, when enabled, is
//! checked on every vote before the quorum rule.
//!
//! Waiting is event-driven: each proposal owns a `watch` channel carrying its
//! status, and [`ConsensusEngine::await_consensus`] waits on it until the
//! proposal closes or its deadline (`created + vote_timeout`) passes, at which
//! point the proposal is force-expired.

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use conclave_core::domain::agent::AgentId;
use conclave_core::domain::consensus::{
    resolve_votes, ConsensusConfig, ConsensusError, ConsensusResult, Proposal, ProposalId, ProposalStatus,
    ResolutionPath, Vote, VoteChoice, WeightedVote,
};
use conclave_core::domain::events::ConsensusEvent;
use conclave_core::infrastructure::event_bus::EventBus;

struct ProposalEntry {
    proposal: Proposal,
    started: Instant,
    resolved_in: Option<Duration>,
    status_tx: watch::Sender<ProposalStatus>,
}

pub struct ConsensusEngine {
    config: ConsensusConfig,
    /// Registered voters and their domain tags
    voters: RwLock<HashMap<AgentId, Option<String>>>,
    proposals: RwLock<HashMap<ProposalId, ProposalEntry>>,
    event_bus: Option<EventBus>,
    rng: Mutex<StdRng>,
}

impl fmt::Debug for ConsensusEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsensusEngine")
            .field("config", &self.config)
            .field("voters", &self.voters.read().len())
            .field("proposals", &self.proposals.read().len())
            .field("event_bus", &self.event_bus.is_some())
            .finish_non_exhaustive()
    }
}

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig) -> Result<Self, ConsensusError> {
        config.validate().map_err(ConsensusError::InvalidConfig)?;
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            config,
            voters: RwLock::new(HashMap::new()),
            proposals: RwLock::new(HashMap::new()),
            event_bus: None,
            rng: Mutex::new(rng),
        })
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Register (or re-tag) a voter. The domain tag drives the affinity bonus.
    pub fn register_voter(&self, voter: impl Into<AgentId>, domain: Option<String>) {
        self.voters.write().insert(voter.into(), domain);
    }

    pub fn remove_voter(&self, voter: &AgentId) -> bool {
        self.voters.write().remove(voter).is_some()
    }

    pub fn voters(&self) -> Vec<AgentId> {
        let mut voters: Vec<_> = self.voters.read().keys().cloned().collect();
        voters.sort();
        voters
    }

    pub fn propose(&self, value: serde_json::Value) -> ProposalId {
        let proposal = Proposal::new(value.clone());
        let id = proposal.id;
        let (status_tx, _) = watch::channel(ProposalStatus::Pending);

        self.proposals.write().insert(
            id,
            ProposalEntry {
                proposal,
                started: Instant::now(),
                resolved_in: None,
                status_tx,
            },
        );

        info!(proposal_id = %id, quorum = self.config.quorum_size, "Proposal created");
        self.publish(ConsensusEvent::ProposalCreated {
            proposal_id: id,
            value,
            proposed_at: chrono::Utc::now(),
        });
        id
    }

    /// Record a ballot. Re-votes replace the voter's earlier ballot. Returns
    /// the proposal status after the vote was applied.
    pub fn vote(&self, proposal_id: &ProposalId, vote: Vote) -> Result<ProposalStatus, ConsensusError> {
        let domain = self.voters.read().get(&vote.voter).cloned().flatten();
        let (weight, affinity_match) = self.config.weigh(&vote.voter, domain.as_deref());
        let ballot = WeightedVote {
            voter: vote.voter.clone(),
            choice: vote.choice,
            weight,
            domain,
            affinity_match,
            reason: vote.reason,
            cast_at: chrono::Utc::now(),
        };

        let mut events = vec![ConsensusEvent::VoteCast {
            proposal_id: *proposal_id,
            voter: ballot.voter.clone(),
            choice: ballot.choice,
            weight,
            cast_at: ballot.cast_at,
        }];

        let status = {
            let mut proposals = self.proposals.write();
            let entry = proposals
                .get_mut(proposal_id)
                .ok_or(ConsensusError::ProposalNotFound(*proposal_id))?;

            if entry.proposal.status.is_terminal() {
                return Err(ConsensusError::ProposalClosed {
                    id: *proposal_id,
                    status: entry.proposal.status,
                });
            }

            let overriding = ballot.choice != VoteChoice::Abstain
                && self.config.override_authority() == Some(&ballot.voter);
            let override_choice = ballot.choice;

            debug!(proposal_id = %proposal_id, voter = %ballot.voter, weight, "Vote recorded");
            entry.proposal.record_vote(ballot);

            let outcome = if overriding {
                let status = if override_choice == VoteChoice::Approve {
                    ProposalStatus::Accepted
                } else {
                    ProposalStatus::Rejected
                };
                Some((status, ResolutionPath::Override))
            } else if entry.proposal.votes.len() >= self.config.quorum_size {
                let rng = &self.rng;
                Some(resolve_votes(&entry.proposal.votes, &self.config, || {
                    rng.lock().random_bool(0.5)
                }))
            } else {
                None
            };

            if let Some((status, path)) = outcome {
                Self::close_entry(entry, status, path);
                events.push(Self::closing_event(&entry.proposal));
            }
            entry.proposal.status
        };

        for event in events {
            self.publish(event);
        }
        Ok(status)
    }

    pub fn get_proposal(&self, proposal_id: &ProposalId) -> Option<Proposal> {
        self.proposals.read().get(proposal_id).map(|e| e.proposal.clone())
    }

    pub fn pending_count(&self) -> usize {
        self.proposals
            .read()
            .values()
            .filter(|e| e.proposal.status == ProposalStatus::Pending)
            .count()
    }

    /// Wait until the proposal closes or its deadline passes; a proposal
    /// still pending at the deadline is resolved to `Expired`.
    pub async fn await_consensus(&self, proposal_id: &ProposalId) -> Result<ConsensusResult, ConsensusError> {
        let (mut status_rx, deadline) = {
            let proposals = self.proposals.read();
            let entry = proposals
                .get(proposal_id)
                .ok_or(ConsensusError::ProposalNotFound(*proposal_id))?;
            (
                entry.status_tx.subscribe(),
                entry.started + self.config.vote_timeout(),
            )
        };

        let closed = tokio::time::timeout_at(deadline, async {
            status_rx.wait_for(|s| s.is_terminal()).await.map(|_| ())
        })
        .await;

        if !matches!(closed, Ok(Ok(()))) {
            self.expire(proposal_id)?;
        }
        self.result(proposal_id)
    }

    /// Force a pending proposal to `Expired`. Closed proposals are left as they are.
    pub fn expire(&self, proposal_id: &ProposalId) -> Result<ProposalStatus, ConsensusError> {
        let event = {
            let mut proposals = self.proposals.write();
            let entry = proposals
                .get_mut(proposal_id)
                .ok_or(ConsensusError::ProposalNotFound(*proposal_id))?;
            if entry.proposal.status.is_terminal() {
                return Ok(entry.proposal.status);
            }
            Self::close_entry(entry, ProposalStatus::Expired, ResolutionPath::Timeout);
            Self::closing_event(&entry.proposal)
        };
        self.publish(event);
        Ok(ProposalStatus::Expired)
    }

    /// Snapshot the outcome of a proposal, pending or not.
    pub fn result(&self, proposal_id: &ProposalId) -> Result<ConsensusResult, ConsensusError> {
        let proposals = self.proposals.read();
        let entry = proposals
            .get(proposal_id)
            .ok_or(ConsensusError::ProposalNotFound(*proposal_id))?;
        let proposal = &entry.proposal;

        // Known voters: registered ∪ anyone who actually cast a ballot
        let known_voters = {
            let voters = self.voters.read();
            let unregistered = proposal
                .votes
                .iter()
                .filter(|v| !voters.contains_key(&v.voter))
                .count();
            voters.len() + unregistered
        };
        let participation_ratio = if known_voters == 0 {
            0.0
        } else {
            proposal.votes.len() as f64 / known_voters as f64
        };

        let tally = proposal.tally();
        let elapsed = entry.resolved_in.unwrap_or_else(|| entry.started.elapsed());

        Ok(ConsensusResult {
            proposal_id: proposal.id,
            status: proposal.status,
            approved: proposal.status == ProposalStatus::Accepted,
            approval_ratio: tally.approval_ratio(),
            participation_ratio,
            tally,
            votes: proposal.votes.clone(),
            resolution: proposal.resolution,
            value: proposal.value.clone(),
            duration_ms: elapsed.as_millis() as u64,
        })
    }

    fn close_entry(entry: &mut ProposalEntry, status: ProposalStatus, path: ResolutionPath) {
        entry.proposal.close(status, path);
        entry.resolved_in = Some(entry.started.elapsed());
        entry.status_tx.send_replace(status);
        info!(
            proposal_id = %entry.proposal.id,
            status = %status,
            resolution = ?path,
            votes = entry.proposal.votes.len(),
            "Proposal resolved"
        );
        metrics::counter!("conclave_proposals_resolved_total", "status" => status.to_string()).increment(1);
    }

    fn closing_event(proposal: &Proposal) -> ConsensusEvent {
        let resolution = proposal.resolution.unwrap_or(ResolutionPath::Timeout);
        let at = proposal.resolved_at.unwrap_or_else(chrono::Utc::now);
        if proposal.status == ProposalStatus::Expired {
            ConsensusEvent::ConsensusExpired {
                proposal_id: proposal.id,
                votes_cast: proposal.votes.len(),
                resolution,
                expired_at: at,
            }
        } else {
            ConsensusEvent::ConsensusAchieved {
                proposal_id: proposal.id,
                status: proposal.status,
                approval_ratio: proposal.tally().approval_ratio(),
                resolution,
                resolved_at: at,
            }
        }
    }

    fn publish(&self, event: ConsensusEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish_consensus_event(event);
        }
    }
}

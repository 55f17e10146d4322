// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Coordinator
//!
//! Owns the agent registry, the connection graph and the metrics tracker, and
//! is the only writer to any of them. All three live behind a single
//! `parking_lot::RwLock` that is never held across an `.await`; executions
//! run outside the lock and re-acquire it only to record their outcome.
//!
//! ## Failure model
//!
//! | Situation | Surface |
//! |-----------|---------|
//! | duplicate agent id, dependency cycle, unknown dependency | `Err(SwarmError)` |
//! | missing agent, executor error, executor panic | failed `TaskResult` |
//! | no eligible agent | `unassigned` in `Distribution` / `BatchOutcome` |
//! | event store failure | logged at `warn`, otherwise ignored |

use futures::future::join_all;
use futures::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use conclave_core::domain::agent::{Agent, AgentConfig, AgentId};
use conclave_core::domain::consensus::ConsensusConfig;
use conclave_core::domain::event_store::{EventRecord, EventRecordType, EventStore};
use conclave_core::domain::events::{AgentLifecycleEvent, AgentMessage, TaskEvent, TopologyEvent};
use conclave_core::domain::metrics::{AgentHealth, AgentMetrics, HealthThresholds, MetricsTracker};
use conclave_core::domain::runtime::{ExecutionError, TaskExecutor};
use conclave_core::domain::swarm::{SwarmError, SwarmState};
use conclave_core::domain::swarm_config::{ExecutionConfig, SwarmConfigManifest};
use conclave_core::domain::task::{dependency_tiers, resolve_execution_order, Task, TaskId, TaskResult};
use conclave_core::domain::topology::{
    current_leader, hierarchy_of, ConnectionGraph, MeshConnection, SwarmHierarchy, SwarmTopology,
};
use conclave_core::infrastructure::event_bus::{AgentEventReceiver, EventBus, EventReceiver};

use crate::application::consensus::ConsensusEngine;
use crate::domain::distribution::{
    plan_distribution, BatchOutcome, Distribution, DistributionPlan, ScaleOutcome, ScaleRequest,
};

const DEPENDENCY_NOT_COMPLETED: &str = "dependency did not complete";

struct Registry {
    /// Registration order; "oldest first" and tie-breaks follow this order
    agents: Vec<Agent>,
    graph: ConnectionGraph,
    metrics: MetricsTracker,
    cancellation: HashMap<AgentId, CancellationToken>,
}

impl Registry {
    fn agent_mut(&mut self, agent_id: &AgentId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| &a.id == agent_id)
    }

    fn contains(&self, agent_id: &AgentId) -> bool {
        self.agents.iter().any(|a| &a.id == agent_id)
    }
}

pub struct SwarmCoordinator {
    registry: RwLock<Registry>,
    executor: Arc<dyn TaskExecutor>,
    event_bus: EventBus,
    event_store: Option<Arc<dyn EventStore>>,
    execution: ExecutionConfig,
    consensus_defaults: ConsensusConfig,
}

impl SwarmCoordinator {
    pub fn new(topology: SwarmTopology, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            registry: RwLock::new(Registry {
                agents: Vec::new(),
                graph: ConnectionGraph::new(topology),
                metrics: MetricsTracker::default(),
                cancellation: HashMap::new(),
            }),
            executor,
            event_bus: EventBus::with_default_capacity(),
            event_store: None,
            execution: ExecutionConfig::default(),
            consensus_defaults: ConsensusConfig::default(),
        }
    }

    /// Build a coordinator from a loaded manifest.
    pub fn from_manifest(manifest: &SwarmConfigManifest, executor: Arc<dyn TaskExecutor>) -> Self {
        let spec = &manifest.spec;
        Self::new(spec.topology, executor)
            .with_event_bus(EventBus::new(spec.event_bus.capacity))
            .with_health_thresholds(spec.health.clone())
            .with_execution_config(spec.execution.clone())
            .with_consensus_defaults(spec.consensus.clone())
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_event_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.event_store = Some(store);
        self
    }

    pub fn with_health_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.registry.get_mut().metrics = MetricsTracker::new(thresholds);
        self
    }

    pub fn with_execution_config(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_consensus_defaults(mut self, config: ConsensusConfig) -> Self {
        self.consensus_defaults = config;
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    pub fn subscribe_agent(&self, agent_id: AgentId) -> AgentEventReceiver {
        self.event_bus.subscribe_agent(agent_id)
    }

    // ---------------------------------------------------------------------
    // Agent registry
    // ---------------------------------------------------------------------

    pub async fn spawn_agent(&self, config: AgentConfig) -> Result<Agent, SwarmError> {
        let agent = Agent::from_config(config);
        let active = {
            let mut registry = self.registry.write();
            if registry.contains(&agent.id) {
                return Err(SwarmError::DuplicateAgent(agent.id));
            }
            registry.agents.push(agent.clone());
            registry.metrics.register(agent.id.clone());
            registry.cancellation.insert(agent.id.clone(), CancellationToken::new());

            let Registry { agents, graph, .. } = &mut *registry;
            graph.on_spawn(&agent, agents.as_slice());
            agents.len()
        };

        info!(
            agent_id = %agent.id,
            agent_type = %agent.agent_type,
            role = ?agent.role,
            "Agent spawned"
        );
        metrics::counter!("conclave_agents_spawned_total").increment(1);
        metrics::gauge!("conclave_agents_active").set(active as f64);

        self.event_bus.publish_agent_event(AgentLifecycleEvent::AgentSpawned {
            agent_id: agent.id.clone(),
            agent_type: agent.agent_type.clone(),
            role: agent.role,
            spawned_at: agent.created_at,
        });
        self.record(
            EventRecord::new(
                format!("agent-spawn-{}", agent.id),
                agent.id.clone(),
                format!("Spawned {} agent", agent.agent_type),
                EventRecordType::Event,
            )
            .with_metadata("capabilities", serde_json::json!(agent.capabilities)),
        )
        .await;

        Ok(agent)
    }

    /// Remove an agent, its metrics and every connection touching it.
    /// Unknown ids are a no-op and return `false`.
    pub async fn terminate_agent(&self, agent_id: &AgentId) -> bool {
        let (agent, token, active) = {
            let mut registry = self.registry.write();
            let Some(index) = registry.agents.iter().position(|a| &a.id == agent_id) else {
                debug!(agent_id = %agent_id, "Terminate requested for unknown agent");
                return false;
            };

            let mut agent = registry.agents.remove(index);
            agent.terminate();
            registry.metrics.remove(agent_id);
            let token = registry.cancellation.remove(agent_id);

            let Registry { agents, graph, .. } = &mut *registry;
            graph.on_terminate(agent_id);
            let leaves_orphans =
                agent.is_leader() || agents.iter().any(|a| a.parent.as_ref() == Some(agent_id));
            if leaves_orphans && graph.topology() == SwarmTopology::Hierarchical {
                // Orphaned workers report to their next registered parent or the leader
                graph.rebuild(SwarmTopology::Hierarchical, agents.as_slice());
            }
            (agent, token, agents.len())
        };

        if self.execution.cancel_in_flight_on_terminate {
            if let Some(token) = token {
                token.cancel();
            }
        }

        info!(agent_id = %agent_id, in_flight = agent.in_flight, "Agent terminated");
        metrics::counter!("conclave_agents_terminated_total").increment(1);
        metrics::gauge!("conclave_agents_active").set(active as f64);

        self.event_bus.publish_agent_event(AgentLifecycleEvent::AgentTerminated {
            agent_id: agent_id.clone(),
            terminated_at: agent.updated_at,
        });
        self.record(EventRecord::new(
            format!("agent-terminate-{}", agent_id),
            agent_id.clone(),
            format!("Terminated {} agent", agent.agent_type),
            EventRecordType::Event,
        ))
        .await;

        true
    }

    pub fn list_agents(&self) -> Vec<Agent> {
        self.registry.read().agents.clone()
    }

    pub fn get_agent(&self, agent_id: &AgentId) -> Option<Agent> {
        self.registry.read().agents.iter().find(|a| &a.id == agent_id).cloned()
    }

    // ---------------------------------------------------------------------
    // Distribution & execution
    // ---------------------------------------------------------------------

    pub fn distribute_tasks(&self, tasks: &[Task]) -> Distribution {
        let plan = {
            let registry = self.registry.read();
            plan_distribution(tasks, &registry.agents)
        };
        self.announce(&plan);
        plan.into_distribution()
    }

    /// Run one task on one agent. Never fails: a missing agent, an executor
    /// error and an executor panic all come back as failed results.
    pub async fn execute_task(&self, agent_id: &AgentId, task: &Task) -> TaskResult {
        let claimed = {
            let mut registry = self.registry.write();
            let token = registry.cancellation.get(agent_id).cloned();
            match registry.agent_mut(agent_id) {
                Some(agent) => agent.begin_task().then(|| (agent.clone(), token)),
                None => None,
            }
        };
        let Some((agent, token)) = claimed else {
            warn!(agent_id = %agent_id, task_id = %task.id, "Task targeted an unknown agent");
            return TaskResult::failed(
                task.id.clone(),
                agent_id.clone(),
                format!("Agent {} not found", agent_id),
                0,
            );
        };

        debug!(agent_id = %agent_id, task_id = %task.id, task_type = %task.task_type, "Executing task");
        let started = Instant::now();
        let run = AssertUnwindSafe(self.executor.execute(&agent, task)).catch_unwind();
        let outcome = match token.filter(|_| self.execution.cancel_in_flight_on_terminate) {
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(ExecutionError::Cancelled),
                caught = run => flatten_panic(caught),
            },
            None => flatten_panic(run.await),
        };
        let elapsed = started.elapsed();
        let duration_ms = elapsed.as_millis() as u64;

        let health_change = {
            let mut registry = self.registry.write();
            if let Some(agent) = registry.agent_mut(agent_id) {
                agent.finish_task();
            }
            registry.metrics.record(agent_id, outcome.is_ok(), elapsed)
        };

        metrics::histogram!("conclave_task_duration_seconds").record(elapsed.as_secs_f64());
        let result = match outcome {
            Ok(output) => {
                debug!(agent_id = %agent_id, task_id = %task.id, duration_ms, "Task completed");
                metrics::counter!("conclave_tasks_completed_total").increment(1);
                self.event_bus.publish_task_event(TaskEvent::TaskCompleted {
                    task_id: task.id.clone(),
                    agent_id: agent_id.clone(),
                    duration_ms,
                    completed_at: chrono::Utc::now(),
                });
                TaskResult::completed(task.id.clone(), agent_id.clone(), output, duration_ms)
            }
            Err(e) => {
                warn!(agent_id = %agent_id, task_id = %task.id, error = %e, "Task failed");
                metrics::counter!("conclave_tasks_failed_total").increment(1);
                self.event_bus.publish_task_event(TaskEvent::TaskFailed {
                    task_id: task.id.clone(),
                    agent_id: agent_id.clone(),
                    error: e.to_string(),
                    failed_at: chrono::Utc::now(),
                });
                TaskResult::failed(task.id.clone(), agent_id.clone(), e.to_string(), duration_ms)
            }
        };

        if let Some(change) = health_change {
            if change.to == AgentHealth::Healthy {
                info!(agent_id = %agent_id, from = ?change.from, to = ?change.to, "Agent health changed");
            } else {
                warn!(agent_id = %agent_id, from = ?change.from, to = ?change.to, "Agent health changed");
            }
            self.event_bus.publish_agent_event(AgentLifecycleEvent::AgentHealthChanged {
                agent_id: agent_id.clone(),
                from: change.from,
                to: change.to,
                changed_at: chrono::Utc::now(),
            });
        }

        let (content, record_type) = if result.is_completed() {
            (format!("Task {} completed", task.id), EventRecordType::TaskComplete)
        } else {
            (
                format!("Task {} failed: {}", task.id, result.error.as_deref().unwrap_or("unknown error")),
                EventRecordType::Event,
            )
        };
        self.record(
            EventRecord::new(format!("task-result-{}", task.id), agent_id.clone(), content, record_type)
                .with_metadata("task_type", serde_json::json!(task.task_type))
                .with_metadata("duration_ms", serde_json::json!(duration_ms)),
        )
        .await;

        result
    }

    /// Distribute, then run every assignment at once and wait for all of them.
    /// One task failing never cancels its siblings.
    pub async fn execute_tasks_concurrently(&self, tasks: &[Task]) -> BatchOutcome {
        let plan = {
            let registry = self.registry.read();
            plan_distribution(tasks, &registry.agents)
        };
        self.announce(&plan);

        let limiter = self
            .execution
            .max_concurrency
            .map(|permits| Semaphore::new(permits.max(1)));
        let limiter = limiter.as_ref();
        let runs = plan.assigned.iter().map(|(task, assignment)| async move {
            let _permit = match limiter {
                Some(semaphore) => semaphore.acquire().await.ok(),
                None => None,
            };
            self.execute_task(&assignment.agent_id, task).await
        });
        let results = join_all(runs).await;

        BatchOutcome {
            results,
            unassigned: plan.unassigned,
        }
    }

    /// Run a batch tier by tier so no task starts before its dependencies
    /// finish. Dependents of anything that failed or went unassigned are
    /// reported as failed without running.
    pub async fn execute_in_dependency_tiers(&self, tasks: &[Task]) -> Result<BatchOutcome, SwarmError> {
        let tiers = dependency_tiers(tasks)?;
        info!(tasks = tasks.len(), tiers = tiers.len(), "Executing dependency tiers");

        let mut completed: HashSet<TaskId> = HashSet::new();
        let mut outcome = BatchOutcome::default();

        for tier in tiers {
            let (runnable, blocked): (Vec<Task>, Vec<Task>) = tier
                .into_iter()
                .partition(|t| t.dependencies.iter().all(|d| completed.contains(d)));

            for task in blocked {
                debug!(task_id = %task.id, "Skipping task with incomplete dependency");
                outcome.results.push(TaskResult::skipped(task.id, DEPENDENCY_NOT_COMPLETED));
            }

            let batch = self.execute_tasks_concurrently(&runnable).await;
            completed.extend(
                batch
                    .results
                    .iter()
                    .filter(|r| r.is_completed())
                    .map(|r| r.task_id.clone()),
            );
            outcome.results.extend(batch.results);
            outcome.unassigned.extend(batch.unassigned);
        }

        Ok(outcome)
    }

    pub fn resolve_task_dependencies(&self, tasks: &[Task]) -> Result<Vec<Task>, SwarmError> {
        Ok(resolve_execution_order(tasks)?)
    }

    fn announce(&self, plan: &DistributionPlan) {
        for (_, assignment) in &plan.assigned {
            self.event_bus.publish_task_event(TaskEvent::TaskDistributed {
                task_id: assignment.task_id.clone(),
                agent_id: assignment.agent_id.clone(),
                priority: assignment.priority,
                assigned_at: assignment.assigned_at,
            });
        }
        for task in &plan.unassigned {
            warn!(task_id = %task.id, task_type = %task.task_type, "No eligible agent for task");
            metrics::counter!("conclave_tasks_unassigned_total").increment(1);
            self.event_bus.publish_task_event(TaskEvent::TaskUnassigned {
                task_id: task.id.clone(),
                task_type: task.task_type.clone(),
                skipped_at: chrono::Utc::now(),
            });
        }
        debug!(
            assigned = plan.assigned.len(),
            unassigned = plan.unassigned.len(),
            "Tasks distributed"
        );
    }

    // ---------------------------------------------------------------------
    // Topology
    // ---------------------------------------------------------------------

    /// Spawn `count` agents of a type with default capabilities, or for a
    /// negative count terminate that many of the type, oldest first.
    pub async fn scale_agents(&self, request: ScaleRequest) -> Result<ScaleOutcome, SwarmError> {
        let mut outcome = ScaleOutcome::default();

        if request.count > 0 {
            for _ in 0..request.count {
                let agent = self.spawn_agent(AgentConfig::new(request.agent_type.clone())).await?;
                outcome.spawned.push(agent.id);
            }
        } else if request.count < 0 {
            let victims: Vec<AgentId> = {
                let registry = self.registry.read();
                registry
                    .agents
                    .iter()
                    .filter(|a| a.agent_type == request.agent_type)
                    .take(request.count.unsigned_abs() as usize)
                    .map(|a| a.id.clone())
                    .collect()
            };
            for id in victims {
                if self.terminate_agent(&id).await {
                    outcome.terminated.push(id);
                }
            }
        }

        info!(
            agent_type = %request.agent_type,
            requested = request.count,
            spawned = outcome.spawned.len(),
            terminated = outcome.terminated.len(),
            "Swarm scaled"
        );
        self.event_bus.publish_topology_event(TopologyEvent::SwarmScaled {
            agent_type: request.agent_type,
            requested: request.count,
            spawned: outcome.spawned.clone(),
            terminated: outcome.terminated.clone(),
            scaled_at: chrono::Utc::now(),
        });

        Ok(outcome)
    }

    /// Switch topology mode and rebuild every connection from scratch.
    pub fn reconfigure(&self, topology: SwarmTopology) {
        let (from, connection_count) = {
            let mut registry = self.registry.write();
            let Registry { agents, graph, .. } = &mut *registry;
            let from = graph.topology();
            graph.rebuild(topology, agents.as_slice());
            (from, graph.len())
        };

        info!(%from, to = %topology, connections = connection_count, "Topology reconfigured");
        self.event_bus.publish_topology_event(TopologyEvent::TopologyReconfigured {
            from,
            to: topology,
            connection_count,
            reconfigured_at: chrono::Utc::now(),
        });
    }

    pub fn get_topology(&self) -> SwarmTopology {
        self.registry.read().graph.topology()
    }

    pub fn get_hierarchy(&self) -> SwarmHierarchy {
        hierarchy_of(&self.registry.read().agents)
    }

    pub fn get_mesh_connections(&self) -> Vec<MeshConnection> {
        self.registry.read().graph.connections().to_vec()
    }

    // ---------------------------------------------------------------------
    // Observability
    // ---------------------------------------------------------------------

    pub fn get_agent_metrics(&self, agent_id: &AgentId) -> Option<AgentMetrics> {
        self.registry.read().metrics.get(agent_id).cloned()
    }

    pub fn get_swarm_state(&self) -> SwarmState {
        let registry = self.registry.read();
        SwarmState {
            topology: registry.graph.topology(),
            leader: current_leader(&registry.agents).map(|a| a.id.clone()),
            agents: registry.agents.clone(),
            connections: registry.graph.connections().to_vec(),
            metrics: registry
                .agents
                .iter()
                .filter_map(|a| registry.metrics.get(&a.id).cloned())
                .collect(),
        }
    }

    // ---------------------------------------------------------------------
    // Messaging, consensus, shutdown
    // ---------------------------------------------------------------------

    /// Publish `agent.message`. `to = None` broadcasts to every subscriber.
    pub fn send_message(
        &self,
        from: &AgentId,
        to: Option<&AgentId>,
        payload: serde_json::Value,
    ) -> Result<(), SwarmError> {
        {
            let registry = self.registry.read();
            if !registry.contains(from) {
                return Err(SwarmError::AgentNotFound(from.clone()));
            }
            if let Some(to) = to.filter(|to| !registry.contains(to)) {
                return Err(SwarmError::AgentNotFound(to.clone()));
            }
        }

        debug!(from = %from, to = ?to, "Agent message");
        self.event_bus.publish_message(AgentMessage {
            from: from.clone(),
            to: to.cloned(),
            payload,
            sent_at: chrono::Utc::now(),
        });
        Ok(())
    }

    /// Build a consensus engine whose voters are the given agents, tagged
    /// with their domain (explicit `domain`, else agent type).
    pub fn convene(
        &self,
        participants: &[AgentId],
        config: Option<ConsensusConfig>,
    ) -> Result<ConsensusEngine, SwarmError> {
        let voters: Vec<(AgentId, String)> = {
            let registry = self.registry.read();
            participants
                .iter()
                .map(|id| {
                    registry
                        .agents
                        .iter()
                        .find(|a| &a.id == id)
                        .map(|a| (a.id.clone(), a.domain_tag().to_string()))
                        .ok_or_else(|| SwarmError::AgentNotFound(id.clone()))
                })
                .collect::<Result<Vec<_>, SwarmError>>()?
        };

        let engine = ConsensusEngine::new(config.unwrap_or_else(|| self.consensus_defaults.clone()))?
            .with_event_bus(self.event_bus.clone());
        for (id, domain) in voters {
            engine.register_voter(id, Some(domain));
        }
        info!(voters = participants.len(), "Consensus convened");
        Ok(engine)
    }

    /// Terminate every agent and clear connections and metrics.
    pub async fn shutdown(&self) {
        let ids: Vec<AgentId> = self.registry.read().agents.iter().map(|a| a.id.clone()).collect();
        info!(agents = ids.len(), "Shutting down swarm");
        for id in &ids {
            self.terminate_agent(id).await;
        }

        let mut registry = self.registry.write();
        registry.graph.clear();
        registry.metrics.clear();
        registry.cancellation.clear();
    }

    async fn record(&self, record: EventRecord) {
        if let Some(store) = &self.event_store {
            let id = record.id.clone();
            if let Err(e) = store.store(record).await {
                warn!(record_id = %id, error = %e, "Failed to write event record");
            }
        }
    }
}

fn flatten_panic(
    caught: Result<Result<serde_json::Value, ExecutionError>, Box<dyn Any + Send>>,
) -> Result<serde_json::Value, ExecutionError> {
    caught.unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "executor panicked".to_string());
        Err(ExecutionError::Panicked(message))
    })
}

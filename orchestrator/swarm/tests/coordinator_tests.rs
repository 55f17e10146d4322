// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the swarm coordinator.
//!
//! Covers the agent registry, topology maintenance, least-loaded distribution,
//! concurrent and tiered execution, metrics bookkeeping, event emission and
//! the event-store sink. Executors are scripted through the task payload:
//! `sleep_ms`, `fail` and `panic`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use conclave_core::domain::agent::{Agent, AgentConfig, AgentId, AgentStatus};
use conclave_core::domain::event_store::EventRecordType;
use conclave_core::domain::events::{AgentLifecycleEvent, TaskEvent};
use conclave_core::domain::metrics::AgentHealth;
use conclave_core::domain::runtime::{ExecutionError, TaskExecutor};
use conclave_core::domain::swarm::SwarmError;
use conclave_core::domain::swarm_config::{ExecutionConfig, SwarmConfigManifest};
use conclave_core::domain::task::{Task, TaskGraphError, TaskId, TaskPriority, TaskStatus};
use conclave_core::domain::topology::{ConnectionType, SwarmTopology};
use conclave_core::infrastructure::event_bus::{DomainEvent, EventBusError};
use conclave_core::infrastructure::event_store::InMemoryEventStore;
use conclave_swarm::{ScaleRequest, SwarmCoordinator, SwarmService};

#[derive(Default)]
struct ScriptedExecutor {
    started: Mutex<Vec<TaskId>>,
}

impl ScriptedExecutor {
    fn started(&self) -> Vec<TaskId> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn execute(&self, agent: &Agent, task: &Task) -> Result<Value, ExecutionError> {
        self.started.lock().unwrap().push(task.id.clone());

        if let Some(ms) = task.payload.get("sleep_ms").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if task.payload.get("panic").and_then(Value::as_bool) == Some(true) {
            panic!("executor blew up");
        }
        if task.payload.get("fail").and_then(Value::as_bool) == Some(true) {
            return Err(ExecutionError::Failed("scripted failure".to_string()));
        }
        Ok(json!({ "agent": agent.id, "task": task.id }))
    }
}

fn coordinator(topology: SwarmTopology) -> (SwarmCoordinator, Arc<ScriptedExecutor>) {
    let executor = Arc::new(ScriptedExecutor::default());
    (SwarmCoordinator::new(topology, executor.clone()), executor)
}

fn coder(id: &str) -> AgentConfig {
    AgentConfig::new("coder").with_id(id)
}

fn code_task(id: &str) -> Task {
    Task::new(id, "code")
}

fn drain(receiver: &mut conclave_core::infrastructure::event_bus::EventReceiver) -> Vec<DomainEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(EventBusError::Empty) | Err(EventBusError::Closed) => break,
            Err(EventBusError::Lagged(_)) => continue,
        }
    }
    events
}

// ============================================================================
// Registry
// ============================================================================

#[tokio::test]
async fn test_spawn_rejects_duplicate_id() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);

    let agent = assert_ok!(swarm.spawn_agent(coder("a")).await);
    assert_eq!(agent.status, AgentStatus::Active);
    assert!(agent.can_execute("refactor"));

    let err = assert_err!(swarm.spawn_agent(coder("a")).await);
    assert_eq!(err, SwarmError::DuplicateAgent(AgentId::from("a")));
    assert_eq!(swarm.list_agents().len(), 1);
}

#[tokio::test]
async fn test_terminate_is_idempotent() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    swarm.spawn_agent(coder("a")).await.unwrap();
    swarm.spawn_agent(coder("b")).await.unwrap();

    assert!(swarm.terminate_agent(&AgentId::from("a")).await);
    assert_eq!(swarm.list_agents().len(), 1);

    assert!(!swarm.terminate_agent(&AgentId::from("a")).await);
    assert_eq!(swarm.list_agents().len(), 1);
    assert!(swarm.get_agent_metrics(&AgentId::from("a")).is_none());
    assert!(swarm.get_agent(&AgentId::from("a")).is_none());
}

#[tokio::test]
async fn test_generated_ids_are_unique() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    let a = swarm.spawn_agent(AgentConfig::new("tester")).await.unwrap();
    let b = swarm.spawn_agent(AgentConfig::new("tester")).await.unwrap();
    assert_ne!(a.id, b.id);
}

// ============================================================================
// Topology
// ============================================================================

#[tokio::test]
async fn test_mesh_growth_and_scrub() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    for id in ["a", "b", "c"] {
        swarm.spawn_agent(coder(id)).await.unwrap();
    }

    let connections = swarm.get_mesh_connections();
    assert_eq!(connections.len(), 6);
    assert!(connections.iter().all(|c| c.connection_type == ConnectionType::Peer));

    swarm.terminate_agent(&AgentId::from("c")).await;
    let connections = swarm.get_mesh_connections();
    assert_eq!(connections.len(), 2);
    assert!(connections.iter().all(|c| !c.touches(&AgentId::from("c"))));
}

#[tokio::test]
async fn test_hierarchical_fan_out() {
    let (swarm, _) = coordinator(SwarmTopology::Hierarchical);
    swarm
        .spawn_agent(AgentConfig::new("coordinator").with_id("L").leader())
        .await
        .unwrap();
    swarm.spawn_agent(coder("W1")).await.unwrap();
    swarm.spawn_agent(coder("W2")).await.unwrap();

    let connections = swarm.get_mesh_connections();
    assert_eq!(connections.len(), 2);
    for c in &connections {
        assert_eq!(c.connection_type, ConnectionType::Leader);
        assert_eq!(c.to, AgentId::from("L"));
    }

    let hierarchy = swarm.get_hierarchy();
    assert_eq!(hierarchy.leader, Some(AgentId::from("L")));
    assert_eq!(hierarchy.workers.len(), 2);
    assert!(hierarchy.workers.iter().all(|w| w.parent == Some(AgentId::from("L"))));
}

#[tokio::test]
async fn test_terminating_mid_level_parent_reattaches_children() {
    let (swarm, _) = coordinator(SwarmTopology::Hierarchical);
    swarm
        .spawn_agent(AgentConfig::new("coordinator").with_id("L").leader())
        .await
        .unwrap();
    swarm.spawn_agent(coder("W1")).await.unwrap();
    swarm.spawn_agent(coder("SUB").with_parent("W1")).await.unwrap();

    assert!(swarm.terminate_agent(&AgentId::from("W1")).await);

    let connections = swarm.get_mesh_connections();
    let sub_edges: Vec<_> = connections
        .iter()
        .filter(|c| c.from == AgentId::from("SUB"))
        .collect();
    assert_eq!(sub_edges.len(), 1);
    assert_eq!(sub_edges[0].to, AgentId::from("L"));
    assert_eq!(sub_edges[0].connection_type, ConnectionType::Leader);

    let hierarchy = swarm.get_hierarchy();
    assert_eq!(hierarchy.workers.len(), 1);
    assert_eq!(hierarchy.workers[0].id, AgentId::from("SUB"));
    assert_eq!(hierarchy.workers[0].parent, Some(AgentId::from("L")));
}

#[tokio::test]
async fn test_reconfigure_rebuilds_connections() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    let mut events = swarm.subscribe();
    swarm
        .spawn_agent(AgentConfig::new("coordinator").with_id("L").leader())
        .await
        .unwrap();
    for id in ["a", "b", "c"] {
        swarm.spawn_agent(coder(id)).await.unwrap();
    }
    assert_eq!(swarm.get_mesh_connections().len(), 12);

    swarm.reconfigure(SwarmTopology::Hierarchical);
    assert_eq!(swarm.get_topology(), SwarmTopology::Hierarchical);
    assert_eq!(swarm.get_mesh_connections().len(), 3);

    swarm.reconfigure(SwarmTopology::Mesh);
    assert_eq!(swarm.get_mesh_connections().len(), 12);

    let names: Vec<_> = drain(&mut events).iter().map(DomainEvent::name).collect();
    assert_eq!(names.iter().filter(|n| **n == "topology.reconfigured").count(), 2);
}

#[tokio::test]
async fn test_scale_up_and_down_oldest_first() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    swarm.spawn_agent(coder("keep-reviewer").with_capabilities(["review"])).await.unwrap();

    let up = swarm.scale_agents(ScaleRequest::new("tester", 3)).await.unwrap();
    assert_eq!(up.spawned.len(), 3);
    let testers: Vec<_> = swarm
        .list_agents()
        .into_iter()
        .filter(|a| a.agent_type == "tester")
        .collect();
    assert_eq!(testers.len(), 3);
    assert!(testers.iter().all(|a| a.can_execute("validate")));

    let down = swarm.scale_agents(ScaleRequest::new("tester", -2)).await.unwrap();
    assert_eq!(down.terminated, up.spawned[..2].to_vec());

    let remaining: Vec<_> = swarm.list_agents().into_iter().map(|a| a.id).collect();
    assert_eq!(remaining, vec![AgentId::from("keep-reviewer"), up.spawned[2].clone()]);
}

// ============================================================================
// Distribution
// ============================================================================

#[tokio::test]
async fn test_uniform_pool_load_balance() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    for id in ["a", "b", "c", "d"] {
        swarm.spawn_agent(coder(id)).await.unwrap();
    }

    for batch in [1usize, 3, 4, 7, 13] {
        let tasks: Vec<_> = (0..batch).map(|i| code_task(&format!("t{}", i))).collect();
        let distribution = swarm.distribute_tasks(&tasks);
        assert_eq!(distribution.assignments.len(), batch);

        let mut counts: HashMap<AgentId, usize> = HashMap::new();
        for agent in swarm.list_agents() {
            counts.insert(agent.id, 0);
        }
        for a in &distribution.assignments {
            *counts.get_mut(&a.agent_id).unwrap() += 1;
        }
        let max = *counts.values().max().unwrap();
        let min = *counts.values().min().unwrap();
        assert!(max - min <= 1, "batch {} was unbalanced: {:?}", batch, counts);
    }
}

#[tokio::test]
async fn test_priority_assigned_first() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    swarm.spawn_agent(coder("a")).await.unwrap();
    swarm.spawn_agent(coder("b")).await.unwrap();

    let tasks = vec![
        code_task("low").with_priority(TaskPriority::Low),
        code_task("medium"),
        code_task("high").with_priority(TaskPriority::High),
    ];
    let distribution = swarm.distribute_tasks(&tasks);
    let order: Vec<_> = distribution.assignments.iter().map(|a| a.task_id.as_str()).collect();
    assert_eq!(order, vec!["high", "medium", "low"]);
    assert_eq!(distribution.assignments[0].priority, TaskPriority::High);
}

#[tokio::test]
async fn test_unassignable_tasks_are_reported() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    swarm.spawn_agent(coder("a")).await.unwrap();
    let mut events = swarm.subscribe();

    let tasks = vec![code_task("ok"), Task::new("paint", "illustrate")];
    let distribution = swarm.distribute_tasks(&tasks);
    assert_eq!(distribution.assignments.len(), 1);
    assert_eq!(distribution.unassigned.len(), 1);
    assert_eq!(distribution.unassigned[0].id, TaskId::from("paint"));

    let names: Vec<_> = drain(&mut events).iter().map(DomainEvent::name).collect();
    assert_eq!(names, vec!["task.distributed", "task.unassigned"]);

    let outcome = swarm.execute_tasks_concurrently(&tasks).await;
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.unassigned.len(), 1);
}

// ============================================================================
// Execution
// ============================================================================

#[tokio::test]
async fn test_execute_on_unknown_agent_fails_as_data() {
    let (swarm, executor) = coordinator(SwarmTopology::Mesh);
    let result = swarm.execute_task(&AgentId::from("ghost"), &code_task("t")).await;

    assert_eq!(result.status, TaskStatus::Failed);
    assert!(result.error.unwrap().contains("not found"));
    assert!(executor.started().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_metrics_track_success_rate_and_mean_latency() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    let id = AgentId::from("a");
    swarm.spawn_agent(coder("a")).await.unwrap();

    let script = [(10, false), (20, true), (30, false), (40, false), (50, true)];
    for (i, (ms, fail)) in script.iter().enumerate() {
        let task = code_task(&format!("t{}", i)).with_payload(json!({ "sleep_ms": ms, "fail": fail }));
        swarm.execute_task(&id, &task).await;
    }

    let metrics = swarm.get_agent_metrics(&id).unwrap();
    assert_eq!(metrics.tasks_completed, 3);
    assert_eq!(metrics.tasks_failed, 2);
    assert_eq!(metrics.success_rate, 3.0 / 5.0);
    assert!(
        (metrics.average_execution_time_ms - 30.0).abs() < 2.0,
        "mean was {}",
        metrics.average_execution_time_ms
    );
}

#[tokio::test]
async fn test_batch_isolates_failures_and_panics() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    for id in ["a", "b", "c"] {
        swarm.spawn_agent(coder(id)).await.unwrap();
    }

    let tasks = vec![
        code_task("fine"),
        code_task("broken").with_payload(json!({ "fail": true })),
        code_task("explodes").with_payload(json!({ "panic": true })),
        code_task("also-fine"),
    ];
    let outcome = swarm.execute_tasks_concurrently(&tasks).await;

    assert_eq!(outcome.results.len(), 4);
    assert_eq!(outcome.completed(), 2);
    assert_eq!(outcome.failed(), 2);

    let panicked = outcome
        .results
        .iter()
        .find(|r| r.task_id == TaskId::from("explodes"))
        .unwrap();
    assert!(panicked.error.as_deref().unwrap().contains("executor blew up"));

    // Every agent is idle again
    assert!(swarm.list_agents().iter().all(|a| a.status == AgentStatus::Active));
}

#[tokio::test(start_paused = true)]
async fn test_batch_runs_concurrently() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    for id in ["a", "b", "c", "d"] {
        swarm.spawn_agent(coder(id)).await.unwrap();
    }
    let tasks: Vec<_> = (0..4)
        .map(|i| code_task(&format!("t{}", i)).with_payload(json!({ "sleep_ms": 100 })))
        .collect();

    let started = tokio::time::Instant::now();
    let outcome = swarm.execute_tasks_concurrently(&tasks).await;
    assert_eq!(outcome.completed(), 4);
    assert!(started.elapsed() < Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_max_concurrency_bounds_batch() {
    let executor = Arc::new(ScriptedExecutor::default());
    let swarm = SwarmCoordinator::new(SwarmTopology::Mesh, executor).with_execution_config(ExecutionConfig {
        max_concurrency: Some(1),
        cancel_in_flight_on_terminate: false,
    });
    for id in ["a", "b", "c", "d"] {
        swarm.spawn_agent(coder(id)).await.unwrap();
    }
    let tasks: Vec<_> = (0..4)
        .map(|i| code_task(&format!("t{}", i)).with_payload(json!({ "sleep_ms": 100 })))
        .collect();

    let started = tokio::time::Instant::now();
    let outcome = swarm.execute_tasks_concurrently(&tasks).await;
    assert_eq!(outcome.completed(), 4);
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn test_zero_concurrency_still_makes_progress() {
    let executor = Arc::new(ScriptedExecutor::default());
    let swarm = SwarmCoordinator::new(SwarmTopology::Mesh, executor).with_execution_config(ExecutionConfig {
        max_concurrency: Some(0),
        cancel_in_flight_on_terminate: false,
    });
    swarm.spawn_agent(coder("a")).await.unwrap();
    swarm.spawn_agent(coder("b")).await.unwrap();
    let tasks = vec![code_task("t0"), code_task("t1")];

    let outcome = tokio::time::timeout(Duration::from_secs(5), swarm.execute_tasks_concurrently(&tasks))
        .await
        .expect("batch should not stall on a zero concurrency limit");
    assert_eq!(outcome.completed(), 2);
}

#[tokio::test]
async fn test_dependency_order_and_cycles() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    let tasks = vec![
        code_task("deploy").depends_on("test"),
        code_task("build"),
        code_task("test").depends_on("build"),
    ];
    let order: Vec<_> = swarm
        .resolve_task_dependencies(&tasks)
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(order, vec![TaskId::from("build"), TaskId::from("test"), TaskId::from("deploy")]);

    let cyclic = vec![code_task("x").depends_on("y"), code_task("y").depends_on("x")];
    let err = swarm.resolve_task_dependencies(&cyclic).unwrap_err();
    assert!(matches!(
        err,
        SwarmError::TaskGraph(TaskGraphError::CyclicDependency { .. })
    ));
    assert!(swarm.execute_in_dependency_tiers(&cyclic).await.is_err());
}

#[tokio::test]
async fn test_tiers_skip_dependents_of_failures() {
    let (swarm, executor) = coordinator(SwarmTopology::Mesh);
    swarm.spawn_agent(coder("a")).await.unwrap();
    swarm.spawn_agent(coder("b")).await.unwrap();

    let tasks = vec![
        code_task("build"),
        code_task("lint").with_payload(json!({ "fail": true })),
        code_task("test").depends_on("build"),
        code_task("release").depends_on("test").depends_on("lint"),
    ];
    let outcome = swarm.execute_in_dependency_tiers(&tasks).await.unwrap();

    let by_id: HashMap<_, _> = outcome.results.iter().map(|r| (r.task_id.as_str(), r)).collect();
    assert!(by_id["build"].is_completed());
    assert!(by_id["test"].is_completed());
    assert_eq!(by_id["lint"].status, TaskStatus::Failed);
    assert_eq!(by_id["release"].status, TaskStatus::Failed);
    assert_eq!(by_id["release"].agent_id, None);
    assert!(by_id["release"].error.as_deref().unwrap().contains("dependency"));

    let started = executor.started();
    let build = started.iter().position(|t| t.as_str() == "build").unwrap();
    let test = started.iter().position(|t| t.as_str() == "test").unwrap();
    assert!(build < test);
    assert!(!started.contains(&TaskId::from("release")));
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_work_survives_termination_by_default() {
    let executor = Arc::new(ScriptedExecutor::default());
    let swarm = Arc::new(SwarmCoordinator::new(SwarmTopology::Mesh, executor));
    swarm.spawn_agent(coder("a")).await.unwrap();

    let handle = tokio::spawn({
        let swarm = swarm.clone();
        async move {
            let id = AgentId::from("a");
            let task = code_task("long").with_payload(json!({ "sleep_ms": 1000 }));
            let result = swarm.execute_task(&id, &task).await;
            result
        }
    });
    while swarm.get_agent(&AgentId::from("a")).map(|a| a.status) != Some(AgentStatus::Busy) {
        tokio::task::yield_now().await;
    }

    assert!(swarm.terminate_agent(&AgentId::from("a")).await);
    let result = handle.await.unwrap();
    assert!(result.is_completed());
    assert!(swarm.list_agents().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_work_cancelled_when_enabled() {
    let executor = Arc::new(ScriptedExecutor::default());
    let swarm = Arc::new(
        SwarmCoordinator::new(SwarmTopology::Mesh, executor).with_execution_config(ExecutionConfig {
            max_concurrency: None,
            cancel_in_flight_on_terminate: true,
        }),
    );
    swarm.spawn_agent(coder("a")).await.unwrap();

    let handle = tokio::spawn({
        let swarm = swarm.clone();
        async move {
            let id = AgentId::from("a");
            let task = code_task("long").with_payload(json!({ "sleep_ms": 60_000 }));
            let result = swarm.execute_task(&id, &task).await;
            result
        }
    });
    while swarm.get_agent(&AgentId::from("a")).map(|a| a.status) != Some(AgentStatus::Busy) {
        tokio::task::yield_now().await;
    }

    swarm.terminate_agent(&AgentId::from("a")).await;
    let result = handle.await.unwrap();
    assert_eq!(result.status, TaskStatus::Failed);
    assert!(result.error.unwrap().contains("cancelled"));
}

// ============================================================================
// Events, messaging, store
// ============================================================================

#[tokio::test]
async fn test_lifecycle_and_task_events() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    let mut events = swarm.subscribe();

    swarm.spawn_agent(coder("a")).await.unwrap();
    swarm.execute_task(&AgentId::from("a"), &code_task("t1")).await;
    swarm
        .execute_task(&AgentId::from("a"), &code_task("t2").with_payload(json!({ "fail": true })))
        .await;
    swarm.terminate_agent(&AgentId::from("a")).await;

    let events = drain(&mut events);
    let names: Vec<_> = events.iter().map(DomainEvent::name).collect();
    assert_eq!(
        names,
        vec![
            "agent.spawned",
            "task.completed",
            "task.failed",
            "agent.health_changed",
            "agent.terminated"
        ]
    );

    match &events[0] {
        DomainEvent::AgentLifecycle(AgentLifecycleEvent::AgentSpawned { agent_id, agent_type, .. }) => {
            assert_eq!(agent_id, &AgentId::from("a"));
            assert_eq!(agent_type, "coder");
        }
        other => panic!("unexpected event {:?}", other),
    }
    match &events[2] {
        DomainEvent::Task(TaskEvent::TaskFailed { error, .. }) => assert!(error.contains("scripted failure")),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_health_change_is_published() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    swarm.spawn_agent(coder("a")).await.unwrap();
    let mut agent_events = swarm.subscribe_agent(AgentId::from("a"));

    let failing = code_task("bad").with_payload(json!({ "fail": true }));
    swarm.execute_task(&AgentId::from("a"), &failing).await;

    assert_eq!(agent_events.recv().await.unwrap().name(), "task.failed");
    match agent_events.recv().await.unwrap() {
        DomainEvent::AgentLifecycle(AgentLifecycleEvent::AgentHealthChanged { from, to, .. }) => {
            assert_eq!(from, AgentHealth::Healthy);
            assert_eq!(to, AgentHealth::Unhealthy);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_messages_require_known_agents() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    swarm.spawn_agent(coder("a")).await.unwrap();
    swarm.spawn_agent(coder("b")).await.unwrap();
    let mut inbox = swarm.subscribe_agent(AgentId::from("b"));

    let err = swarm
        .send_message(&AgentId::from("ghost"), None, json!({}))
        .unwrap_err();
    assert_eq!(err, SwarmError::AgentNotFound(AgentId::from("ghost")));

    swarm
        .send_message(&AgentId::from("a"), Some(&AgentId::from("b")), json!({ "hello": "b" }))
        .unwrap();
    match inbox.recv().await.unwrap() {
        DomainEvent::Message(message) => {
            assert_eq!(message.from, AgentId::from("a"));
            assert_eq!(message.payload["hello"], "b");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_event_store_receives_records() {
    let store = Arc::new(InMemoryEventStore::new());
    let swarm = SwarmCoordinator::new(SwarmTopology::Mesh, Arc::new(ScriptedExecutor::default()))
        .with_event_store(store.clone());

    swarm.spawn_agent(coder("a")).await.unwrap();
    swarm.execute_task(&AgentId::from("a"), &code_task("t1")).await;
    swarm
        .execute_task(&AgentId::from("a"), &code_task("t2").with_payload(json!({ "fail": true })))
        .await;
    swarm.terminate_agent(&AgentId::from("a")).await;

    let ids: Vec<_> = store.records().into_iter().map(|r| r.id).collect();
    assert_eq!(
        ids,
        vec!["agent-spawn-a", "task-result-t1", "task-result-t2", "agent-terminate-a"]
    );
    assert_eq!(store.find("task-result-t1").unwrap().record_type, EventRecordType::TaskComplete);
    assert_eq!(store.find("task-result-t2").unwrap().record_type, EventRecordType::Event);
}

#[tokio::test]
async fn test_swarm_state_and_shutdown() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    for id in ["a", "b"] {
        swarm.spawn_agent(coder(id)).await.unwrap();
    }
    let mut events = swarm.subscribe();

    let state = swarm.get_swarm_state();
    assert_eq!(state.agent_count(), 2);
    assert_eq!(state.connection_count(), 2);
    assert_eq!(state.metrics.len(), 2);
    assert_eq!(state.leader, None);

    swarm.shutdown().await;
    let state = swarm.get_swarm_state();
    assert_eq!(state.agent_count(), 0);
    assert_eq!(state.connection_count(), 0);
    assert!(state.metrics.is_empty());

    let terminated = drain(&mut events)
        .iter()
        .filter(|e| e.name() == "agent.terminated")
        .count();
    assert_eq!(terminated, 2);
}

#[tokio::test]
async fn test_service_contract_runs_tiers() {
    let (swarm, _) = coordinator(SwarmTopology::Mesh);
    let service: &dyn SwarmService = &swarm;

    service.spawn_agent(coder("a")).await.unwrap();
    let outcome = service
        .submit_tasks(vec![code_task("one"), code_task("two").depends_on("one")])
        .await
        .unwrap();
    assert_eq!(outcome.completed(), 2);
    assert_eq!(service.state().agent_count(), 1);
}

#[tokio::test]
async fn test_from_manifest_applies_settings() {
    let yaml = r#"
apiVersion: conclave.dev/v1
kind: SwarmConfig
metadata:
  name: from-manifest
spec:
  topology: hierarchical
  consensus:
    quorum_size: 2
"#;
    let manifest = SwarmConfigManifest::from_yaml_str(yaml).unwrap();
    let swarm = SwarmCoordinator::from_manifest(&manifest, Arc::new(ScriptedExecutor::default()));
    assert_eq!(swarm.get_topology(), SwarmTopology::Hierarchical);

    swarm
        .spawn_agent(AgentConfig::new("reviewer").with_id("r1").with_domain("security"))
        .await
        .unwrap();
    swarm.spawn_agent(AgentConfig::new("reviewer").with_id("r2")).await.unwrap();

    let engine = swarm
        .convene(&[AgentId::from("r1"), AgentId::from("r2")], None)
        .unwrap();
    assert_eq!(engine.config().quorum_size, 2);
    assert_eq!(engine.voters(), vec![AgentId::from("r1"), AgentId::from("r2")]);

    let err = assert_err!(swarm.convene(&[AgentId::from("nobody")], None));
    assert_eq!(err, SwarmError::AgentNotFound(AgentId::from("nobody")));
}

//! Property tests for the scheduler over seeded random workloads.
//!
//! Every workload is acyclic by construction: each action only depends on
//! actions ranked lower in a hidden random permutation, so dependencies
//! point both backwards and forwards in program order.

#![cfg(feature = "testing")]

use std::collections::HashMap;

use dml_batcher::{
    ActionId, ActionQueue, BatchConfig, DependencyGraph, EntityMapping, ExecutionPlan, Insert,
    PendingAction, Update, schedule,
};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

const TABLES: [&str; 3] = ["Alpha", "Beta", "Gamma"];
const SEEDS: u64 = 64;

fn mappings() -> Vec<EntityMapping> {
    TABLES
        .iter()
        .map(|table| EntityMapping::new(*table, *table, &["id", "v"], &["id"]).unwrap())
        .collect()
}

fn random_queue(rng: &mut StdRng, mappings: &[EntityMapping], with_updates: bool) -> ActionQueue {
    let n = rng.random_range(1..40usize);
    let mut rank: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = rng.random_range(0..=i);
        rank.swap(i, j);
    }

    let mut queue = ActionQueue::new();
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let mapping = &mappings[rng.random_range(0..mappings.len())];
        let key = i64::try_from(i).unwrap();
        let id = if with_updates && rng.random_range(0..4u32) == 0 {
            queue.enqueue(Update::from(mapping).set("id", key).unwrap().set("v", 0i64).unwrap())
        } else {
            queue.enqueue(Insert::from(mapping).set("id", key).unwrap())
        };
        ids.push(id.unwrap());
    }

    for i in 0..n {
        for _ in 0..rng.random_range(0..3u32) {
            let j = rng.random_range(0..n);
            if rank[j] < rank[i] {
                queue.add_dependency(ids[i], ids[j]).unwrap();
            }
        }
    }
    queue
}

fn program_order(queue: &ActionQueue) -> Vec<ActionId> {
    queue.clone().drain_for_flush().iter().map(PendingAction::id).collect()
}

fn plan(queue: &ActionQueue, config: &BatchConfig) -> (DependencyGraph, ExecutionPlan) {
    let actions = queue.clone().drain_for_flush();
    let graph = DependencyGraph::build(&actions).unwrap();
    let plan = schedule(&graph, actions, config);
    (graph, plan)
}

fn random_config(rng: &mut StdRng) -> BatchConfig {
    BatchConfig::new(rng.random_range(1..6usize)).unwrap()
}

#[test]
fn test_every_edge_is_respected() {
    let mappings = mappings();
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let queue = random_queue(&mut rng, &mappings, true);
        let config = random_config(&mut rng);
        let (graph, plan) = plan(&queue, &config);

        let position: HashMap<ActionId, usize> = plan
            .order()
            .into_iter()
            .enumerate()
            .map(|(pos, id)| (id, pos))
            .collect();
        assert_eq!(position.len(), queue.len(), "seed {seed}: action lost or duplicated");
        for edge in graph.edges() {
            assert!(
                position[&edge.before] < position[&edge.after],
                "seed {seed}: {} scheduled after {}",
                edge.before,
                edge.after
            );
        }
    }
}

#[test]
fn test_groups_are_homogeneous_capped_and_maximal() {
    let mappings = mappings();
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let queue = random_queue(&mut rng, &mappings, true);
        let config = random_config(&mut rng);
        let (_, plan) = plan(&queue, &config);

        for group in plan.groups() {
            assert!(!group.is_empty());
            assert!(group.len() <= config.max_batch_size(), "seed {seed}");
            assert!(group.actions().iter().all(|action| action.sql() == group.sql()));
        }
        for pair in plan.groups().windows(2) {
            if pair[0].sql() == pair[1].sql() {
                assert_eq!(pair[0].len(), config.max_batch_size(), "seed {seed}");
            }
        }
    }
}

#[test]
fn test_scheduling_is_deterministic() {
    let mappings = mappings();
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let queue = random_queue(&mut rng, &mappings, true);
        let config = random_config(&mut rng);
        assert_eq!(plan(&queue, &config).1, plan(&queue, &config).1, "seed {seed}");
    }
}

#[test]
fn test_disabled_ordering_keeps_program_order() {
    let mappings = mappings();
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let queue = random_queue(&mut rng, &mappings, true);
        let config = random_config(&mut rng)
            .with_order_inserts(false)
            .with_order_updates(false);
        let (_, plan) = plan(&queue, &config);
        assert_eq!(plan.order(), program_order(&queue), "seed {seed}");
    }
}

#[test]
fn test_disabled_insert_ordering_keeps_program_order_of_inserts() {
    let mappings = mappings();
    let mut forward = 0;
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let queue = random_queue(&mut rng, &mappings, false);
        let config = random_config(&mut rng).with_order_inserts(false);
        assert!(config.order_updates());
        let (graph, plan) = plan(&queue, &config);

        forward += graph
            .edges()
            .iter()
            .filter(|edge| edge.before > edge.after)
            .count();
        assert_eq!(plan.order(), program_order(&queue), "seed {seed}");
    }
    // The workloads must contain children enqueued before their parents.
    assert!(forward > 0);
}

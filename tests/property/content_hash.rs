//! Property-based tests for content hashing and deduplication

use chrono::{TimeZone, Utc};
use keeper::checkpoint::hasher::{canonical_form, verify_payload};
use keeper::context::{ActiveContext, AgentUpdate, TaskUpdate};
use proptest::prelude::*;

fn build(tasks: &[(String, u8)], agents: &[String]) -> ActiveContext {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut context = ActiveContext::new();
    for (task_id, pct) in tasks {
        context.update_task_progress(task_id, TaskUpdate::new().percentage(*pct), at);
    }
    for agent_id in agents {
        context.update_agent_state(agent_id, AgentUpdate::new().status("idle"), at);
    }
    context
}

/// Insertion order never changes the canonical payload or its hash.
#[test]
fn test_canonical_form_ignores_insertion_order() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                prop::collection::btree_map("[a-z]{1,8}", 0u8..=100, 0..12),
                prop::collection::btree_set("[a-z]{1,8}", 0..6),
            ),
            |(tasks, agents)| {
                let forward: Vec<(String, u8)> = tasks.into_iter().collect();
                let mut backward = forward.clone();
                backward.reverse();
                let agents_fwd: Vec<String> = agents.into_iter().collect();
                let mut agents_back = agents_fwd.clone();
                agents_back.reverse();

                let (payload_a, hash_a) = canonical_form(&build(&forward, &agents_fwd)).unwrap();
                let (payload_b, hash_b) = canonical_form(&build(&backward, &agents_back)).unwrap();
                prop_assert_eq!(&payload_a, &payload_b);
                prop_assert_eq!(hash_a, hash_b);
                prop_assert!(verify_payload(&payload_a, &hash_a));
                Ok(())
            },
        )
        .unwrap();
}

/// Any change to a task percentage changes the hash.
#[test]
fn test_hash_detects_percentage_change() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(0u8..=100, 0u8..=100), |(a, b)| {
            prop_assume!(a != b);
            let (_, hash_a) = canonical_form(&build(&[("t1".to_string(), a)], &[])).unwrap();
            let (_, hash_b) = canonical_form(&build(&[("t1".to_string(), b)], &[])).unwrap();
            prop_assert_ne!(hash_a, hash_b);
            Ok(())
        })
        .unwrap();
}

proptest! {
    /// Payloads always deserialize back to the same context.
    #[test]
    fn canonical_payload_round_trips(tasks in prop::collection::vec(("[a-z0-9_-]{1,12}", 0u8..=255), 0..10)) {
        let context = build(&tasks, &[]);
        let (payload, _) = canonical_form(&context).unwrap();
        prop_assert_eq!(ActiveContext::from_json(&payload).unwrap(), context);
    }
}

//! Property tests for the registry.
//!
//! Random sequences of spawn/despawn/insert/remove operations, checked
//! against a naive model of liveness and component presence.

use loam_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Marker(u32);

/// Operations to replay against the registry.
#[derive(Debug, Clone)]
enum Op {
    Spawn,
    Despawn(usize),
    Insert(usize, u32),
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Spawn),
        (0..64usize).prop_map(Op::Despawn),
        (0..64usize, any::<u32>()).prop_map(|(i, v)| Op::Insert(i, v)),
        (0..64usize).prop_map(Op::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn random_ops_preserve_liveness_invariants(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let mut registry = Registry::new();
        registry.track::<Marker>();

        // Model: every handle ever produced, with expected liveness and value.
        let mut handles: Vec<Entity> = Vec::new();
        let mut live: Vec<bool> = Vec::new();
        let mut value: Vec<Option<u32>> = Vec::new();

        for op in ops {
            match op {
                Op::Spawn => {
                    let e = registry.spawn();
                    handles.push(e);
                    live.push(true);
                    value.push(None);
                }
                Op::Despawn(i) if !handles.is_empty() => {
                    let i = i % handles.len();
                    let was_live = live[i];
                    prop_assert_eq!(registry.despawn(handles[i]), was_live);
                    live[i] = false;
                    value[i] = None;
                }
                Op::Insert(i, v) if !handles.is_empty() => {
                    let i = i % handles.len();
                    let result = registry.insert(handles[i], Marker(v));
                    if live[i] {
                        prop_assert!(result.is_ok());
                        value[i] = Some(v);
                    } else {
                        prop_assert!(result.is_err());
                    }
                }
                Op::Remove(i) if !handles.is_empty() => {
                    let i = i % handles.len();
                    let removed = registry.remove::<Marker>(handles[i]);
                    prop_assert_eq!(removed, value[i].take().map(Marker));
                }
                _ => {}
            }

            // Invariants after every operation.
            for (k, &e) in handles.iter().enumerate() {
                prop_assert_eq!(registry.contains(e), live[k]);
                prop_assert_eq!(registry.get::<Marker>(e).cloned(), value[k].map(Marker));
            }
            prop_assert_eq!(
                registry.entity_count(),
                live.iter().filter(|&&l| l).count()
            );
        }

        // Every recorded removal pairs the entity with the value it held.
        for (e, _marker) in registry.drain_removed::<Marker>() {
            prop_assert!(handles.contains(&e));
        }
    }
}

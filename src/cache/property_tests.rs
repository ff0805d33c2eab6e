//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the L1 bookkeeping, glob translation and the engine
//! round trip over arbitrary inputs.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::cache::{CacheEngine, EngineOptions, GlobPattern, LocalCache};
use crate::store::MemoryStore;

// == Test Configuration ==
const TEST_TTL: u64 = 300;

// == Strategies ==
/// Generates cache keys, including characters that are special in regexes
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9:._+?()\\[\\]-]{1,24}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,64}"
}

#[derive(Debug, Clone)]
enum LocalOp {
    Insert { key: String, value: String },
    Get { key: String },
    Remove { key: String },
}

fn local_op_strategy() -> impl Strategy<Value = LocalOp> {
    // Small key space so operations collide often
    let key = "[a-e]";
    prop_oneof![
        (key, value_strategy()).prop_map(|(key, value)| LocalOp::Insert { key, value }),
        key.prop_map(|key| LocalOp::Get { key }),
        key.prop_map(|key| LocalOp::Remove { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // L1 never holds more entries than its capacity, and evictions account
    // for every new key that did not fit.
    #[test]
    fn prop_capacity_is_never_exceeded(
        capacity in 1usize..8,
        ops in prop::collection::vec(local_op_strategy(), 1..60),
    ) {
        let mut local = LocalCache::new(capacity);

        for op in ops {
            match op {
                LocalOp::Insert { key, value } => {
                    local.insert(key, value, TEST_TTL);
                }
                LocalOp::Get { key } => {
                    local.get(&key);
                }
                LocalOp::Remove { key } => {
                    local.remove(&key);
                }
            }
            prop_assert!(local.len() <= capacity);
        }
    }

    // L1 behaves like a map whose oldest-inserted key is dropped on overflow,
    // regardless of reads in between.
    #[test]
    fn prop_matches_insertion_order_model(
        capacity in 1usize..6,
        ops in prop::collection::vec(local_op_strategy(), 1..60),
    ) {
        let mut local = LocalCache::new(capacity);
        let mut model: Vec<(String, String)> = Vec::new();

        for op in ops {
            match op {
                LocalOp::Insert { key, value } => {
                    let existing = model.iter().position(|(k, _)| *k == key);
                    let expected_eviction = match existing {
                        Some(pos) => {
                            model.remove(pos);
                            None
                        }
                        None if model.len() >= capacity => Some(model.remove(0).0),
                        None => None,
                    };
                    model.push((key.clone(), value.clone()));
                    prop_assert_eq!(local.insert(key, value, TEST_TTL), expected_eviction);
                }
                LocalOp::Get { key } => {
                    let expected = model.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone());
                    prop_assert_eq!(local.get(&key), expected);
                }
                LocalOp::Remove { key } => {
                    let existed = model.iter().any(|(k, _)| *k == key);
                    model.retain(|(k, _)| *k != key);
                    prop_assert_eq!(local.remove(&key), existed);
                }
            }
        }
        prop_assert_eq!(local.len(), model.len());
    }

    // A pattern with no wildcard matches exactly itself.
    #[test]
    fn prop_literal_pattern_matches_only_itself(key in key_strategy(), other in key_strategy()) {
        let pattern = GlobPattern::new(&key).unwrap();
        prop_assert!(pattern.matches(&key));
        prop_assert_eq!(pattern.matches(&other), key == other);
    }

    // `prefix*` covers every key starting with the prefix and nothing else.
    #[test]
    fn prop_prefix_wildcard(prefix in key_strategy(), rest in value_strategy(), other in key_strategy()) {
        let pattern = GlobPattern::new(&format!("{prefix}*")).unwrap();
        let covered = format!("{prefix}{rest}");
        prop_assert!(pattern.matches(&covered));
        prop_assert_eq!(pattern.matches(&other), other.starts_with(&prefix));
    }

    // The KEYS form of a pattern parses back to the same matcher.
    #[test]
    fn prop_store_glob_agrees(prefix in key_strategy(), key in key_strategy()) {
        let pattern = GlobPattern::new(&format!("{prefix}*")).unwrap();
        let reparsed = GlobPattern::from_store_glob(&pattern.to_store_glob()).unwrap();
        prop_assert_eq!(reparsed.as_str(), pattern.as_str());
        prop_assert_eq!(reparsed.matches(&key), pattern.matches(&key));
    }

    // Every value written through the engine reads back unchanged, and a
    // pattern invalidation removes exactly the covered keys from both tiers.
    #[test]
    fn prop_engine_round_trip_and_invalidation(
        entries in prop::collection::hash_map(key_strategy(), value_strategy(), 1..20),
        prefix in "[a-z]{1,2}",
    ) {
        let store = MemoryStore::new();
        let engine = CacheEngine::new(
            Arc::new(store.clone()),
            EngineOptions::new("prop:").l1_capacity(8),
        );

        tokio_test::block_on(async {
            for (key, value) in &entries {
                engine.set(key, value, None).await.unwrap();
            }
            for (key, value) in &entries {
                let cached = engine.get::<String>(key).await;
                prop_assert_eq!(cached.as_ref(), Some(value));
            }

            let report = engine.del_pattern(&format!("{prefix}*")).await;
            let covered: HashSet<&String> =
                entries.keys().filter(|key| key.starts_with(prefix.as_str())).collect();
            prop_assert_eq!(report.l2_removed as usize, covered.len());

            let survivors: HashMap<&String, Option<String>> = {
                let mut seen = HashMap::new();
                for key in entries.keys() {
                    seen.insert(key, engine.get::<String>(key).await);
                }
                seen
            };
            for (key, value) in survivors {
                if covered.contains(key) {
                    prop_assert_eq!(value, None);
                } else {
                    prop_assert_eq!(value.as_ref(), entries.get(key));
                }
            }
            Ok(())
        })?;
    }
}

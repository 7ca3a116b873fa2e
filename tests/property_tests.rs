//! Property-based tests for the invariants listed in the core design
//! notes: vector symbol determinism, event canonicalization, pattern
//! identity, alignment reconstruction, and emotive window bounds.
use std::collections::HashMap;

use proptest::prelude::*;
use tokio::runtime::Runtime;

use kato_core::hashing::vector_symbol;
use kato_core::pattern::InMemoryPatternStore;
use kato_core::prediction::PredictionEngine;
use kato_core::{Config, Event, PatternStore, Stm};

fn symbol_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,3}"
}

fn event_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(symbol_strategy(), 1..4)
}

fn pattern_events_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(event_strategy(), 2..6)
}

proptest! {
    /// Invariant 1: identical vector bytes always produce the identical
    /// content-addressed symbol, regardless of how many times hashed.
    #[test]
    fn vector_symbol_is_deterministic_for_identical_bytes(
        components in prop::collection::vec(any::<f32>(), 1..16)
    ) {
        let a = vector_symbol(&components);
        let b = vector_symbol(&components);
        prop_assert_eq!(a, b);
    }

    /// Invariant 2: canonicalizing an event is idempotent and deterministic
    /// under `sort = true` regardless of the input symbol ordering.
    #[test]
    fn event_canonicalization_is_idempotent_and_order_independent(
        mut symbols in event_strategy()
    ) {
        let once = Event::new(symbols.clone(), true);
        symbols.reverse();
        let reordered = Event::new(symbols, true);
        prop_assert_eq!(&once.symbols, &reordered.symbols);

        let mut twice = once.clone();
        twice.canonicalize();
        prop_assert_eq!(once.symbols, twice.symbols);
    }

    /// Invariant 3: a pattern fetched by its own name always reports that
    /// same name back (content-addressing round-trips).
    #[test]
    fn pattern_name_round_trips_through_the_store(events in pattern_events_strategy()) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let store = InMemoryPatternStore::new();
            let owned_events: Vec<Event> = events
                .into_iter()
                .map(|symbols| Event::new(symbols, true))
                .collect();
            if let Some(name) = store
                .learn(
                    "prop_tenant",
                    owned_events,
                    &HashMap::new(),
                    &HashMap::new(),
                    5,
                    true,
                )
                .await
            {
                let fetched = store.get("prop_tenant", &name).await.unwrap();
                prop_assert_eq!(fetched.name, name);
            }
            Ok(())
        })?;
    }

    /// Invariant 4: emotive rolling windows never exceed `persistence`
    /// after any number of learns of the same canonical events.
    #[test]
    fn emotive_window_never_exceeds_persistence(
        values in prop::collection::vec(any::<f64>().prop_filter("finite", |v| v.is_finite()), 0..20),
        persistence in 1usize..8
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let store = InMemoryPatternStore::new();
            let mut emotives = HashMap::new();
            emotives.insert("joy".to_string(), values);
            let events = vec![
                Event::new(vec!["a".to_string(), "b".to_string()], true),
                Event::new(vec!["c".to_string(), "d".to_string()], true),
            ];
            let name = store
                .learn("prop_tenant", events, &emotives, &HashMap::new(), persistence, true)
                .await
                .unwrap();
            let pattern = store.get("prop_tenant", &name).await.unwrap();
            if let Some(window) = pattern.emotives.get("joy") {
                prop_assert!(window.len() <= persistence);
            }
            Ok(())
        })?;
    }

    /// Invariant 7 (partial): `past + present + future` always reconstructs
    /// the candidate pattern's events exactly, whenever an alignment exists.
    #[test]
    fn alignment_reconstructs_pattern_exactly(
        p_events in pattern_events_strategy(),
        s_events in prop::collection::vec(event_strategy(), 1..5),
    ) {
        let pattern_events: Vec<Event> = p_events
            .into_iter()
            .map(|symbols| Event::new(symbols, true))
            .collect();
        let mut stm = Stm::new();
        for symbols in s_events {
            stm.push(Event::new(symbols, true));
        }

        let pattern = kato_core::Pattern {
            name: "PTRN|proptest".to_string(),
            events: pattern_events.clone(),
            frequency: 3,
            emotives: HashMap::new(),
            metadata: None,
        };
        let config = Config { recall_threshold: 0.0, ..Config::default() };

        if let Some(prediction) = PredictionEngine::build(&pattern, &stm, 0.5, &config) {
            let mut reconstructed = prediction.past.clone();
            reconstructed.extend(prediction.present.clone());
            reconstructed.extend(prediction.future.clone());
            prop_assert_eq!(reconstructed, pattern_events);

            for metric in [
                prediction.similarity,
                prediction.evidence,
                prediction.confidence,
                prediction.potential,
                prediction.snr,
            ] {
                prop_assert!((0.0..=1.0).contains(&metric));
            }
        }
    }
}

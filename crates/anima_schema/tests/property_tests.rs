//! Property-based tests for schema composition.

use proptest::prelude::*;
use std::collections::HashSet;
use uuid::Uuid;

use anima_core::{Anima, Dimension, SensorReadings};
use anima_schema::{BeliefFact, ComposeInputs, IdentityFacts, PrefFact, SchemaHub};

fn facts(awakenings: i64, alive_ratio: f64) -> IdentityFacts {
    IdentityFacts {
        birth_id: Uuid::nil(),
        name: "Lumen".to_string(),
        awakenings,
        alive_ratio,
        age_days: 12.0,
    }
}

proptest! {
    /// Composition is deterministic and node ids are unique, for any
    /// anima, readings subset and identity numbers.
    #[test]
    fn compose_deterministic_unique_ids(
        anima in (0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0),
        awakenings in 1i64..100_000,
        alive_ratio in 0.0f64..=1.0,
        cpu_temp in proptest::option::of(20.0f32..90.0),
        lux in proptest::option::of(0.0f32..5000.0),
        belief_value in -1.0f32..=1.0,
        drift in -0.2f32..=0.2,
    ) {
        let anima = Anima::new(anima.0, anima.1, anima.2, anima.3);
        let identity = facts(awakenings, alive_ratio);
        let readings = SensorReadings {
            cpu_temp_c: cpu_temp,
            world_light_lux: lux,
            ..Default::default()
        };
        let beliefs = vec![BeliefFact {
            id: "warmth_tendency".to_string(),
            value: belief_value,
            confidence: 0.5,
        }];
        let prefs = vec![PrefFact {
            dimension: Dimension::Warmth,
            preferred_value: 0.6,
            confidence: 0.5,
            influence_weight: 1.0,
        }];
        let inputs = ComposeInputs {
            now: 1000,
            identity: &identity,
            anima,
            readings: &readings,
            beliefs: &beliefs,
            preferences: &prefs,
            drift_offsets: [drift, 0.0, 0.0, 0.0],
        };

        let a = SchemaHub::new().compose(&inputs);
        let b = SchemaHub::new().compose(&inputs);
        prop_assert_eq!(&a, &b);

        let ids: HashSet<_> = a.nodes.iter().map(|n| n.id.clone()).collect();
        prop_assert_eq!(ids.len(), a.nodes.len());

        // Every node value normalized.
        for node in &a.nodes {
            prop_assert!(node.value.is_finite());
            prop_assert!((0.0..=1.0).contains(&node.value), "{}: {}", node.id, node.value);
        }
    }
}

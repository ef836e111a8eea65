//! Property-based checks of the facet similarity score.

use facet_bubbles::similarity::{FacetWeighting, SimilarityConfig, recency_weights};
use facet_bubbles::{Entity, SimilarityEngine};
use proptest::prelude::*;
use serde_json::{Value, json};

const FACETS: [&str; 4] = ["tags", "kind", "meta", "year"];

fn tags_strategy() -> impl Strategy<Value = Value> {
    prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d", "e"]), 0..4)
        .prop_map(|tags| json!(tags))
}

fn facet_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        tags_strategy(),
        prop::sample::select(vec!["game", "film", "book"]).prop_map(|kind| json!(kind)),
        (0u8..3, any::<bool>(), prop::option::of(tags_strategy())).prop_map(
            |(size, indie, tags)| json!({ "size": size, "indie": indie, "tags": tags })
        ),
        (1990i32..1995).prop_map(|year| json!(year)),
    ]
}

fn entity_strategy(id: &'static str) -> impl Strategy<Value = Entity> {
    prop::collection::btree_map(
        prop::sample::select(FACETS.to_vec()).prop_map(str::to_owned),
        facet_value_strategy(),
        0..4,
    )
    .prop_map(move |facets| Entity {
        id: id.to_owned(),
        facets,
    })
}

fn active_facets_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(FACETS.to_vec(), 0..=FACETS.len())
        .prop_shuffle()
        .prop_map(|facets| facets.into_iter().map(str::to_owned).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn similarity_is_symmetric_and_bounded(
        left in entity_strategy("left"),
        right in entity_strategy("right"),
        active in active_facets_strategy(),
    ) {
        let engine = SimilarityEngine::default();
        let forward = engine.similarity(&left, &right, &active);
        let backward = engine.similarity(&right, &left, &active);

        prop_assert_eq!(forward, backward);
        prop_assert!((0.0..=1.0).contains(&forward));
    }

    #[test]
    fn weighted_similarity_is_symmetric_and_bounded(
        left in entity_strategy("left"),
        right in entity_strategy("right"),
        active in active_facets_strategy(),
    ) {
        let engine = SimilarityEngine::default();
        let weights = recency_weights(&active);
        let forward = engine.weighted_similarity(&left, &right, &active, &weights);
        let backward = engine.weighted_similarity(&right, &left, &active, &weights);

        prop_assert_eq!(forward, backward);
        prop_assert!((0.0..=1.0).contains(&forward));
    }

    #[test]
    fn self_similarity_is_one(
        entity in entity_strategy("same"),
        active in active_facets_strategy(),
    ) {
        let engine = SimilarityEngine::default();
        prop_assert_eq!(engine.similarity(&entity, &entity, &active), 1.0);
    }

    #[test]
    fn matrix_matches_pairwise_scores(
        a in entity_strategy("a"),
        b in entity_strategy("b"),
        c in entity_strategy("c"),
        active in active_facets_strategy(),
    ) {
        let engine = SimilarityEngine::new(SimilarityConfig {
            weighting: FacetWeighting::Recency,
            ..SimilarityConfig::default()
        });
        let entities = vec![a, b, c];
        let matrix = engine.calculate_matrix(&entities, &active);
        let weights = recency_weights(&active);

        for left in &entities {
            for right in &entities {
                let score = matrix.get(&left.id, &right.id).unwrap();
                prop_assert_eq!(score, matrix.get(&right.id, &left.id).unwrap());
                if left.id == right.id {
                    prop_assert_eq!(score, 1.0);
                } else {
                    let expected = engine.weighted_similarity(left, right, &active, &weights);
                    prop_assert_eq!(score, expected);
                }
            }
        }
    }
}

#[test]
fn jaccard_threshold_example() {
    let a = Entity::new("a").with_facet("tags", json!(["x", "y"]));
    let b = Entity::new("b").with_facet("tags", json!(["x"]));
    let c = Entity::new("c").with_facet("tags", json!(["z"]));
    let active = ["tags".to_owned()];
    let engine = SimilarityEngine::default();

    assert!(engine.similarity(&a, &b, &active) > 0.0);
    assert_eq!(engine.similarity(&a, &c, &active), 0.0);
    assert_eq!(engine.similarity(&b, &c, &active), 0.0);
}

#[test]
fn missing_facets_do_not_dilute_the_score() {
    let a = Entity::new("a")
        .with_facet("kind", json!("game"))
        .with_facet("year", json!(1993));
    let b = Entity::new("b").with_facet("kind", json!("game"));
    let active = ["kind".to_owned(), "year".to_owned()];

    assert_eq!(SimilarityEngine::default().similarity(&a, &b, &active), 1.0);
}

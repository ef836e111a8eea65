use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::entity::{Entity, stringify_value};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetWeighting {
    #[default]
    Uniform,
    /// Later-activated facets weigh more, see [`recency_weights`].
    Recency,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Jaccard index an array pair must exceed to count as a match.
    pub array_threshold: f32,
    /// Fraction of shared sub-fields that must match for an object pair to match.
    pub object_threshold: f32,
    pub weighting: FacetWeighting,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            array_threshold: 0.3,
            object_threshold: 0.5,
            weighting: FacetWeighting::Uniform,
        }
    }
}

/// Linear weights from 0.25 (oldest active facet) to 1.0 (most recent).
pub fn recency_weights(active_facets: &[String]) -> HashMap<String, f32> {
    let count = active_facets.len();
    active_facets
        .iter()
        .enumerate()
        .map(|(index, facet)| {
            let weight = if count <= 1 {
                1.0
            } else {
                0.25 + 0.75 * (index as f32 / (count - 1) as f32)
            };
            (facet.clone(), weight)
        })
        .collect()
}

#[derive(Clone, Debug, Default)]
pub struct SimilarityEngine {
    config: SimilarityConfig,
}

impl SimilarityEngine {
    pub fn new(config: SimilarityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Plain average of per-facet match rates, in `[0, 1]`.
    pub fn similarity(&self, a: &Entity, b: &Entity, active_facets: &[String]) -> f32 {
        if a.id == b.id {
            return 1.0;
        }
        self.aggregate(a, b, active_facets, |_| 1.0)
    }

    /// Weighted average of per-facet match rates; facets missing from `weights` weigh 1.0.
    pub fn weighted_similarity(
        &self,
        a: &Entity,
        b: &Entity,
        active_facets: &[String],
        weights: &HashMap<String, f32>,
    ) -> f32 {
        if a.id == b.id {
            return 1.0;
        }
        self.aggregate(a, b, active_facets, |facet| {
            weights.get(facet).copied().unwrap_or(1.0)
        })
    }

    pub fn calculate_matrix(
        &self,
        entities: &[Entity],
        active_facets: &[String],
    ) -> SimilarityMatrix {
        match self.config.weighting {
            FacetWeighting::Uniform => {
                SimilarityMatrix::build(entities, |a, b| self.similarity(a, b, active_facets))
            }
            FacetWeighting::Recency => {
                let weights = recency_weights(active_facets);
                self.calculate_weighted_matrix(entities, active_facets, &weights)
            }
        }
    }

    pub fn calculate_weighted_matrix(
        &self,
        entities: &[Entity],
        active_facets: &[String],
        weights: &HashMap<String, f32>,
    ) -> SimilarityMatrix {
        SimilarityMatrix::build(entities, |a, b| {
            self.weighted_similarity(a, b, active_facets, weights)
        })
    }

    fn aggregate(
        &self,
        a: &Entity,
        b: &Entity,
        active_facets: &[String],
        weight_of: impl Fn(&str) -> f32,
    ) -> f32 {
        let mut total_weight = 0.0_f32;
        let mut matched_weight = 0.0_f32;

        for facet in active_facets {
            let (Some(left), Some(right)) = (a.facet(facet), b.facet(facet)) else {
                continue;
            };
            let weight = weight_of(facet);
            if !(weight.is_finite() && weight > 0.0) {
                continue;
            }
            let Some(is_match) = self.compare_values(left, right) else {
                continue;
            };

            total_weight += weight;
            if is_match {
                matched_weight += weight;
            }
        }

        if total_weight <= 0.0 {
            return 0.0;
        }
        (matched_weight / total_weight).clamp(0.0, 1.0)
    }

    /// `None` when the pair carries nothing comparable (nulls, shape mismatch, empty data).
    fn compare_values(&self, left: &Value, right: &Value) -> Option<bool> {
        match (left, right) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Array(left), Value::Array(right)) => {
                jaccard(left, right).map(|index| index > self.config.array_threshold)
            }
            (Value::Object(left), Value::Object(right)) => self.compare_objects(left, right),
            (Value::Number(left), Value::Number(right)) => Some(left.as_f64() == right.as_f64()),
            (Value::Array(_) | Value::Object(_), _)
            | (_, Value::Array(_) | Value::Object(_)) => None,
            (left, right) => Some(left == right),
        }
    }

    fn compare_objects(
        &self,
        left: &Map<String, Value>,
        right: &Map<String, Value>,
    ) -> Option<bool> {
        let mut compared = 0usize;
        let mut matched = 0usize;
        for (key, left_value) in left {
            let Some(right_value) = right.get(key) else {
                continue;
            };
            let Some(is_match) = self.compare_values(left_value, right_value) else {
                continue;
            };
            compared += 1;
            if is_match {
                matched += 1;
            }
        }

        if compared == 0 {
            return None;
        }
        Some((matched as f32 / compared as f32) > self.config.object_threshold)
    }
}

fn jaccard(left: &[Value], right: &[Value]) -> Option<f32> {
    let left = left
        .iter()
        .filter(|value| !value.is_null())
        .map(stringify_value)
        .collect::<HashSet<_>>();
    let right = right
        .iter()
        .filter(|value| !value.is_null())
        .map(stringify_value)
        .collect::<HashSet<_>>();

    let union = left.union(&right).count();
    if union == 0 {
        return None;
    }
    let intersection = left.intersection(&right).count();
    Some(intersection as f32 / union as f32)
}

/// Dense symmetric score table over one working set. Rebuilt wholesale, never patched.
#[derive(Clone, Debug, Default)]
pub struct SimilarityMatrix {
    ids: Vec<String>,
    index_by_id: HashMap<String, usize>,
    scores: Vec<f32>,
}

impl SimilarityMatrix {
    fn build(entities: &[Entity], mut score: impl FnMut(&Entity, &Entity) -> f32) -> Self {
        let count = entities.len();
        let mut scores = vec![0.0_f32; count * count];

        for i in 0..count {
            scores[i * count + i] = 1.0;
            for j in (i + 1)..count {
                let value = score(&entities[i], &entities[j]);
                let value = if value.is_finite() {
                    value.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                scores[i * count + j] = value;
                scores[j * count + i] = value;
            }
        }

        let ids = entities
            .iter()
            .map(|entity| entity.id.clone())
            .collect::<Vec<_>>();
        let index_by_id = ids
            .iter()
            .enumerate()
            .map(|(index, id)| (id.clone(), index))
            .collect();

        debug!(entities = count, "rebuilt similarity matrix");

        Self {
            ids,
            index_by_id,
            scores,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f32> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        Some(self.score_at(i, j))
    }

    pub fn score_at(&self, i: usize, j: usize) -> f32 {
        let count = self.ids.len();
        if i >= count || j >= count {
            return 0.0;
        }
        self.scores[i * count + j]
    }

    /// Every unordered pair `(i, j)` with `i < j` whose score is strictly above `threshold`.
    pub fn pairs_above(&self, threshold: f32) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        let count = self.ids.len();
        (0..count).flat_map(move |i| {
            ((i + 1)..count).filter_map(move |j| {
                let score = self.scores[i * count + j];
                (score > threshold).then_some((i, j, score))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn tags(id: &str, values: Value) -> Entity {
        Entity::new(id).with_facet("tags", values)
    }

    fn facets(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    #[test]
    fn jaccard_threshold_decides_array_matches() {
        let engine = SimilarityEngine::default();
        let a = tags("a", json!(["x", "y"]));
        let b = tags("b", json!(["x"]));
        let c = tags("c", json!(["z"]));
        let active = facets(&["tags"]);

        assert!(engine.similarity(&a, &b, &active) > 0.0);
        assert_eq!(engine.similarity(&a, &c, &active), 0.0);
        assert_eq!(engine.similarity(&b, &c, &active), 0.0);
    }

    #[test]
    fn integral_and_float_numbers_compare_equal() {
        let engine = SimilarityEngine::default();
        let a = Entity::new("a").with_facet("year", json!(1993));
        let b = Entity::new("b").with_facet("year", json!(1993.0));
        let c = Entity::new("c").with_facet("year", json!(1993.5));
        let active = facets(&["year"]);

        assert_eq!(engine.similarity(&a, &b, &active), 1.0);
        assert_eq!(engine.similarity(&a, &c, &active), 0.0);
        let x = tags("x", json!([1, 2]));
        let y = tags("y", json!([1.0]));
        assert_eq!(engine.similarity(&x, &y, &facets(&["tags"])), 1.0);
    }

    #[test]
    fn low_overlap_arrays_do_not_match() {
        let engine = SimilarityEngine::default();
        let a = tags("a", json!(["p", "q", "r", "s"]));
        let b = tags("b", json!(["p", "t", "u", "v"]));
        assert_eq!(engine.similarity(&a, &b, &facets(&["tags"])), 0.0);
    }

    #[test]
    fn self_similarity_is_one_even_without_facets() {
        let engine = SimilarityEngine::default();
        let a = Entity::new("lonely");
        assert_eq!(engine.similarity(&a, &a, &facets(&["tags"])), 1.0);
    }

    #[test]
    fn missing_facets_leave_the_denominator() {
        let engine = SimilarityEngine::default();
        let a = tags("a", json!(["x"])).with_facet("era", json!("old"));
        let b = tags("b", json!(["x"]));
        assert_eq!(engine.similarity(&a, &b, &facets(&["tags", "era"])), 1.0);
    }

    #[test]
    fn nothing_comparable_scores_zero() {
        let engine = SimilarityEngine::default();
        let a = tags("a", json!(["x"]));
        let b = Entity::new("b").with_facet("era", json!("new"));
        assert_eq!(engine.similarity(&a, &b, &facets(&["tags", "era"])), 0.0);
        assert_eq!(engine.similarity(&a, &b, &[]), 0.0);
    }

    #[test]
    fn shape_mismatch_is_skipped() {
        let engine = SimilarityEngine::default();
        let a = tags("a", json!(["x"])).with_facet("era", json!("old"));
        let b = tags("b", json!("x")).with_facet("era", json!("old"));
        assert_eq!(engine.similarity(&a, &b, &facets(&["tags", "era"])), 1.0);
    }

    #[test]
    fn nested_objects_need_a_majority_of_fields() {
        let engine = SimilarityEngine::default();
        let a = Entity::new("a").with_facet(
            "meta",
            json!({"kind": "tool", "lang": "rust", "scope": {"level": 1}}),
        );
        let b = Entity::new("b").with_facet(
            "meta",
            json!({"kind": "tool", "lang": "rust", "scope": {"level": 2}}),
        );
        let c = Entity::new("c").with_facet(
            "meta",
            json!({"kind": "tool", "lang": "go", "scope": {"level": 2}}),
        );
        let active = facets(&["meta"]);

        assert_eq!(engine.similarity(&a, &b, &active), 1.0);
        assert_eq!(engine.similarity(&a, &c, &active), 0.0);
    }

    #[test]
    fn primitives_use_exact_equality() {
        let engine = SimilarityEngine::default();
        let a = Entity::new("a").with_facet("year", json!(1999));
        let b = Entity::new("b").with_facet("year", json!(1999));
        let c = Entity::new("c").with_facet("year", json!("1999"));
        let active = facets(&["year"]);
        assert_eq!(engine.similarity(&a, &b, &active), 1.0);
        assert_eq!(engine.similarity(&a, &c, &active), 0.0);
    }

    #[test]
    fn recency_weights_interpolate_linearly() {
        let weights = recency_weights(&facets(&["a", "b", "c"]));
        assert_eq!(weights["a"], 0.25);
        assert!((weights["b"] - 0.625).abs() < 1e-6);
        assert_eq!(weights["c"], 1.0);

        let single = recency_weights(&facets(&["only"]));
        assert_eq!(single["only"], 1.0);
    }

    #[test]
    fn weighted_average_favours_heavier_facets() {
        let engine = SimilarityEngine::default();
        let a = tags("a", json!(["x"])).with_facet("era", json!("old"));
        let b = tags("b", json!(["x"])).with_facet("era", json!("new"));
        let active = facets(&["era", "tags"]);
        let weights = recency_weights(&active);

        let weighted = engine.weighted_similarity(&a, &b, &active, &weights);
        assert!((weighted - 0.8).abs() < 1e-6);
        assert_eq!(engine.similarity(&a, &b, &active), 0.5);
    }

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let engine = SimilarityEngine::new(SimilarityConfig {
            weighting: FacetWeighting::Recency,
            ..SimilarityConfig::default()
        });
        let entities = vec![
            tags("a", json!(["x", "y"])),
            tags("b", json!(["x"])),
            tags("c", json!(["z"])),
        ];
        let matrix = engine.calculate_matrix(&entities, &facets(&["tags"]));

        assert_eq!(matrix.len(), 3);
        for i in 0..3 {
            assert_eq!(matrix.score_at(i, i), 1.0);
            for j in 0..3 {
                assert_eq!(matrix.score_at(i, j), matrix.score_at(j, i));
            }
        }
        assert_eq!(matrix.get("a", "b"), Some(1.0));
        assert_eq!(matrix.get("a", "missing"), None);

        let pairs = matrix.pairs_above(0.3).collect::<Vec<_>>();
        assert_eq!(pairs, vec![(0, 1, 1.0)]);
    }
}

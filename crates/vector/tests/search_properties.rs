//! Property tests for exact top-k search ordering

use async_trait::async_trait;
use proptest::prelude::*;
use skillmatch_common::{Result, SkillMatchError};
use skillmatch_embed::EmbeddingProvider;
use skillmatch_vector::{Item, Price, VectorIndex};

const DIM: usize = 8;

/// Serves pre-generated vectors; each item's title is its position
struct TableProvider {
    vectors: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for TableProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        text.trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| self.vectors.get(i).cloned())
            .ok_or_else(|| SkillMatchError::embedding(format!("unknown text '{}'", text)))
    }

    fn model_id(&self) -> String {
        "table".to_string()
    }
}

fn build(vectors: Vec<Vec<f32>>) -> VectorIndex {
    let items = (0..vectors.len())
        .map(|id| Item {
            id,
            title: id.to_string(),
            offered_by: String::new(),
            domain: String::new(),
            duration: String::new(),
            price: Price::Unknown,
        })
        .collect();
    let provider = TableProvider { vectors };
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(VectorIndex::build(items, &provider, "prop")).unwrap()
}

fn arb_vector() -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, DIM)
}

/// Mostly real vectors with the occasional zero row
fn arb_item_vector() -> impl Strategy<Value = Vec<f32>> {
    prop_oneof![
        9 => arb_vector(),
        1 => Just(vec![0.0f32; DIM]),
    ]
}

/// Query vectors must arrive normalized
fn arb_unit_vector() -> impl Strategy<Value = Vec<f32>> {
    arb_vector().prop_filter_map("non-zero vector", |mut v| {
        skillmatch_vector::l2_normalize(&mut v).then_some(v)
    })
}

/// Every row ranked by (zero row, distance, id)
fn brute_force(index: &VectorIndex, query: &[f32]) -> Vec<(f32, usize)> {
    let mut all: Vec<(f32, usize)> = (0..index.len())
        .map(|id| {
            let row = index.vector(id).unwrap();
            let d: f32 = row
                .iter()
                .zip(query)
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            (d, id)
        })
        .collect();
    all.sort_by(|a, b| {
        index
            .is_zero_row(a.1)
            .cmp(&index.is_zero_row(b.1))
            .then(a.0.total_cmp(&b.0))
            .then(a.1.cmp(&b.1))
    });
    all
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn search_matches_exhaustive_ranking(
        vectors in proptest::collection::vec(arb_item_vector(), 1..30),
        query in arb_unit_vector(),
        k in 0usize..40,
    ) {
        let index = build(vectors);
        let hits = index.search(&query, k).unwrap();
        let expected = brute_force(&index, &query);

        prop_assert_eq!(hits.len(), k.min(index.len()));
        for (hit, (distance, id)) in hits.iter().zip(&expected) {
            prop_assert_eq!(hit.id, *id);
            prop_assert_eq!(hit.distance, *distance);
        }
    }

    #[test]
    fn scores_are_bounded_and_non_increasing(
        vectors in proptest::collection::vec(arb_item_vector(), 1..30),
        query in arb_unit_vector(),
    ) {
        let index = build(vectors);
        let scores: Vec<f32> = index
            .search(&query, index.len())
            .unwrap()
            .iter()
            .map(|n| index.score(n))
            .collect();

        for score in &scores {
            prop_assert!((-1.0..=1.0).contains(score));
        }
        for pair in scores.windows(2) {
            prop_assert!(pair[0] >= pair[1]);
        }
    }
}

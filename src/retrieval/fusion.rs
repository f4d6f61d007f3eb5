//! Weighted fusion of per-collection reranked lists.
//!
//! Two numerics are available:
//!
//! ```text
//! weighted-score:  fused(doc) = Σ_c  w_c · σ(score_c(doc))
//! weighted-rrf:    fused(doc) = Σ_c  w_c / (K + rank_c(doc) + 1)
//! ```
//!
//! `σ` is the logistic function, which maps cross-encoder logits onto
//! `[0, 1]` without changing their order. A fragment whose text was also
//! retrieved from another collection is merged with it and the
//! contributions are summed; within one collection every candidate stays a
//! separate entry. The output order is total: fused score descending, then
//! weight descending, then per-collection rank ascending, then collection
//! name ascending, then candidate id ascending.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::core::catalog::{
    ELEMENT_NAMES, ELEMENTS, REPORT_NAMES, REPORT_SUMMARIES, TEXT_PAGES, UPLOAD_DATES,
};
use crate::core::{Candidate, FusedCandidate};
use crate::error::ConfigError;

const DEFAULT_RRF_K: f64 = 60.0;

/// Fusion numerics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum FusionMethod {
    /// Weighted blend of squashed rerank scores.
    #[default]
    WeightedScore,
    /// Weighted reciprocal rank fusion.
    WeightedRrf {
        /// RRF constant K.
        k: f64,
    },
}

impl FromStr for FusionMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weighted-score" | "score" => Ok(Self::WeightedScore),
            "weighted-rrf" | "rrf" => Ok(Self::WeightedRrf { k: DEFAULT_RRF_K }),
            other => Err(ConfigError::Invalid {
                message: format!(
                    "unknown fusion method '{other}' (expected weighted-score or weighted-rrf)"
                ),
            }),
        }
    }
}

impl std::fmt::Display for FusionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WeightedScore => f.write_str("weighted-score"),
            Self::WeightedRrf { k } => write!(f, "weighted-rrf(k={k})"),
        }
    }
}

/// Static per-collection fusion weights.
///
/// Weights are priors: they need not sum to 1 and are not normalized. A
/// collection absent from the table has weight 0 and is excluded from the
/// fused result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FusionWeightTable {
    weights: BTreeMap<String, f32>,
}

impl FusionWeightTable {
    /// Builds a table from `(collection, weight)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a negative or non-finite weight.
    pub fn new<I, S>(weights: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
    {
        let mut table = BTreeMap::new();
        for (name, weight) in weights {
            let name = name.into();
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::Invalid {
                    message: format!("fusion weight for '{name}' must be non-negative, got {weight}"),
                });
            }
            table.insert(name, weight);
        }
        Ok(Self { weights: table })
    }

    /// Weights of the Power BI collections.
    #[must_use]
    pub fn power_bi() -> Self {
        let weights = [
            (REPORT_NAMES, 0.2),
            (ELEMENT_NAMES, 0.2),
            (UPLOAD_DATES, 0.2),
            (REPORT_SUMMARIES, 0.3),
            (ELEMENTS, 0.3),
            (TEXT_PAGES, 0.2),
        ];
        Self {
            weights: weights
                .into_iter()
                .map(|(name, w)| (name.to_string(), w))
                .collect(),
        }
    }

    /// Weight of `collection`; 0 when absent.
    #[must_use]
    pub fn weight(&self, collection: &str) -> f32 {
        self.weights.get(collection).copied().unwrap_or(0.0)
    }

    /// Iterates `(collection, weight)` in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[inline]
fn sigmoid(x: f32) -> f64 {
    1.0 / (1.0 + (-f64::from(x)).exp())
}

#[inline]
fn rank_contribution(k: f64, rank: usize) -> f64 {
    let rank_u32 = u32::try_from(rank).unwrap_or(u32::MAX);
    1.0 / (k + f64::from(rank_u32) + 1.0)
}

#[inline]
fn sanitize_rrf_k(k: f64) -> f64 {
    if k.is_finite() && k >= 0.0 {
        k
    } else {
        DEFAULT_RRF_K
    }
}

fn contribution(method: FusionMethod, weight: f32, rank: usize, score: f32) -> f64 {
    let w = f64::from(weight);
    match method {
        FusionMethod::WeightedScore => {
            let s = if score.is_nan() { 0.0 } else { sigmoid(score) };
            w * s
        }
        FusionMethod::WeightedRrf { k } => w * rank_contribution(sanitize_rrf_k(k), rank),
    }
}

/// Total order used for the fused ranking.
fn cmp_for_ranking(a: &Entry, b: &Entry) -> Ordering {
    b.fused
        .total_cmp(&a.fused)
        .then_with(|| b.rep.weight.total_cmp(&a.rep.weight))
        .then_with(|| a.rep.collection_rank.cmp(&b.rep.collection_rank))
        .then_with(|| a.rep.collection.cmp(&b.rep.collection))
        .then_with(|| a.rep.candidate.id.cmp(&b.rep.candidate.id))
        .then_with(|| a.rep.candidate.text.cmp(&b.rep.candidate.text))
}

/// Representative preference when merging identical fragments: largest
/// single contribution, then best rank, then collection name.
fn prefer(a_contrib: f64, a: &FusedCandidate, b_contrib: f64, b: &FusedCandidate) -> bool {
    match a_contrib.total_cmp(&b_contrib) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => (a.collection_rank, &a.collection) < (b.collection_rank, &b.collection),
    }
}

struct Entry {
    rep: FusedCandidate,
    rep_contribution: f64,
    fused: f64,
    /// Collections already merged into this entry.
    members: Vec<String>,
}

/// Fuses per-collection reranked lists into one ordered list.
///
/// Each input list must already be in reranked order. Collections with
/// weight 0 contribute nothing and their candidates are dropped. The
/// result is never longer than the sum of the input lengths, and does not
/// depend on the iteration order of `per_collection`.
#[must_use]
#[instrument(
    name = "pbi_context::fuse",
    skip(per_collection, weights),
    fields(collections = per_collection.len(), method = %method)
)]
pub fn fuse(
    per_collection: &BTreeMap<String, Vec<Candidate>>,
    weights: &FusionWeightTable,
    method: FusionMethod,
) -> Vec<FusedCandidate> {
    let capacity = per_collection.values().map(Vec::len).sum();
    let mut entries: Vec<Entry> = Vec::with_capacity(capacity);
    // Text → indices of entries carrying it.
    let mut by_text: HashMap<String, Vec<usize>> = HashMap::with_capacity(capacity);
    let mut excluded = 0usize;

    for (collection, candidates) in per_collection {
        let weight = weights.weight(collection);
        if weight <= 0.0 {
            excluded += candidates.len();
            continue;
        }

        for (rank, candidate) in candidates.iter().enumerate() {
            let contrib = contribution(method, weight, rank, candidate.score);
            let fused = FusedCandidate {
                candidate: candidate.clone(),
                collection: collection.clone(),
                weight,
                collection_rank: rank,
                fused_score: contrib,
            };

            let slots = by_text.entry(candidate.text.clone()).or_default();
            let open = slots
                .iter()
                .copied()
                .find(|&i| !entries[i].members.contains(collection));
            if let Some(i) = open {
                let entry = &mut entries[i];
                entry.fused += contrib;
                entry.members.push(collection.clone());
                if prefer(contrib, &fused, entry.rep_contribution, &entry.rep) {
                    entry.rep = fused;
                    entry.rep_contribution = contrib;
                }
            } else {
                slots.push(entries.len());
                entries.push(Entry {
                    rep: fused,
                    rep_contribution: contrib,
                    fused: contrib,
                    members: vec![collection.clone()],
                });
            }
        }
    }

    entries.sort_by(cmp_for_ranking);

    let output: Vec<FusedCandidate> = entries
        .into_iter()
        .map(|e| FusedCandidate {
            fused_score: e.fused,
            ..e.rep
        })
        .collect();

    debug!(
        fused_count = output.len(),
        merged = capacity - excluded - output.len(),
        excluded,
        "fusion complete"
    );

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lists(entries: &[(&str, &[(&str, f32)])]) -> BTreeMap<String, Vec<Candidate>> {
        entries
            .iter()
            .map(|(coll, cands)| {
                (
                    (*coll).to_string(),
                    cands
                        .iter()
                        .map(|(text, score)| Candidate::new(format!("{coll}-{text}"), *text, *score))
                        .collect(),
                )
            })
            .collect()
    }

    fn table(pairs: &[(&str, f32)]) -> FusionWeightTable {
        FusionWeightTable::new(pairs.iter().map(|(n, w)| (*n, *w))).unwrap_or_default()
    }

    #[test]
    fn test_single_collection_preserves_rerank_order() {
        let input = lists(&[("report_names", &[("a", 2.0), ("b", 1.0), ("c", -3.0)])]);
        let out = fuse(&input, &FusionWeightTable::power_bi(), FusionMethod::default());
        let texts: Vec<_> = out.iter().map(|f| f.candidate.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert!(out.iter().all(|f| f.collection == "report_names"));
    }

    #[test]
    fn test_zero_and_absent_weight_excluded() {
        let input = lists(&[
            ("Elements", &[("x", 1.0)]),
            ("ghost", &[("y", 5.0)]),
            ("muted", &[("z", 5.0)]),
        ]);
        let weights = table(&[("Elements", 0.3), ("muted", 0.0)]);
        let out = fuse(&input, &weights, FusionMethod::WeightedScore);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].candidate.text, "x");
    }

    #[test]
    fn test_higher_weight_wins_on_equal_score() {
        let input = lists(&[
            ("Elements", &[("from elements", 0.5)]),
            ("Text Pages", &[("from pages", 0.5)]),
        ]);
        for method in [FusionMethod::WeightedScore, FusionMethod::WeightedRrf { k: 60.0 }] {
            let out = fuse(&input, &FusionWeightTable::power_bi(), method);
            assert_eq!(out[0].collection, "Elements");
            assert_eq!(out[1].collection, "Text Pages");
        }
    }

    #[test]
    fn test_ties_broken_by_collection_name() {
        let input = lists(&[("b_coll", &[("one", 1.0)]), ("a_coll", &[("two", 1.0)])]);
        let weights = table(&[("a_coll", 0.5), ("b_coll", 0.5)]);
        let out = fuse(&input, &weights, FusionMethod::WeightedScore);
        assert_eq!(out[0].collection, "a_coll");
        assert_eq!(out[1].collection, "b_coll");
    }

    #[test]
    fn test_identical_text_merged_across_collections() {
        let input = lists(&[
            ("Elements", &[("shared", 0.0), ("only elements", 0.1)]),
            ("Text Pages", &[("shared", 0.0)]),
        ]);
        let out = fuse(&input, &FusionWeightTable::power_bi(), FusionMethod::WeightedScore);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].candidate.text, "shared");
        assert_eq!(out[0].collection, "Elements");
        let expected = f64::from(0.3f32) * 0.5 + f64::from(0.2f32) * 0.5;
        assert!((out[0].fused_score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_identical_text_within_one_collection_kept_apart() {
        let input: BTreeMap<String, Vec<Candidate>> = [(
            "report_names".to_string(),
            vec![
                Candidate::new("1", "A", 2.0),
                Candidate::new("2", "B", 1.0),
                Candidate::new("3", "B", 0.9),
            ],
        )]
        .into_iter()
        .collect();
        for method in [FusionMethod::WeightedScore, FusionMethod::WeightedRrf { k: 60.0 }] {
            let out = fuse(&input, &FusionWeightTable::power_bi(), method);
            let ids: Vec<_> = out.iter().map(|f| f.candidate.id.as_str()).collect();
            assert_eq!(ids, ["1", "2", "3"]);
        }
    }

    #[test]
    fn test_duplicates_merge_once_per_collection() {
        let input: BTreeMap<String, Vec<Candidate>> = [
            (
                "Elements".to_string(),
                vec![Candidate::new("e1", "KPI", 1.0), Candidate::new("e2", "KPI", 1.0)],
            ),
            ("Text Pages".to_string(), vec![Candidate::new("t1", "KPI", 1.0)]),
        ]
        .into_iter()
        .collect();
        let out = fuse(&input, &FusionWeightTable::power_bi(), FusionMethod::WeightedScore);
        let ids: Vec<_> = out.iter().map(|f| f.candidate.id.as_str()).collect();
        assert_eq!(ids, ["e1", "e2"]);
        assert!(out[0].fused_score > out[1].fused_score);
    }

    #[test]
    fn test_weight_breaks_underflowed_ties() {
        let input = lists(&[("zeta_hi", &[("h", -1000.0)]), ("alpha_lo", &[("l", -1000.0)])]);
        let weights = table(&[("zeta_hi", 0.9), ("alpha_lo", 0.1)]);
        let out = fuse(&input, &weights, FusionMethod::WeightedScore);
        assert_eq!(out[0].fused_score, 0.0);
        assert_eq!(out[0].collection, "zeta_hi");
        assert_eq!(out[1].collection, "alpha_lo");
    }

    #[test]
    fn test_negative_weight_rejected() {
        assert!(FusionWeightTable::new([("Elements", -0.1)]).is_err());
        assert!(FusionWeightTable::new([("Elements", f32::NAN)]).is_err());
    }

    #[test]
    fn test_fusion_method_parse() {
        assert_eq!("weighted-score".parse::<FusionMethod>().ok(), Some(FusionMethod::WeightedScore));
        assert_eq!(
            "RRF".parse::<FusionMethod>().ok(),
            Some(FusionMethod::WeightedRrf { k: 60.0 })
        );
        assert!("borda".parse::<FusionMethod>().is_err());
    }

    proptest! {
        #[test]
        fn prop_fused_len_bounded(
            a in proptest::collection::vec(-10.0f32..10.0, 0..12),
            b in proptest::collection::vec(-10.0f32..10.0, 0..12),
        ) {
            let mut input = BTreeMap::new();
            input.insert("Elements".to_string(), a.iter().enumerate()
                .map(|(i, s)| Candidate::new(format!("e{i}"), format!("e{i}"), *s)).collect::<Vec<_>>());
            input.insert("Text Pages".to_string(), b.iter().enumerate()
                .map(|(i, s)| Candidate::new(format!("t{i}"), format!("t{i}"), *s)).collect::<Vec<_>>());
            let out = fuse(&input, &FusionWeightTable::power_bi(), FusionMethod::WeightedScore);
            prop_assert_eq!(out.len(), a.len() + b.len());
            for pair in out.windows(2) {
                prop_assert!(pair[0].fused_score >= pair[1].fused_score);
            }
        }

        #[test]
        fn prop_single_collection_keeps_rerank_order(
            texts in proptest::collection::vec("[ab]", 0..10),
        ) {
            // Reranked order: scores strictly descending, texts repeat freely.
            let candidates: Vec<Candidate> = texts.iter().zip(0u16..)
                .map(|(t, i)| Candidate::new(i.to_string(), t.clone(), 10.0 - f32::from(i)))
                .collect();
            let expected: Vec<String> = candidates.iter().map(|c| c.id.clone()).collect();
            let input: BTreeMap<_, _> = [("Elements".to_string(), candidates)].into_iter().collect();
            for method in [FusionMethod::WeightedScore, FusionMethod::WeightedRrf { k: 60.0 }] {
                let ids: Vec<String> = fuse(&input, &FusionWeightTable::power_bi(), method)
                    .into_iter()
                    .map(|f| f.candidate.id)
                    .collect();
                prop_assert_eq!(&ids, &expected);
            }
        }

        #[test]
        fn prop_higher_weight_never_after_equal_score(
            score in prop_oneof![-1000.0f32..1000.0, Just(f32::NEG_INFINITY)],
            w_hi in 0.01f32..1.0,
            delta in 0.001f32..1.0,
        ) {
            let w_lo = (w_hi - delta).max(0.0001);
            prop_assume!(w_lo < w_hi);
            // The low-weight collection sorts first by name.
            let input = lists(&[("zeta_hi", &[("h", score)]), ("alpha_lo", &[("l", score)])]);
            let weights = table(&[("zeta_hi", w_hi), ("alpha_lo", w_lo)]);
            for method in [FusionMethod::WeightedScore, FusionMethod::WeightedRrf { k: 60.0 }] {
                let out = fuse(&input, &weights, method);
                let pos_hi = out.iter().position(|f| f.collection == "zeta_hi");
                let pos_lo = out.iter().position(|f| f.collection == "alpha_lo");
                prop_assert!(pos_hi < pos_lo);
            }
        }
    }
}

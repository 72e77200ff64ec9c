//! Score fusion over any number of ranked candidate lists

use crate::types::{by_score_then_id, Candidate, DocId, SignalHit};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// One document after fusion; `hits[i]` is its placement in list `i`
#[derive(Debug, Clone, PartialEq)]
pub struct Fused {
    pub doc_id: DocId,
    pub score: f64,
    pub hits: Vec<Option<SignalHit>>,
}

/// Min-max normalization; a degenerate range maps everything to 1.0
pub fn normalize(score: f64, min: f64, max: f64) -> f64 {
    if max == min {
        return 1.0;
    }
    (score - min) / (max - min)
}

pub fn normalize_scores(scores: &[f64]) -> Vec<f64> {
    let Some(first) = scores.first() else {
        return Vec::new();
    };
    let (min, max) = scores
        .iter()
        .fold((*first, *first), |(lo, hi), &s| (lo.min(s), hi.max(s)));

    scores.iter().map(|&s| normalize(s, min, max)).collect()
}

fn merge<F>(lists: &[Vec<Candidate>], mut contribution: F) -> Vec<Fused>
where
    F: FnMut(usize, usize, &Candidate) -> f64,
{
    let mut merged: BTreeMap<DocId, Fused> = BTreeMap::new();

    for (list_index, list) in lists.iter().enumerate() {
        for (position, candidate) in list.iter().enumerate() {
            let fused_score = contribution(list_index, position, candidate);
            let entry = merged.entry(candidate.doc_id).or_insert_with(|| Fused {
                doc_id: candidate.doc_id,
                score: 0.0,
                hits: vec![None; lists.len()],
            });
            // first placement wins if a list repeats a document
            if entry.hits[list_index].is_none() {
                entry.hits[list_index] = Some(SignalHit {
                    rank: candidate.rank,
                    raw_score: candidate.score,
                    fused_score,
                });
                entry.score += fused_score;
            }
        }
    }

    let mut fused: Vec<Fused> = merged.into_values().collect();
    fused.sort_by(|a, b| by_score_then_id((a.score, a.doc_id), (b.score, b.doc_id)));
    fused
}

/// Normalizes each list over its own scores and blends them with `weights`.
/// A document missing from a list contributes 0.0 for it.
pub fn weighted_fusion(lists: &[Vec<Candidate>], weights: &[f64]) -> Result<Vec<Fused>> {
    if lists.len() != weights.len() {
        return Err(Error::Validation(format!(
            "{} candidate lists but {} weights",
            lists.len(),
            weights.len()
        )));
    }

    let normalized: Vec<Vec<f64>> = lists
        .iter()
        .map(|list| normalize_scores(&list.iter().map(|c| c.score).collect::<Vec<_>>()))
        .collect();

    let mut fused = merge(lists, |list_index, position, _| normalized[list_index][position]);
    for entry in &mut fused {
        entry.score = entry
            .hits
            .iter()
            .zip(weights)
            .map(|(hit, weight)| hit.map_or(0.0, |h| weight * h.fused_score))
            .sum();
    }
    fused.sort_by(|a, b| by_score_then_id((a.score, a.doc_id), (b.score, b.doc_id)));
    Ok(fused)
}

/// Sums `1 / (k + rank)` over the lists each document appears in
pub fn reciprocal_rank_fusion(lists: &[Vec<Candidate>], k: usize) -> Vec<Fused> {
    merge(lists, |_, _, candidate| 1.0 / (k + candidate.rank) as f64)
}

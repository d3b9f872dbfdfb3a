//! Result merging and ordering.
//!
//! Concatenates per-provider result lists in provider-selection order and
//! sorts them stably by the requested key, so ties keep that order.

use std::cmp::Ordering;

use crate::types::{SearchResult, SortKey};

/// Merge per-provider result lists into one ordered list.
///
/// - [`SortKey::Relevance`]: descending relevance score
/// - [`SortKey::Date`]: newest first, undated results last
/// - [`SortKey::Popularity`]: descending popularity, missing counts as 0
///
/// Pure and total: NaN scores sort below every number.
pub fn merge(per_provider: Vec<Vec<SearchResult>>, sort_by: SortKey) -> Vec<SearchResult> {
    let mut merged: Vec<SearchResult> = per_provider.into_iter().flatten().collect();
    merged.sort_by(|a, b| compare(a, b, sort_by));
    merged
}

/// Ordering of two results under `sort_by`; `Less` means `a` ranks first.
pub fn compare(a: &SearchResult, b: &SearchResult, sort_by: SortKey) -> Ordering {
    match sort_by {
        SortKey::Relevance => descending(a.relevance_score, b.relevance_score),
        SortKey::Popularity => descending(
            a.popularity.unwrap_or(0.0),
            b.popularity.unwrap_or(0.0),
        ),
        SortKey::Date => match (a.date, b.date) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    sanitize(b).total_cmp(&sanitize(a))
}

fn sanitize(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn result(id: &str, score: f64) -> SearchResult {
        SearchResult::new(id, id, score)
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn relevance_descending_with_stable_ties() {
        let merged = merge(
            vec![vec![result("A", 5.0)], vec![result("B", 9.0)], vec![result("C", 5.0)]],
            SortKey::Relevance,
        );
        assert_eq!(ids(&merged), ["B", "A", "C"]);
    }

    #[test]
    fn ties_keep_within_provider_order() {
        let merged = merge(
            vec![
                vec![result("a1", 1.0), result("a2", 1.0)],
                vec![result("b1", 1.0)],
            ],
            SortKey::Relevance,
        );
        assert_eq!(ids(&merged), ["a1", "a2", "b1"]);
    }

    #[test]
    fn date_newest_first_undated_last() {
        let mut old = result("old", 0.0);
        old.date = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        let mut new = result("new", 0.0);
        new.date = Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        let undated = result("undated", 10.0);

        let merged = merge(vec![vec![undated, old], vec![new]], SortKey::Date);
        assert_eq!(ids(&merged), ["new", "old", "undated"]);
    }

    #[test]
    fn popularity_missing_counts_as_zero() {
        let mut hot = result("hot", 0.0);
        hot.popularity = Some(100.0);
        let mut negative = result("negative", 0.0);
        negative.popularity = Some(-1.0);
        let missing = result("missing", 0.0);

        let merged = merge(vec![vec![negative, missing, hot]], SortKey::Popularity);
        assert_eq!(ids(&merged), ["hot", "missing", "negative"]);
    }

    #[test]
    fn nan_scores_sort_last() {
        let merged = merge(
            vec![vec![result("nan", f64::NAN), result("low", -3.0)]],
            SortKey::Relevance,
        );
        assert_eq!(ids(&merged), ["low", "nan"]);
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(merge(Vec::new(), SortKey::Date).is_empty());
        assert!(merge(vec![Vec::new(), Vec::new()], SortKey::Relevance).is_empty());
    }
}

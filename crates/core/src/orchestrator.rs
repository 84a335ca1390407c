use crate::fuzzy::{default_process, partial_ratio, MAX_SCORE};
use crate::traits::RecordStore;
use crate::{InstructionRecord, SearchError, SearchHit, SearchMode, SearchQuery, SearchResult};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Answers queries against a snapshot of the record store.
///
/// Every query rescans all records (O(records x text length)). There is no
/// index; the corpus is expected to stay small and operator-curated.
pub struct SearchCoordinator {
    store: Arc<dyn RecordStore>,
}

impl SearchCoordinator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn search(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        let snapshot = self.store.list_all()?;
        let hits = match query.mode {
            SearchMode::Fuzzy => rank_fuzzy(query, &snapshot),
            SearchMode::Substring => match_substring(query, &snapshot),
        };

        debug!(
            query = %query.text,
            mode = ?query.mode,
            candidates = snapshot.len(),
            hits = hits.len(),
            "search finished"
        );

        Ok(SearchResult {
            query: query.text.clone(),
            mode: query.mode,
            candidates: snapshot.len(),
            hits,
        })
    }
}

/// Scores `query` against each record's `title + " " + content` with
/// [`partial_ratio`] and keeps the best `top_k` scoring above `min_score`.
///
/// Equal scores keep the records' store order. No record is scored when the
/// snapshot is empty.
pub fn rank_fuzzy(query: &SearchQuery, records: &[InstructionRecord]) -> Vec<SearchHit> {
    if records.is_empty() || query.top_k == 0 {
        return Vec::new();
    }

    let needle = default_process(&query.text);
    let mut scored: Vec<(usize, f64)> = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let haystack = default_process(&record.searchable_text());
            (index, partial_ratio(&needle, &haystack))
        })
        .collect();

    // `sort_by` is stable, which gives the insertion-order tie-break.
    scored.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));

    scored
        .into_iter()
        .take(query.top_k)
        .filter(|(_, score)| *score > query.min_score.max(0.0))
        .map(|(index, score)| SearchHit {
            record: records[index].clone(),
            score,
        })
        .collect()
}

/// Case-insensitive substring match on title or content, in store order.
pub fn match_substring(query: &SearchQuery, records: &[InstructionRecord]) -> Vec<SearchHit> {
    if query.min_score >= MAX_SCORE {
        return Vec::new();
    }

    let needle = query.text.to_lowercase();
    records
        .iter()
        .filter(|record| {
            record.title.to_lowercase().contains(&needle)
                || record.content.to_lowercase().contains(&needle)
        })
        .take(query.top_k)
        .map(|record| SearchHit {
            record: record.clone(),
            score: MAX_SCORE,
        })
        .collect()
}

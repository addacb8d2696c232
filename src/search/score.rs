//! Normalization and weighted term scoring.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::{EntryKind, SearchEntry};

const NAME_EXACT: u32 = 10;
const NAME_SUBSTRING: u32 = 5;
const PROVINCE_EXACT: u32 = 4;
const PROVINCE_SUBSTRING: u32 = 2;
const KEYWORD_EXACT: u32 = 3;
const KEYWORD_SUBSTRING: u32 = 1;

/// Case-fold and strip accents so "Québec" matches "quebec".
/// Unicode-decompose (NFD), drop combining marks, lowercase.
pub fn normalize(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Attach the precomputed normalized fields. Called once per entry at
/// snapshot build time.
pub fn enrich(entry: &mut SearchEntry) {
    entry.name_norm = normalize(&entry.name);
    entry.province_norm = normalize(&entry.province);
    entry.keywords_norm = entry.keywords.iter().map(|k| normalize(k)).collect();
}

/// Relevance of one entry for a query. Whitespace-split the normalized query
/// and sum per-term weights: exact name 10 / name substring 5, exact
/// province 4 / substring 2, exact keyword 3 / substring 1.
pub fn score(entry: &SearchEntry, query: &str) -> u32 {
    let normalized_query = normalize(query);
    let mut total = 0;

    for term in normalized_query.split_whitespace() {
        if entry.name_norm == term {
            total += NAME_EXACT;
        } else if entry.name_norm.contains(term) {
            total += NAME_SUBSTRING;
        }

        if entry.province_norm == term {
            total += PROVINCE_EXACT;
        } else if entry.province_norm.contains(term) {
            total += PROVINCE_SUBSTRING;
        }

        if entry.keywords_norm.iter().any(|k| k == term) {
            total += KEYWORD_EXACT;
        } else if entry.keywords_norm.iter().any(|k| k.contains(term)) {
            total += KEYWORD_SUBSTRING;
        }
    }

    total
}

/// Scored entries, zero scores dropped, sorted score-descending with parks
/// before campgrounds on ties. The sort is stable so equal entries keep
/// their snapshot order.
pub fn rank(entries: &[SearchEntry], query: &str) -> Vec<(SearchEntry, u32)> {
    let mut scored: Vec<(SearchEntry, u32)> = entries
        .iter()
        .map(|e| (e.clone(), score(e, query)))
        .filter(|(_, s)| *s > 0)
        .collect();

    scored.sort_by(|(a, sa), (b, sb)| {
        sb.cmp(sa).then_with(|| kind_rank(a.kind).cmp(&kind_rank(b.kind)))
    });

    scored
}

fn kind_rank(kind: EntryKind) -> u8 {
    match kind {
        EntryKind::Park => 0,
        EntryKind::Campground => 1,
    }
}

// src/change_detector.rs
use metrics::{counter, gauge};

use crate::notice::NoticeEntry;

/// Highest notice id already processed. Starts at 0 and never decreases.
///
/// Only `detect_new` moves it forward; the run coordinator owns the single
/// instance and serializes access to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark(u64);

impl Watermark {
    pub fn new(last_seen_id: u64) -> Self {
        Self(last_seen_id)
    }

    pub fn last_seen_id(self) -> u64 {
        self.0
    }
}

/// Entries strictly above `watermark`, sorted ascending by id, plus the
/// advanced watermark.
///
/// Nothing new is the normal case: the empty set comes back and the
/// watermark is untouched. Calling again with the returned watermark yields
/// nothing, whatever order the page listed its rows in.
pub fn detect_new(
    entries: Vec<NoticeEntry>,
    watermark: Watermark,
) -> (Vec<NoticeEntry>, Watermark) {
    let mut fresh: Vec<NoticeEntry> = entries
        .into_iter()
        .filter(|n| n.id > watermark.0)
        .collect();

    let Some(max_id) = fresh.iter().map(|n| n.id).max() else {
        return (fresh, watermark);
    };

    fresh.sort_by_key(|n| n.id);

    counter!("relay_new_notices_total").increment(fresh.len() as u64);
    gauge!("relay_watermark").set(max_id as f64);

    (fresh, Watermark(max_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(ids: &[u64]) -> Vec<NoticeEntry> {
        ids.iter()
            .map(|&id| NoticeEntry::new(id, format!("notice {id}"), "2024.01.01", "v?id="))
            .collect()
    }

    fn ids(v: &[NoticeEntry]) -> Vec<u64> {
        v.iter().map(|n| n.id).collect()
    }

    #[test]
    fn keeps_only_unseen_sorted_ascending() {
        let (fresh, wm) = detect_new(entries(&[98, 101, 99, 105]), Watermark::new(100));
        assert_eq!(ids(&fresh), vec![101, 105]);
        assert_eq!(wm, Watermark::new(105));
    }

    #[test]
    fn nothing_new_leaves_watermark() {
        let (fresh, wm) = detect_new(entries(&[3, 1, 2]), Watermark::new(10));
        assert!(fresh.is_empty());
        assert_eq!(wm.last_seen_id(), 10);
    }

    #[test]
    fn empty_page_leaves_watermark() {
        let (fresh, wm) = detect_new(Vec::new(), Watermark::default());
        assert!(fresh.is_empty());
        assert_eq!(wm, Watermark::default());
    }

    #[test]
    fn second_pass_with_advanced_watermark_is_empty() {
        let page = entries(&[7, 12, 9, 3, 15, 11]);
        let (first, wm) = detect_new(page.clone(), Watermark::default());
        assert_eq!(ids(&first), vec![3, 7, 9, 11, 12, 15]);

        let (second, wm2) = detect_new(page, wm);
        assert!(second.is_empty());
        assert_eq!(wm2, wm);
    }

    #[test]
    fn equal_to_watermark_is_not_new() {
        let (fresh, wm) = detect_new(entries(&[5]), Watermark::new(5));
        assert!(fresh.is_empty());
        assert_eq!(wm.last_seen_id(), 5);
    }
}

//! Segment construction: (zone, GSE, age range, gender) availability counts
//! over the filtered population.
//!
//! Row order of the segment table is part of the contract. Counted segments
//! come first, sorted by key; segments known only from an imported quota
//! table follow in import order. Quota distribution walks rows in this order.

use crate::models::{Dimension, Filters, QuotaEntry, Respondent, Roster, Segment, SegmentKey};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Classified respondents that pass every active filter, in roster order.
pub fn filtered_population<'a>(roster: &'a Roster, filters: &Filters) -> Vec<&'a Respondent> {
    roster
        .respondents
        .iter()
        .filter(|respondent| {
            respondent
                .segment_key()
                .is_some_and(|key| filters.accepts(&key))
        })
        .collect()
}

pub fn build_segments(roster: &Roster, filters: &Filters) -> Vec<Segment> {
    let mut counts: BTreeMap<SegmentKey, u32> = BTreeMap::new();

    for respondent in filtered_population(roster, filters) {
        if let Some(key) = respondent.segment_key() {
            *counts.entry(key).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .map(|(key, available)| Segment { key, available })
        .collect()
}

/// Append imported segments missing from the counted table with zero
/// availability. This includes segments the active filters now exclude, so
/// their quota rows survive an export.
pub fn retain_imported_segments(mut segments: Vec<Segment>, imported: &[QuotaEntry]) -> Vec<Segment> {
    let mut known: HashSet<SegmentKey> = segments.iter().map(|s| s.key.clone()).collect();

    for entry in imported {
        let key = entry.key();
        if known.contains(&key) {
            continue;
        }
        known.insert(key.clone());
        segments.push(Segment { key, available: 0 });
    }

    segments
}

/// Distinct values of one dimension among classified respondents.
pub fn distinct_values(roster: &Roster, dimension: Dimension) -> BTreeSet<String> {
    roster
        .respondents
        .iter()
        .filter_map(Respondent::segment_key)
        .map(|key| key.value(dimension).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{respondent, roster};

    fn sample_roster() -> Roster {
        roster(vec![
            respondent("Norte", "C2", 25, "F"),
            respondent("Norte", "C2", 30, "F"),
            respondent("Sur", "D", 40, "M"),
            respondent("Norte", "AB", 45, "M"),
            respondent("Sur", "D", 80, "M"),
            respondent("Centro", "C2", 22, "F"),
        ])
    }

    #[test]
    fn counts_match_filtered_population() {
        let roster = sample_roster();
        let filters = Filters::default();

        let segments = build_segments(&roster, &filters);
        let total: u32 = segments.iter().map(|s| s.available).sum();

        assert_eq!(total as usize, filtered_population(&roster, &filters).len());
        assert_eq!(total, 5);
    }

    #[test]
    fn segments_are_sorted_by_key() {
        let segments = build_segments(&sample_roster(), &Filters::default());
        let keys: Vec<&SegmentKey> = segments.iter().map(|s| &s.key).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(segments[0].key, SegmentKey::new("Centro", "C2", "18-34", "F"));
    }

    #[test]
    fn filters_limit_segments() {
        let roster = sample_roster();
        let filters = Filters {
            zones: Some(["Norte".to_string()].into_iter().collect()),
            ..Filters::default()
        };

        let segments = build_segments(&roster, &filters);
        assert!(segments.iter().all(|s| s.key.zone == "Norte"));
        assert_eq!(segments.iter().map(|s| s.available).sum::<u32>(), 3);
        assert_eq!(
            segments.iter().map(|s| s.available).sum::<u32>() as usize,
            filtered_population(&roster, &filters).len()
        );
    }

    fn entry(zone: &str, gse: &str, age_range: &str, gender: &str, desired: u32) -> QuotaEntry {
        QuotaEntry {
            zone: zone.into(),
            gse: gse.into(),
            age_range: age_range.into(),
            gender: gender.into(),
            desired,
        }
    }

    #[test]
    fn imported_only_segments_keep_zero_availability() {
        let roster = sample_roster();
        let filters = Filters {
            zones: Some(["Norte".to_string()].into_iter().collect()),
            ..Filters::default()
        };
        let imported = vec![
            entry("Oeste", "C3", "35-60", "F", 4),
            entry("Sur", "D", "35-60", "M", 2),
            entry("Norte", "C2", "18-34", "F", 1),
            entry("Oeste", "C3", "35-60", "F", 9),
        ];

        let segments = retain_imported_segments(build_segments(&roster, &filters), &imported);

        let keys: Vec<&SegmentKey> = segments.iter().map(|s| &s.key).collect();
        assert_eq!(
            keys,
            vec![
                &SegmentKey::new("Norte", "AB", "35-60", "M"),
                &SegmentKey::new("Norte", "C2", "18-34", "F"),
                &SegmentKey::new("Oeste", "C3", "35-60", "F"),
                &SegmentKey::new("Sur", "D", "35-60", "M"),
            ]
        );
        assert_eq!(segments[1].available, 2);
        assert_eq!(segments[2].available, 0);
        // Sur has respondents but is filtered out, so nothing is available
        assert_eq!(segments[3].available, 0);
    }

    #[test]
    fn distinct_values_skip_unclassified() {
        let zones = distinct_values(&sample_roster(), Dimension::Zone);
        assert_eq!(
            zones.into_iter().collect::<Vec<_>>(),
            vec!["Centro".to_string(), "Norte".to_string(), "Sur".to_string()]
        );
    }
}

//! Classifier → Segmenter → Quota Resolver → Sampler → Splitter, as pure
//! functions of the roster and the run settings.

use crate::error::{ImportError, PipelineError};
use crate::models::{Filters, QuotaEntry, QuotaRow, Roster};
use crate::quota::{self, QuotaSettings, Resolution};
use crate::sampler::{self, Sample, SampledRecord};
use crate::segmenter;
use crate::splitter;

/// Where the initial desired counts come from.
#[derive(Debug, Clone, Copy)]
pub enum DesiredSource<'a> {
    /// Counts from a previously exported quota table
    Imported(&'a [QuotaEntry]),
    /// Spread a total over segments in proportion to availability
    Proportional(u32),
    /// All zeros; also the fallback when an import could not be read
    ZeroFilled,
}

impl<'a> DesiredSource<'a> {
    /// Pick the source for a run. A quota import that was attempted wins,
    /// even when it failed: a failed import falls back to zeros rather than
    /// to `target_total`.
    pub fn from_import(
        import: Option<&'a Result<Vec<QuotaEntry>, ImportError>>,
        target_total: Option<u32>,
    ) -> Self {
        match import {
            Some(Ok(entries)) => DesiredSource::Imported(entries),
            Some(Err(e)) => {
                log::warn!("quota import failed, desired counts start at zero: {}", e);
                DesiredSource::ZeroFilled
            }
            None => target_total.map_or(DesiredSource::ZeroFilled, DesiredSource::Proportional),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SampleFrame {
    pub sample: Sample,
    pub parts: Vec<Vec<SampledRecord>>,
}

impl SampleFrame {
    pub fn part_sizes(&self) -> Vec<usize> {
        self.parts.iter().map(Vec::len).collect()
    }
}

pub fn resolve_quotas(
    roster: &Roster,
    filters: &Filters,
    source: DesiredSource<'_>,
    settings: &QuotaSettings,
) -> Resolution {
    let segments = segmenter::build_segments(roster, filters);

    let rows = match source {
        DesiredSource::Imported(entries) => {
            let segments = segmenter::retain_imported_segments(segments, entries);
            quota::merge_desired(&segments, entries)
        }
        DesiredSource::Proportional(total) => quota::allocate_proportional(&segments, total),
        DesiredSource::ZeroFilled => quota::zero_filled(&segments),
    };

    quota::resolve(rows, settings)
}

pub fn build_frame(
    roster: &Roster,
    filters: &Filters,
    rows: &[QuotaRow],
    parts: usize,
    seed: u64,
) -> Result<SampleFrame, PipelineError> {
    let population = segmenter::filtered_population(roster, filters);
    let sample = sampler::draw_sample(&population, rows, seed)?;
    let parts = splitter::stratified_split(sample.records.clone(), parts, seed)?;
    Ok(SampleFrame { sample, parts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_io::read_quota_table;
    use crate::error::SampleError;
    use crate::models::{total_desired, GlobalRule, SegmentKey};
    use crate::test_support::{repeated, roster};

    fn population() -> Roster {
        let mut people = repeated("Norte", "C2", 25, "F", 30);
        people.extend(repeated("Norte", "D", 45, "M", 20));
        people.extend(repeated("Sur", "C2", 25, "M", 40));
        people.extend(repeated("Sur", "D", 70, "F", 15));
        roster(people)
    }

    #[test]
    fn proportional_run_end_to_end() {
        let roster = population();
        let filters = Filters::default();
        let resolution = resolve_quotas(
            &roster,
            &filters,
            DesiredSource::Proportional(45),
            &QuotaSettings::default(),
        );
        assert_eq!(resolution.total_desired(), 45);

        let frame = build_frame(&roster, &filters, &resolution.rows, 3, 42).unwrap();
        assert_eq!(frame.sample.len(), 45);
        assert_eq!(frame.part_sizes(), vec![15, 15, 15]);
    }

    #[test]
    fn imported_quotas_with_rules() {
        let roster = population();
        let filters = Filters::default();
        let imported = vec![
            QuotaEntry {
                zone: "Norte".into(),
                gse: "C2".into(),
                age_range: "18-34".into(),
                gender: "F".into(),
                desired: 10,
            },
            QuotaEntry {
                zone: "Sur".into(),
                gse: "C2".into(),
                age_range: "18-34".into(),
                gender: "M".into(),
                desired: 50,
            },
            QuotaEntry {
                zone: "Oeste".into(),
                gse: "E".into(),
                age_range: "35-60".into(),
                gender: "M".into(),
                desired: 5,
            },
        ];
        let settings = QuotaSettings {
            rules: vec![GlobalRule::new("ZONA", "Norte", "Mínimo", 40.0)],
            ..QuotaSettings::default()
        };

        let resolution = resolve_quotas(&roster, &filters, DesiredSource::Imported(&imported), &settings);

        // Sur/C2 is capped 50 -> 40, Oeste has nobody: total 50, Norte needs 20
        let desired = |key: SegmentKey| {
            resolution
                .rows
                .iter()
                .find(|row| row.key == key)
                .map(|row| row.desired)
        };
        assert_eq!(desired(SegmentKey::new("Norte", "C2", "18-34", "F")), Some(20));
        assert_eq!(desired(SegmentKey::new("Sur", "C2", "18-34", "M")), Some(40));
        assert_eq!(desired(SegmentKey::new("Oeste", "E", "35-60", "M")), Some(0));
        assert_eq!(resolution.shortfalls.len(), 2);
        assert!(resolution.rows.iter().all(|row| row.desired <= row.available));
    }

    #[test]
    fn zero_filled_source_cannot_sample() {
        let roster = population();
        let filters = Filters::default();
        let resolution = resolve_quotas(&roster, &filters, DesiredSource::ZeroFilled, &QuotaSettings::default());
        assert_eq!(total_desired(&resolution.rows), 0);

        let err = build_frame(&roster, &filters, &resolution.rows, 2, 42).unwrap_err();
        assert!(matches!(err, PipelineError::Sample(SampleError::NothingRequested)));
    }

    #[test]
    fn minimum_cap_applies_to_zero_filled_table() {
        let roster = population();
        let filters = Filters::default();
        let settings = QuotaSettings {
            minimum_cap: 18,
            ..QuotaSettings::default()
        };

        let resolution = resolve_quotas(&roster, &filters, DesiredSource::ZeroFilled, &settings);

        // Sur/D/70 is unclassified, the other three segments hold at least 18
        assert_eq!(resolution.rows.len(), 3);
        assert!(resolution.rows.iter().all(|row| row.desired == 18));
    }

    #[test]
    fn runs_are_reproducible() {
        let roster = population();
        let filters = Filters::default();
        let settings = QuotaSettings::default();

        let run = || {
            let resolution = resolve_quotas(&roster, &filters, DesiredSource::Proportional(31), &settings);
            build_frame(&roster, &filters, &resolution.rows, 4, 42).unwrap()
        };

        let first = run();
        let second = run();
        assert_eq!(first.sample.records, second.sample.records);
        assert_eq!(first.parts, second.parts);
    }

    #[test]
    fn failed_quota_import_starts_from_zero() {
        let roster = population();
        let filters = Filters::default();
        let malformed = "ZONA,GSE,RANGO_EDAD_CUSTOM,NOMBRE_GENERO,Deseados\nNorte,C2,18-34,F,muchos\n";
        let import = read_quota_table(malformed.as_bytes(), "Cuotas.csv");
        assert!(import.is_err());

        let source = DesiredSource::from_import(Some(&import), Some(40));
        assert!(matches!(source, DesiredSource::ZeroFilled));

        let resolution = resolve_quotas(&roster, &filters, source, &QuotaSettings::default());
        let fresh = segmenter::build_segments(&roster, &filters);
        assert_eq!(resolution.rows.len(), fresh.len());
        for (row, segment) in resolution.rows.iter().zip(&fresh) {
            assert_eq!(row.key, segment.key);
            assert_eq!(row.available, segment.available);
            assert_eq!(row.desired, 0);
        }
    }

    #[test]
    fn source_selection_without_import() {
        assert!(matches!(DesiredSource::from_import(None, Some(40)), DesiredSource::Proportional(40)));
        assert!(matches!(DesiredSource::from_import(None, None), DesiredSource::ZeroFilled));

        let import = Ok(Vec::new());
        assert!(matches!(
            DesiredSource::from_import(Some(&import), Some(40)),
            DesiredSource::Imported(entries) if entries.is_empty()
        ));
    }

    #[test]
    fn filtered_out_imports_survive_resolution() {
        let mut people = repeated("Norte", "C2", 25, "F", 5);
        people.extend(repeated("Sur", "C2", 25, "F", 5));
        let roster = roster(people);
        let filters = Filters {
            zones: Some(["Norte".to_string()].into_iter().collect()),
            ..Filters::default()
        };
        let imported = vec![
            QuotaEntry {
                zone: "Norte".into(),
                gse: "C2".into(),
                age_range: "18-34".into(),
                gender: "F".into(),
                desired: 2,
            },
            QuotaEntry {
                zone: "Sur".into(),
                gse: "C2".into(),
                age_range: "18-34".into(),
                gender: "F".into(),
                desired: 3,
            },
        ];

        let resolution = resolve_quotas(
            &roster,
            &filters,
            DesiredSource::Imported(&imported),
            &QuotaSettings::default(),
        );

        let rows: Vec<(&str, u32, u32)> = resolution
            .rows
            .iter()
            .map(|row| (row.key.zone.as_str(), row.available, row.desired))
            .collect();
        assert_eq!(rows, vec![("Norte", 5, 2), ("Sur", 0, 0)]);
        assert_eq!(resolution.shortfalls.len(), 1);
        assert_eq!(resolution.shortfalls[0].requested, 3);
    }
}

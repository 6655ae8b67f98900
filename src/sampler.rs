use crate::error::SampleError;
use crate::models::{total_desired, QuotaRow, Respondent, SegmentKey, Shortfall};
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct SampledRecord {
    pub stratum: String,
    pub respondent: Respondent,
}

#[derive(Debug, Clone)]
pub struct Sample {
    pub records: Vec<SampledRecord>,
    /// Segments that could not supply their full quota
    pub shortfalls: Vec<Shortfall>,
}

impl Sample {
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Draw every segment's quota without replacement, then shuffle the whole
/// sample. Each segment draw and the final shuffle use a fresh RNG seeded
/// with `seed`, so identical inputs always give an identical sample.
pub fn draw_sample(
    population: &[&Respondent],
    rows: &[QuotaRow],
    seed: u64,
) -> Result<Sample, SampleError> {
    if total_desired(rows) == 0 {
        return Err(SampleError::NothingRequested);
    }

    let mut members: HashMap<SegmentKey, Vec<&Respondent>> = HashMap::new();
    for &respondent in population {
        if let Some(key) = respondent.segment_key() {
            members.entry(key).or_default().push(respondent);
        }
    }

    let mut records = Vec::new();
    let mut shortfalls = Vec::new();
    for row in rows.iter().filter(|row| row.desired > 0) {
        let pool = members.get(&row.key).map(Vec::as_slice).unwrap_or(&[]);
        let wanted = row.desired as usize;
        if wanted > pool.len() {
            log::warn!(
                "segment {}/{}/{}/{} requested {} but only {} available",
                row.key.zone,
                row.key.gse,
                row.key.age_range,
                row.key.gender,
                wanted,
                pool.len()
            );
            shortfalls.push(Shortfall {
                key: row.key.clone(),
                requested: row.desired,
                available: pool.len() as u32,
            });
        }

        let amount = wanted.min(pool.len());
        if amount == 0 {
            continue;
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let stratum = row.key.stratum();
        for idx in index::sample(&mut rng, pool.len(), amount) {
            records.push(SampledRecord {
                stratum: stratum.clone(),
                respondent: pool[idx].clone(),
            });
        }
    }

    if records.is_empty() {
        return Err(SampleError::EmptySample);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    records.shuffle(&mut rng);
    log::debug!("drew {} records across {} segments", records.len(), rows.len());

    Ok(Sample { records, shortfalls })
}

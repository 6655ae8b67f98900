//! Stratified splitting of a sample into `N` disjoint parts.
//!
//! Step `i` holds out `1/(N-i)` of the remaining pool, stratified by the
//! stratum key, as part `i`. Whatever is left after step `N-2` is the last
//! part. Strata with fewer members than parts simply skip some parts.

use crate::error::SplitError;
use crate::sampler::SampledRecord;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

pub fn stratified_split(
    sample: Vec<SampledRecord>,
    parts: usize,
    seed: u64,
) -> Result<Vec<Vec<SampledRecord>>, SplitError> {
    if parts == 0 {
        return Err(SplitError::NoParts);
    }

    let mut result = Vec::with_capacity(parts);
    let mut pool = sample;
    for step in 0..parts - 1 {
        let strata: Vec<&str> = pool.iter().map(|r| r.stratum.as_str()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mask = holdout_mask(&strata, parts - step, &mut rng);

        let (held, rest): (Vec<_>, Vec<_>) = pool
            .into_iter()
            .zip(mask)
            .partition(|(_, held)| *held);
        log::debug!("part {}: {} records, {} left", step + 1, held.len(), rest.len());

        result.push(held.into_iter().map(|(record, _)| record).collect());
        pool = rest.into_iter().map(|(record, _)| record).collect();
    }
    result.push(pool);

    Ok(result)
}

/// Mark `ceil(len / divisor)` positions, allocated across strata in
/// proportion to their size. Each stratum first gets `floor(count / divisor)`;
/// the remaining slots go to the largest remainders, then to larger strata,
/// then to strata seen first.
fn holdout_mask(strata: &[&str], divisor: usize, rng: &mut ChaCha8Rng) -> Vec<bool> {
    let mut order: Vec<&str> = Vec::new();
    let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
    for (pos, &stratum) in strata.iter().enumerate() {
        positions
            .entry(stratum)
            .or_insert_with(|| {
                order.push(stratum);
                Vec::new()
            })
            .push(pos);
    }

    let target = strata.len().div_ceil(divisor);
    let mut quotas: Vec<(usize, usize, usize)> = order
        .iter()
        .enumerate()
        .map(|(rank, stratum)| {
            let count = positions[stratum].len();
            (rank, count / divisor, count % divisor)
        })
        .collect();

    let assigned: usize = quotas.iter().map(|&(_, base, _)| base).sum();
    let mut by_remainder: Vec<usize> = (0..quotas.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let (rank_a, _, rem_a) = quotas[a];
        let (rank_b, _, rem_b) = quotas[b];
        rem_b
            .cmp(&rem_a)
            .then_with(|| positions[order[b]].len().cmp(&positions[order[a]].len()))
            .then_with(|| rank_a.cmp(&rank_b))
    });
    for &idx in by_remainder.iter().take(target.saturating_sub(assigned)) {
        if quotas[idx].2 > 0 {
            quotas[idx].1 += 1;
        }
    }

    let mut mask = vec![false; strata.len()];
    for (rank, quota, _) in quotas {
        let mut members = positions[order[rank]].clone();
        members.shuffle(rng);
        for pos in members.into_iter().take(quota) {
            mask[pos] = true;
        }
    }
    mask
}

//! Quota resolution: turns availability plus requested counts into the final
//! per-segment desired table.
//!
//! Steps run in a fixed order: cap to availability, minimum cap, maximum cap,
//! global rules, and a final cap to availability. Global rules are applied
//! once each, in the order given, against the desired total at that moment.
//! A later rule can undo an earlier one; there is no fixed-point iteration.
//! Wherever cases are added or removed, segments are visited in table order.

use crate::models::{
    total_desired, GlobalRule, QuotaEntry, QuotaRow, RuleKind, Segment, SegmentKey, Shortfall,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct QuotaSettings {
    /// 0 disables the cap
    pub minimum_cap: u32,
    /// 0 disables the cap
    pub maximum_cap: u32,
    pub rules: Vec<GlobalRule>,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub rows: Vec<QuotaRow>,
    /// Requests that exceeded availability before capping
    pub shortfalls: Vec<Shortfall>,
}

impl Resolution {
    pub fn total_desired(&self) -> u32 {
        total_desired(&self.rows)
    }
}

/// Every segment with `desired = 0`. Fallback when no usable import exists.
pub fn zero_filled(segments: &[Segment]) -> Vec<QuotaRow> {
    segments
        .iter()
        .map(|segment| QuotaRow {
            key: segment.key.clone(),
            available: segment.available,
            desired: 0,
        })
        .collect()
}

/// Join imported desired counts onto fresh availability by exact key.
/// Segments absent from the import get 0; duplicated import keys keep the first.
pub fn merge_desired(segments: &[Segment], imported: &[QuotaEntry]) -> Vec<QuotaRow> {
    let mut requested: HashMap<SegmentKey, u32> = HashMap::with_capacity(imported.len());
    for entry in imported {
        requested.entry(entry.key()).or_insert(entry.desired);
    }

    segments
        .iter()
        .map(|segment| QuotaRow {
            key: segment.key.clone(),
            available: segment.available,
            desired: requested.get(&segment.key).copied().unwrap_or(0),
        })
        .collect()
}

/// Spread `total` over segments proportionally to availability using the
/// largest-remainder method. Ties go to the earlier row.
pub fn allocate_proportional(segments: &[Segment], total: u32) -> Vec<QuotaRow> {
    let mut rows = zero_filled(segments);
    let pool: u64 = segments.iter().map(|s| u64::from(s.available)).sum();
    if pool == 0 || total == 0 {
        return rows;
    }
    if u64::from(total) >= pool {
        for row in &mut rows {
            row.desired = row.available;
        }
        return rows;
    }

    let total = u64::from(total);
    let mut remainders = Vec::with_capacity(rows.len());
    let mut assigned = 0u64;
    for (idx, row) in rows.iter_mut().enumerate() {
        let share = total * u64::from(row.available);
        let floor = share / pool;
        row.desired = floor as u32;
        assigned += floor;
        remainders.push((idx, share % pool));
    }

    // stable sort keeps table order among equal remainders
    remainders.sort_by(|a, b| b.1.cmp(&a.1));
    let leftover = (total - assigned) as usize;
    for &(idx, _) in remainders.iter().take(leftover) {
        rows[idx].desired += 1;
    }

    rows
}

pub fn find_shortfalls(rows: &[QuotaRow]) -> Vec<Shortfall> {
    rows.iter()
        .filter(|row| row.desired > row.available)
        .map(|row| Shortfall {
            key: row.key.clone(),
            requested: row.desired,
            available: row.available,
        })
        .collect()
}

pub fn cap_to_available(rows: &mut [QuotaRow]) {
    for row in rows {
        row.desired = row.desired.min(row.available);
    }
}

/// Raise segments that can supply `minimum` cases up to it. Smaller segments
/// are left as they are.
pub fn apply_minimum_cap(rows: &mut [QuotaRow], minimum: u32) {
    if minimum == 0 {
        return;
    }
    for row in rows.iter_mut().filter(|row| row.available >= minimum) {
        row.desired = row.desired.max(minimum).min(row.available);
    }
}

pub fn apply_maximum_cap(rows: &mut [QuotaRow], maximum: u32) {
    if maximum == 0 {
        return;
    }
    for row in rows {
        row.desired = row.desired.min(maximum);
    }
}

/// Apply one global percentage rule. Returns false when the rule was skipped
/// because its variable, kind or percentage is not usable.
pub fn apply_rule(rows: &mut [QuotaRow], rule: &GlobalRule) -> bool {
    let (Some(dimension), Some(kind)) = (rule.dimension(), rule.rule_kind()) else {
        log::debug!("skipping rule {:?}: unknown variable or kind", rule);
        return false;
    };
    if !rule.has_valid_percentage() {
        log::debug!("skipping rule {:?}: percentage out of range", rule);
        return false;
    }

    let total = f64::from(total_desired(rows));
    let target = (rule.percentage / 100.0 * total).round_ties_even() as i64;
    let current: i64 = rows
        .iter()
        .filter(|row| row.key.value(dimension) == rule.value)
        .map(|row| i64::from(row.desired))
        .sum();
    let delta = target - current;

    let matching = rows
        .iter_mut()
        .filter(|row| row.key.value(dimension) == rule.value);

    match kind {
        RuleKind::Minimum if delta > 0 => {
            let mut remaining = delta as u32;
            for row in matching {
                if remaining == 0 {
                    break;
                }
                let take = remaining.min(row.available.saturating_sub(row.desired));
                row.desired += take;
                remaining -= take;
            }
            if remaining > 0 {
                log::info!(
                    "rule {}={} minimum {}%: {} cases could not be placed",
                    rule.variable,
                    rule.value,
                    rule.percentage,
                    remaining
                );
            }
        }
        RuleKind::Maximum if delta < 0 => {
            let mut remaining = delta.unsigned_abs() as u32;
            for row in matching {
                if remaining == 0 {
                    break;
                }
                let give = remaining.min(row.desired);
                row.desired -= give;
                remaining -= give;
            }
        }
        _ => {}
    }

    true
}

pub fn apply_rules(rows: &mut [QuotaRow], rules: &[GlobalRule]) {
    for rule in rules {
        apply_rule(rows, rule);
    }
}

/// Run the full resolution pipeline on a merged table.
pub fn resolve(mut rows: Vec<QuotaRow>, settings: &QuotaSettings) -> Resolution {
    let shortfalls = find_shortfalls(&rows);

    cap_to_available(&mut rows);
    apply_minimum_cap(&mut rows, settings.minimum_cap);
    apply_maximum_cap(&mut rows, settings.maximum_cap);
    apply_rules(&mut rows, &settings.rules);
    cap_to_available(&mut rows);

    Resolution { rows, shortfalls }
}

use crate::models::{total_desired, Dimension, GlobalRule, QuotaRow, Shortfall};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const REPORT_FILE_NAME: &str = "reporte.txt";

const BAR_WIDTH: usize = 40;

pub struct ReportData<'a> {
    pub rows: &'a [QuotaRow],
    pub rules: &'a [GlobalRule],
    pub shortfalls: &'a [Shortfall],
    pub part_sizes: &'a [usize],
    pub seed: u64,
}

/// (available, desired) per value of one dimension, sorted by value.
pub fn totals_by(rows: &[QuotaRow], dimension: Dimension) -> BTreeMap<String, (u32, u32)> {
    let mut totals: BTreeMap<String, (u32, u32)> = BTreeMap::new();
    for row in rows {
        let entry = totals.entry(row.key.value(dimension).to_string()).or_default();
        entry.0 += row.available;
        entry.1 += row.desired;
    }
    totals
}

fn bar(value: u32, max: u32) -> String {
    if max == 0 {
        return String::new();
    }
    let width = (u64::from(value) * BAR_WIDTH as u64).div_ceil(u64::from(max)) as usize;
    "█".repeat(width)
}

pub fn render_report(data: &ReportData<'_>) -> String {
    let mut content = String::new();
    content.push_str("Sample Frame Report\n");
    content.push_str("===================\n\n");

    let available: u32 = data.rows.iter().map(|row| row.available).sum();
    content.push_str(&format!(
        "Segments: {}\n\
        Available respondents: {}\n\
        Desired sample size: {}\n\
        Parts: {} ({})\n\
        Seed: {}\n\n",
        data.rows.len(),
        available,
        total_desired(data.rows),
        data.part_sizes.len(),
        data.part_sizes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" / "),
        data.seed,
    ));

    content.push_str("Totals per zone\n");
    content.push_str("---------------\n");
    for (zone, (available, desired)) in totals_by(data.rows, Dimension::Zone) {
        content.push_str(&format!("{:<20} available: {:>6}  desired: {:>6}\n", zone, available, desired));
    }
    content.push('\n');

    content.push_str("Global rules\n");
    content.push_str("------------\n");
    if data.rules.is_empty() {
        content.push_str("(none)\n");
    }
    for (i, rule) in data.rules.iter().enumerate() {
        content.push_str(&format!(
            "{}. {} = {} : {} {}%{}\n",
            i + 1,
            rule.variable,
            rule.value,
            rule.kind,
            rule.percentage,
            if rule.is_usable() { "" } else { " (ignored)" }
        ));
    }
    content.push('\n');

    if !data.shortfalls.is_empty() {
        content.push_str("Shortfalls\n");
        content.push_str("----------\n");
        for shortfall in data.shortfalls {
            content.push_str(&format!(
                "{} / {} / {} / {}: requested {}, available {}\n",
                shortfall.key.zone,
                shortfall.key.gse,
                shortfall.key.age_range,
                shortfall.key.gender,
                shortfall.requested,
                shortfall.available
            ));
        }
        content.push('\n');
    }

    for dimension in Dimension::ALL {
        let totals = totals_by(data.rows, dimension);
        let max = totals.values().map(|&(_, desired)| desired).max().unwrap_or(0);
        content.push_str(&format!("Desired by {}\n", dimension.column()));
        for (value, (_, desired)) in totals {
            content.push_str(&format!("{:<20} {:>6} {}\n", value, desired, bar(desired, max)));
        }
        content.push('\n');
    }

    content
}

pub fn write_report(output_dir: &Path, data: &ReportData<'_>) -> Result<()> {
    let path = output_dir.join(REPORT_FILE_NAME);
    fs::write(&path, render_report(data))
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}

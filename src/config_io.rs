//! Import and export of the quota configuration: the "Cuotas" table of
//! per-segment desired counts and the "Reglas" table of global rules.
//! Exported files use exactly the columns the importer expects.

use crate::error::ImportError;
use crate::models::{
    GlobalRule, QuotaEntry, QuotaRow, COL_AGE_RANGE, COL_DESIRED, COL_GENDER, COL_GSE, COL_ZONE,
};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub const QUOTA_FILE_NAME: &str = "Cuotas.csv";
pub const RULES_FILE_NAME: &str = "Reglas.csv";

pub const QUOTA_COLUMNS: [&str; 5] = [COL_ZONE, COL_GSE, COL_AGE_RANGE, COL_GENDER, COL_DESIRED];
pub const RULE_COLUMNS: [&str; 4] = ["Variable", "Valor", "Regla", "Porcentaje"];

fn read_table<T, R>(source: R, origin: &str, columns: &[&str]) -> Result<Vec<T>, ImportError>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(source);
    let headers = reader
        .headers()
        .map_err(|source| ImportError::Unreadable {
            path: origin.to_string(),
            source,
        })?
        .clone();

    let missing: Vec<String> = columns
        .iter()
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns {
            path: origin.to_string(),
            missing,
        });
    }

    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| {
            row.map_err(|source| ImportError::MalformedRow {
                path: origin.to_string(),
                row: i + 1,
                source,
            })
        })
        .collect()
}

pub fn read_quota_table<R: Read>(source: R, origin: &str) -> Result<Vec<QuotaEntry>, ImportError> {
    read_table(source, origin, &QUOTA_COLUMNS)
}

pub fn read_rules_table<R: Read>(source: R, origin: &str) -> Result<Vec<GlobalRule>, ImportError> {
    read_table(source, origin, &RULE_COLUMNS)
}

fn open(path: &Path) -> Result<File, ImportError> {
    File::open(path).map_err(|e| ImportError::Unreadable {
        path: path.display().to_string(),
        source: e.into(),
    })
}

pub fn load_quota_table(path: &Path) -> Result<Vec<QuotaEntry>, ImportError> {
    read_quota_table(open(path)?, &path.display().to_string())
}

pub fn load_rules_table(path: &Path) -> Result<Vec<GlobalRule>, ImportError> {
    read_rules_table(open(path)?, &path.display().to_string())
}

fn write_table<T, W>(sink: W, columns: &[&str], rows: impl IntoIterator<Item = T>) -> csv::Result<()>
where
    T: Serialize,
    W: Write,
{
    // Headers are written by hand so an empty table still carries them.
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(sink);
    writer.write_record(&StringRecord::from(columns.to_vec()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_quota_table<W: Write>(sink: W, rows: &[QuotaRow]) -> csv::Result<()> {
    write_table(sink, &QUOTA_COLUMNS, rows.iter().map(QuotaEntry::from))
}

pub fn write_rules_table<W: Write>(sink: W, rules: &[GlobalRule]) -> csv::Result<()> {
    write_table(sink, &RULE_COLUMNS, rules)
}

pub fn export_config(output_dir: &Path, rows: &[QuotaRow], rules: &[GlobalRule]) -> Result<()> {
    let quota_path = output_dir.join(QUOTA_FILE_NAME);
    let file = File::create(&quota_path)
        .with_context(|| format!("Failed to create file: {}", quota_path.display()))?;
    write_quota_table(file, rows)?;

    let rules_path = output_dir.join(RULES_FILE_NAME);
    let file = File::create(&rules_path)
        .with_context(|| format!("Failed to create file: {}", rules_path.display()))?;
    write_rules_table(file, rules)?;

    Ok(())
}

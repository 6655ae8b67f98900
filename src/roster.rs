use crate::age_ranges::{classify_label, AgeRange};
use crate::error::RosterError;
use crate::models::{Respondent, Roster, COL_AGE, COL_GENDER, COL_GSE, COL_ZONE, REQUIRED_COLUMNS};
use csv::{ReaderBuilder, StringRecord, Trim, Writer};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

struct ColumnIndex {
    zone: usize,
    gse: usize,
    age: usize,
    gender: usize,
}

impl ColumnIndex {
    fn locate(headers: &StringRecord) -> Result<Self, RosterError> {
        let find = |name: &str| headers.iter().position(|h| h == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| find(**name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(RosterError::MissingColumns(missing));
        }

        let index = |name: &str| find(name).unwrap_or_default();
        Ok(Self {
            zone: index(COL_ZONE),
            gse: index(COL_GSE),
            age: index(COL_AGE),
            gender: index(COL_GENDER),
        })
    }
}

pub fn load_roster(path: &Path, ranges: &[AgeRange]) -> Result<Roster, RosterError> {
    let file = File::open(path)?;
    read_roster(file, ranges)
}

/// Read roster rows and attach the age-range label of every respondent.
pub fn read_roster<R: Read>(source: R, ranges: &[AgeRange]) -> Result<Roster, RosterError> {
    let mut reader = ReaderBuilder::new().trim(Trim::Headers).from_reader(source);
    let headers = reader.headers()?.clone();
    let columns = ColumnIndex::locate(&headers)?;

    let mut respondents = Vec::new();
    let mut bad_ages = 0usize;
    for row in reader.records() {
        let fields = row?;
        let cell = |i: usize| fields.get(i).unwrap_or("").trim().to_string();

        let age = parse_age(fields.get(columns.age).unwrap_or(""));
        if age.is_none() {
            bad_ages += 1;
        }
        let age_range = age.and_then(|age| classify_label(age, ranges));

        respondents.push(Respondent {
            zone: cell(columns.zone),
            gse: cell(columns.gse),
            age,
            gender: cell(columns.gender),
            age_range,
            fields,
        });
    }

    if bad_ages > 0 {
        log::warn!("{} rows have a non-numeric {} and were left unclassified", bad_ages, COL_AGE);
    }
    log::debug!("read {} roster rows", respondents.len());

    Ok(Roster { headers, respondents })
}

/// Respondents with a readable age that falls outside every range.
pub fn out_of_range_count(roster: &Roster) -> usize {
    roster
        .respondents
        .iter()
        .filter(|r| r.age.is_some() && r.age_range.is_none())
        .count()
}

// Spreadsheet exports often render integer ages as "34.0".
fn parse_age(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && value.fract() == 0.0)
            .map(|value| value as i64)
    })
}

/// Write respondents with the roster's original columns, in order.
pub fn write_respondents<'a, W, I>(sink: W, headers: &StringRecord, respondents: I) -> csv::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a Respondent>,
{
    let mut writer = Writer::from_writer(sink);
    writer.write_record(headers)?;
    let mut written = 0;
    for respondent in respondents {
        writer.write_record(&respondent.fields)?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

pub fn save_respondents<'a, I>(path: &Path, headers: &StringRecord, respondents: I) -> csv::Result<usize>
where
    I: IntoIterator<Item = &'a Respondent>,
{
    let file = File::create(path)?;
    write_respondents(file, headers, respondents)
}

//! In-memory roster builders shared by the unit tests.

use crate::age_ranges::{classify_label, parse_age_ranges};
use crate::models::{Respondent, Roster};
use csv::StringRecord;

pub const TEST_RANGES: &str = "18-34,35-60";

pub fn respondent(zone: &str, gse: &str, age: i64, gender: &str) -> Respondent {
    let ranges = parse_age_ranges(TEST_RANGES);
    let age_text = age.to_string();
    Respondent {
        zone: zone.to_string(),
        gse: gse.to_string(),
        age: Some(age),
        gender: gender.to_string(),
        age_range: classify_label(age, &ranges),
        fields: StringRecord::from(vec![zone, gse, age_text.as_str(), gender]),
    }
}

pub fn roster(respondents: Vec<Respondent>) -> Roster {
    Roster {
        headers: StringRecord::from(vec!["ZONA", "GSE", "EDAD", "NOMBRE_GENERO"]),
        respondents,
    }
}

/// `count` identical respondents of one segment, tagged with an ID column.
pub fn repeated(zone: &str, gse: &str, age: i64, gender: &str, count: usize) -> Vec<Respondent> {
    (0..count)
        .map(|i| {
            let mut r = respondent(zone, gse, age, gender);
            r.fields.push_field(&format!("{zone}-{gender}-{i}"));
            r
        })
        .collect()
}

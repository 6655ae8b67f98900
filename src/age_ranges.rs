use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Closed age interval `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub start: u32,
    pub end: u32,
}

impl AgeRange {
    pub fn contains(&self, age: i64) -> bool {
        i64::from(self.start) <= age && age <= i64::from(self.end)
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AgeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"^([0-9]+)-([0-9]+)$").expect("static pattern"))
}

/// Parse "start-end" tokens separated by commas, keeping input order.
/// Tokens that are not two plain integers with start < end are dropped.
pub fn parse_age_ranges(text: &str) -> Vec<AgeRange> {
    text.split(',')
        .filter_map(|token| {
            let caps = token_regex().captures(token.trim())?;
            let start = caps[1].parse::<u32>().ok()?;
            let end = caps[2].parse::<u32>().ok()?;
            (start < end).then_some(AgeRange { start, end })
        })
        .collect()
}

/// First range (in configured order) containing `age`.
pub fn classify(age: i64, ranges: &[AgeRange]) -> Option<&AgeRange> {
    ranges.iter().find(|range| range.contains(age))
}

pub fn classify_label(age: i64, ranges: &[AgeRange]) -> Option<String> {
    classify(age, ranges).map(AgeRange::label)
}

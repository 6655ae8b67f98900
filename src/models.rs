use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const COL_ZONE: &str = "ZONA";
pub const COL_GSE: &str = "GSE";
pub const COL_AGE: &str = "EDAD";
pub const COL_GENDER: &str = "NOMBRE_GENERO";
pub const COL_AGE_RANGE: &str = "RANGO_EDAD_CUSTOM";
pub const COL_DESIRED: &str = "Deseados";

pub const REQUIRED_COLUMNS: [&str; 4] = [COL_ZONE, COL_GSE, COL_AGE, COL_GENDER];

pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub input_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<String>,
    /// Comma separated "start-end" tokens, e.g. "18-24,25-34"
    pub age_ranges: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_total: Option<u32>,
    /// 0 disables the cap
    #[serde(default)]
    pub minimum_cap: u32,
    /// 0 disables the cap
    #[serde(default)]
    pub maximum_cap: u32,
    #[serde(default = "default_parts")]
    pub parts: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    // Previously exported quota configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<String>,
    #[serde(default = "default_true")]
    pub export_config: bool,
    #[serde(default)]
    pub filters: Filters,
    /// Applied after any rules loaded from `rules_file`
    #[serde(default)]
    pub rules: Vec<GlobalRule>,
}

fn default_parts() -> usize {
    1
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_file: "data-source/base.csv".to_string(),
            output_directory: Some("output".to_string()),
            age_ranges: "18-24,25-34,35-44,45-54,55-70".to_string(),
            target_total: Some(400),
            minimum_cap: 0,
            maximum_cap: 0,
            parts: 2,
            seed: DEFAULT_SEED,
            quota_file: None,
            rules_file: None,
            export_config: true,
            filters: Filters::default(),
            // Example: at least 40% of the sample from the northern zone
            // [[rules]]
            // Variable = "ZONA"
            // Valor = "Norte"
            // Regla = "Mínimo"
            // Porcentaje = 40.0
            rules: Vec::new(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }
}

/// Active selection per segment dimension. `None` keeps every value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zones: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gses: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_ranges: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genders: Option<BTreeSet<String>>,
}

impl Filters {
    pub fn accepts(&self, key: &SegmentKey) -> bool {
        fn allowed(selection: &Option<BTreeSet<String>>, value: &str) -> bool {
            selection.as_ref().map_or(true, |set| set.contains(value))
        }

        allowed(&self.zones, &key.zone)
            && allowed(&self.gses, &key.gse)
            && allowed(&self.age_ranges, &key.age_range)
            && allowed(&self.genders, &key.gender)
    }
}

/// One roster row. `fields` keeps every original column for export.
#[derive(Debug, Clone, PartialEq)]
pub struct Respondent {
    pub zone: String,
    pub gse: String,
    pub age: Option<i64>,
    pub gender: String,
    pub age_range: Option<String>,
    pub fields: csv::StringRecord,
}

impl Respondent {
    /// Segment of a classified respondent; `None` when no age range matched.
    pub fn segment_key(&self) -> Option<SegmentKey> {
        self.age_range.as_ref().map(|age_range| SegmentKey {
            zone: self.zone.clone(),
            gse: self.gse.clone(),
            age_range: age_range.clone(),
            gender: self.gender.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub headers: csv::StringRecord,
    pub respondents: Vec<Respondent>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentKey {
    pub zone: String,
    pub gse: String,
    pub age_range: String,
    pub gender: String,
}

impl SegmentKey {
    pub fn new(zone: &str, gse: &str, age_range: &str, gender: &str) -> Self {
        Self {
            zone: zone.to_string(),
            gse: gse.to_string(),
            age_range: age_range.to_string(),
            gender: gender.to_string(),
        }
    }

    /// Grouping key used by the stratified splitter
    pub fn stratum(&self) -> String {
        format!("{}|{}|{}|{}", self.zone, self.gse, self.age_range, self.gender)
    }

    pub fn value(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Zone => &self.zone,
            Dimension::Gse => &self.gse,
            Dimension::AgeRange => &self.age_range,
            Dimension::Gender => &self.gender,
        }
    }
}

/// The four segment dimensions, addressed by their column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Zone,
    Gse,
    AgeRange,
    Gender,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Zone,
        Dimension::Gse,
        Dimension::AgeRange,
        Dimension::Gender,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Dimension::Zone => COL_ZONE,
            Dimension::Gse => COL_GSE,
            Dimension::AgeRange => COL_AGE_RANGE,
            Dimension::Gender => COL_GENDER,
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|dimension| dimension.column() == name.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Minimum,
    Maximum,
}

impl RuleKind {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "mínimo" | "minimo" | "min" | "minimum" => Some(RuleKind::Minimum),
            "máximo" | "maximo" | "max" | "maximum" => Some(RuleKind::Maximum),
            _ => None,
        }
    }
}

/// Global percentage-share rule, kept as loaded so it exports unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalRule {
    #[serde(rename = "Variable", alias = "variable")]
    pub variable: String,
    #[serde(rename = "Valor", alias = "value")]
    pub value: String,
    #[serde(rename = "Regla", alias = "kind")]
    pub kind: String,
    #[serde(rename = "Porcentaje", alias = "percentage")]
    pub percentage: f64,
}

impl GlobalRule {
    #[cfg(test)]
    pub fn new(variable: &str, value: &str, kind: &str, percentage: f64) -> Self {
        Self {
            variable: variable.to_string(),
            value: value.to_string(),
            kind: kind.to_string(),
            percentage,
        }
    }

    pub fn dimension(&self) -> Option<Dimension> {
        Dimension::from_column(&self.variable)
    }

    pub fn rule_kind(&self) -> Option<RuleKind> {
        RuleKind::parse(&self.kind)
    }

    pub fn has_valid_percentage(&self) -> bool {
        self.percentage > 0.0 && self.percentage <= 100.0
    }

    /// Whether resolution will apply this rule rather than skip it
    pub fn is_usable(&self) -> bool {
        self.dimension().is_some() && self.rule_kind().is_some() && self.has_valid_percentage()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub key: SegmentKey,
    pub available: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaRow {
    pub key: SegmentKey,
    pub available: u32,
    pub desired: u32,
}

/// Row of an imported or exported "Cuotas" table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaEntry {
    #[serde(rename = "ZONA")]
    pub zone: String,
    #[serde(rename = "GSE")]
    pub gse: String,
    #[serde(rename = "RANGO_EDAD_CUSTOM")]
    pub age_range: String,
    #[serde(rename = "NOMBRE_GENERO")]
    pub gender: String,
    #[serde(rename = "Deseados", deserialize_with = "deserialize_count")]
    pub desired: u32,
}

impl QuotaEntry {
    pub fn key(&self) -> SegmentKey {
        SegmentKey::new(&self.zone, &self.gse, &self.age_range, &self.gender)
    }
}

impl From<&QuotaRow> for QuotaEntry {
    fn from(row: &QuotaRow) -> Self {
        Self {
            zone: row.key.zone.clone(),
            gse: row.key.gse.clone(),
            age_range: row.key.age_range.clone(),
            gender: row.key.gender.clone(),
            desired: row.desired,
        }
    }
}

// Accepts "12" as well as the "12.0" spreadsheets tend to write.
fn deserialize_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    if let Ok(value) = raw.parse::<u32>() {
        return Ok(value);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX) => {
            Ok(value as u32)
        }
        _ => Err(serde::de::Error::custom(format!("invalid count '{raw}'"))),
    }
}

/// A segment asked for more cases than it can supply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub key: SegmentKey,
    pub requested: u32,
    pub available: u32,
}

pub fn total_desired(rows: &[QuotaRow]) -> u32 {
    rows.iter().map(|row| row.desired).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_without_selection_accept_everything() {
        let key = SegmentKey::new("Norte", "C2", "20-33", "F");
        assert!(Filters::default().accepts(&key));
    }

    #[test]
    fn filters_restrict_each_dimension() {
        let filters = Filters {
            zones: Some(["Norte".to_string()].into_iter().collect()),
            genders: Some(["M".to_string()].into_iter().collect()),
            ..Filters::default()
        };
        assert!(filters.accepts(&SegmentKey::new("Norte", "C2", "20-33", "M")));
        assert!(!filters.accepts(&SegmentKey::new("Sur", "C2", "20-33", "M")));
        assert!(!filters.accepts(&SegmentKey::new("Norte", "C2", "20-33", "F")));
    }

    #[test]
    fn rule_kind_accepts_spanish_and_english_labels() {
        assert_eq!(RuleKind::parse("Mínimo"), Some(RuleKind::Minimum));
        assert_eq!(RuleKind::parse(" maximo "), Some(RuleKind::Maximum));
        assert_eq!(RuleKind::parse("minimum"), Some(RuleKind::Minimum));
        assert_eq!(RuleKind::parse("exacto"), None);
    }

    #[test]
    fn dimension_resolves_column_names() {
        assert_eq!(Dimension::from_column("ZONA"), Some(Dimension::Zone));
        assert_eq!(
            Dimension::from_column("RANGO_EDAD_CUSTOM"),
            Some(Dimension::AgeRange)
        );
        assert_eq!(Dimension::from_column("EDAD"), None);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = Config::default();
        config.rules.push(GlobalRule::new("ZONA", "Norte", "Mínimo", 40.0));
        config.filters.zones = Some(["Norte".to_string()].into_iter().collect());

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();

        assert_eq!(parsed.rules, config.rules);
        assert_eq!(parsed.filters, config.filters);
        assert_eq!(parsed.parts, 2);
        assert_eq!(parsed.seed, DEFAULT_SEED);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let parsed: Config =
            toml::from_str("input_file = \"base.csv\"\nage_ranges = \"20-30\"\n").unwrap();
        assert_eq!(parsed.parts, 1);
        assert_eq!(parsed.seed, DEFAULT_SEED);
        assert!(parsed.export_config);
        assert!(parsed.rules.is_empty());
        assert_eq!(parsed.filters, Filters::default());
    }
}

// Dashboard catalog domain model
use super::error::ExportError;
use super::table::{Row, Scalar};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DashboardId {
    Risks,
    Controls,
    Incidents,
    Kris,
}

impl DashboardId {
    pub fn as_str(&self) -> &'static str {
        match self {
            DashboardId::Risks => "risks",
            DashboardId::Controls => "controls",
            DashboardId::Incidents => "incidents",
            DashboardId::Kris => "kris",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DashboardId::Risks => "Risks",
            DashboardId::Controls => "Controls",
            DashboardId::Incidents => "Incidents",
            DashboardId::Kris => "KRIs",
        }
    }
}

impl FromStr for DashboardId {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "risks" => Ok(DashboardId::Risks),
            "controls" => Ok(DashboardId::Controls),
            "incidents" => Ok(DashboardId::Incidents),
            "kris" => Ok(DashboardId::Kris),
            _ => Err(ExportError::invalid(format!("unknown dashboard '{}'", s))),
        }
    }
}

impl fmt::Display for DashboardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnSpec {
    pub key: String,
    pub label: String,
}

/// Row predicate selecting a card's slice of the dashboard records.
///
/// The first non-null field among `fields` is inspected. Numeric values are
/// checked against `min`/`max` when either bound is set; text values are
/// matched case-insensitively against `contains`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CardFilter {
    pub fields: Vec<String>,
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl CardFilter {
    pub fn matches(&self, row: &Row) -> bool {
        let Some(value) = self
            .fields
            .iter()
            .filter_map(|f| row.get(f))
            .find(|v| !v.is_null())
        else {
            return false;
        };

        let bounded = self.min.is_some() || self.max.is_some();
        if bounded {
            if let Some(n) = value.as_number() {
                return self.min.is_none_or(|min| n >= min) && self.max.is_none_or(|max| n <= max);
            }
        }

        if !self.contains.is_empty() {
            let text = match value {
                Scalar::Text(s) => s.to_lowercase(),
                other => other.display().to_lowercase(),
            };
            return self.contains.iter().any(|needle| text.contains(&needle.to_lowercase()));
        }

        !bounded
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CardDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub filter: Option<CardFilter>,
    /// Chart ids rendered for this card, in order.
    #[serde(default)]
    pub charts: Vec<String>,
}

impl CardDefinition {
    pub fn answers_to(&self, name: &str) -> bool {
        let name = name.trim();
        self.id.eq_ignore_ascii_case(name) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    /// Cards without a filter cover every record.
    pub fn includes(&self, row: &Row) -> bool {
        self.filter.as_ref().is_none_or(|f| f.matches(row))
    }
}

fn default_date_field() -> String {
    "created_at".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DashboardDefinition {
    pub id: DashboardId,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Key holding the record list in the upstream response object.
    #[serde(default)]
    pub records_key: Option<String>,
    #[serde(default = "default_date_field")]
    pub date_field: String,
    /// Display columns for record tables; empty means "use upstream columns".
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub cards: Vec<CardDefinition>,
    /// Aggregate chart ids, in order.
    #[serde(default)]
    pub charts: Vec<String>,
}

impl DashboardDefinition {
    pub fn card(&self, name: &str) -> Option<&CardDefinition> {
        self.cards.iter().find(|c| c.answers_to(name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DashboardCatalog {
    #[serde(default)]
    pub dashboards: Vec<DashboardDefinition>,
}

impl DashboardCatalog {
    pub fn new(dashboards: Vec<DashboardDefinition>) -> Self {
        Self { dashboards }
    }

    pub fn get(&self, id: DashboardId) -> Option<&DashboardDefinition> {
        self.dashboards.iter().find(|d| d.id == id)
    }
}

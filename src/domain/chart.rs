// Chart domain models
use super::error::ExportError;
use super::table::ResultTable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Pie,
    Line,
    Area,
    Scatter,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Pie => "pie",
            ChartType::Line => "line",
            ChartType::Area => "area",
            ChartType::Scatter => "scatter",
        }
    }
}

impl FromStr for ChartType {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bar" | "column" => Ok(ChartType::Bar),
            "pie" | "doughnut" => Ok(ChartType::Pie),
            "line" => Ok(ChartType::Line),
            "area" => Ok(ChartType::Area),
            "scatter" => Ok(ChartType::Scatter),
            _ => Err(ExportError::UnsupportedChartType(s.to_string())),
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_x_field() -> String {
    "name".to_string()
}

fn default_y_field() -> String {
    "value".to_string()
}

/// A registered chart: a query template plus how to plot its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartDefinition {
    pub id: String,
    pub name: String,
    pub chart_type: ChartType,
    /// Query template; `${dateFilter}` is replaced with the request's range.
    pub query: String,
    #[serde(default = "default_x_field")]
    pub x_field: String,
    #[serde(default = "default_y_field")]
    pub y_field: String,
}

impl ChartDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, chart_type: ChartType, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            chart_type,
            query: query.into(),
            x_field: default_x_field(),
            y_field: default_y_field(),
        }
    }

    pub fn validate(&self) -> Result<(), ExportError> {
        if self.id.trim().is_empty() {
            return Err(ExportError::invalid("chart id must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(ExportError::invalid(format!("chart '{}' has no name", self.id)));
        }
        if self.query.trim().is_empty() {
            return Err(ExportError::invalid(format!("chart '{}' has no query", self.id)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub name: String,
    pub value: f64,
}

/// Points extracted from an aliased table, plus how many rows were unusable.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub points: Vec<ChartPoint>,
    pub dropped: usize,
}

impl ChartSeries {
    pub fn from_table(table: &ResultTable) -> Self {
        let mut points = Vec::with_capacity(table.len());
        let mut dropped = 0;

        for row in &table.rows {
            let name = row.get("name").filter(|v| !v.is_null()).map(|v| v.display());
            let value = row.get("value").and_then(|v| v.as_number());
            match (name, value) {
                (Some(name), Some(value)) => points.push(ChartPoint { name, value }),
                _ => dropped += 1,
            }
        }

        Self { points, dropped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chart_type_parsing() {
        assert_eq!("Pie".parse::<ChartType>().unwrap(), ChartType::Pie);
        assert_eq!("column".parse::<ChartType>().unwrap(), ChartType::Bar);
        let err = "radar".parse::<ChartType>().unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedChartType(ref t) if t == "radar"));
    }

    #[test]
    fn test_definition_defaults_fields_on_deserialize() {
        let def: ChartDefinition = serde_json::from_value(json!({
            "id": "by_status",
            "name": "By Status",
            "chart_type": "pie",
            "query": "SELECT status AS name, COUNT(*) AS value FROM dbo.Risks WHERE 1=1 ${dateFilter}"
        }))
        .unwrap();
        assert_eq!(def.x_field, "name");
        assert_eq!(def.y_field, "value");
        assert_eq!(def.chart_type, ChartType::Pie);
    }

    #[test]
    fn test_series_counts_dropped_rows() {
        let table = ResultTable::from_json_objects(&[
            json!({"name": "A", "value": 10}),
            json!({"name": "B"}),
            json!({"value": 3}),
            json!({"name": "C", "value": "2"}),
        ])
        .unwrap();
        let series = ChartSeries::from_table(&table);
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[1], ChartPoint { name: "C".to_string(), value: 2.0 });
        assert_eq!(series.dropped, 2);
    }
}

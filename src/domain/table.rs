// Tabular query results
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Scalar {
    /// Convert an upstream JSON value. ISO dates (optionally with a time
    /// component) become `Date`; nested values are kept as their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Text(if *b { "Yes" } else { "No" }.to_string()),
            Value::Number(n) => n.as_f64().map(Scalar::Number).unwrap_or(Scalar::Null),
            Value::String(s) => match parse_iso_date(s) {
                Some(date) => Scalar::Date(date),
                None => Scalar::Text(s.clone()),
            },
            other => Scalar::Text(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Scalar::Null => true,
            Scalar::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric view, accepting numeric text such as `"12"` or `"3.5"`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) if n.is_finite() => Some(*n),
            Scalar::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Plain display text without locale formatting.
    pub fn display(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Text(s) => s.clone(),
            Scalar::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Scalar::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.len() < 10 || !s.is_char_boundary(10) {
        return None;
    }
    let (head, tail) = s.split_at(10);
    if !(tail.is_empty() || tail.starts_with('T') || tail.starts_with(' ')) {
        return None;
    }
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

pub type Row = IndexMap<String, Scalar>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
    Date,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Build from JSON objects; columns are ordered by first appearance.
    pub fn from_json_objects(objects: &[Value]) -> Option<Self> {
        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(objects.len());

        for object in objects {
            let map = object.as_object()?;
            let mut row = Row::with_capacity(map.len());
            for (key, value) in map {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
                row.insert(key.clone(), Scalar::from_json(value));
            }
            rows.push(row);
        }

        Some(Self { columns, rows })
    }

    /// Build from a column list plus positional value rows.
    pub fn from_columns_and_values(columns: Vec<String>, values: &[Vec<Value>]) -> Self {
        let rows = values
            .iter()
            .map(|value_row| {
                columns
                    .iter()
                    .zip(value_row.iter())
                    .map(|(column, value)| (column.clone(), Scalar::from_json(value)))
                    .collect::<Row>()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn filtered<F>(&self, predicate: F) -> Self
    where
        F: Fn(&Row) -> bool,
    {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| predicate(r)).cloned().collect(),
        }
    }

    /// Project `x_field`/`y_field` onto `name`/`value`. Rows lacking a field
    /// simply omit the aliased key.
    pub fn aliased(&self, x_field: &str, y_field: &str) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut aliased = Row::with_capacity(2);
                if let Some(name) = row.get(x_field).filter(|v| !v.is_null()) {
                    aliased.insert("name".to_string(), name.clone());
                }
                if let Some(value) = row.get(y_field).filter(|v| !v.is_null()) {
                    aliased.insert("value".to_string(), value.clone());
                }
                aliased
            })
            .collect();
        Self {
            columns: vec!["name".to_string(), "value".to_string()],
            rows,
        }
    }

    /// Infer a display kind from the non-null cells of a column.
    pub fn column_kind(&self, column: &str) -> ColumnKind {
        let mut kind: Option<ColumnKind> = None;
        for value in self.rows.iter().filter_map(|r| r.get(column)) {
            let cell_kind = match value {
                Scalar::Null => continue,
                Scalar::Text(s) if s.trim().is_empty() => continue,
                Scalar::Text(_) => return ColumnKind::Text,
                Scalar::Number(_) => ColumnKind::Number,
                Scalar::Date(_) => ColumnKind::Date,
            };
            match kind {
                None => kind = Some(cell_kind),
                Some(k) if k != cell_kind => return ColumnKind::Text,
                _ => {}
            }
        }
        kind.unwrap_or(ColumnKind::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_objects_orders_columns_by_first_appearance() {
        let objects = vec![
            json!({"code": "R-1", "score": 5}),
            json!({"code": "R-2", "owner": "Ops", "created_at": "2024-03-01T10:00:00Z"}),
        ];
        let table = ResultTable::from_json_objects(&objects).unwrap();
        assert_eq!(table.columns, vec!["code", "score", "owner", "created_at"]);
        assert_eq!(
            table.rows[1].get("created_at"),
            Some(&Scalar::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
        );
    }

    #[test]
    fn test_aliased_drops_missing_fields() {
        let objects = vec![
            json!({"department_name": "Ops", "total": 4}),
            json!({"department_name": "IT"}),
        ];
        let table = ResultTable::from_json_objects(&objects).unwrap();
        let aliased = table.aliased("department_name", "total");
        assert_eq!(aliased.rows[0].get("value"), Some(&Scalar::Number(4.0)));
        assert!(aliased.rows[1].get("value").is_none());
        assert_eq!(aliased.rows[1].get("name"), Some(&Scalar::Text("IT".to_string())));
    }

    #[test]
    fn test_column_kind() {
        let objects = vec![
            json!({"n": 1, "d": "2024-01-02", "t": "x", "m": 3}),
            json!({"n": null, "d": "2024-01-03", "t": "y", "m": "three"}),
        ];
        let table = ResultTable::from_json_objects(&objects).unwrap();
        assert_eq!(table.column_kind("n"), ColumnKind::Number);
        assert_eq!(table.column_kind("d"), ColumnKind::Date);
        assert_eq!(table.column_kind("t"), ColumnKind::Text);
        assert_eq!(table.column_kind("m"), ColumnKind::Text);
    }

    #[test]
    fn test_scalar_display_and_number() {
        assert_eq!(Scalar::Number(12.0).display(), "12");
        assert_eq!(Scalar::Number(1.5).display(), "1.5");
        assert_eq!(Scalar::Text(" 7 ".to_string()).as_number(), Some(7.0));
        assert!(Scalar::Text("  ".to_string()).is_null());
    }
}

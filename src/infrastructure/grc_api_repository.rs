// GRC upstream API repository implementation
use crate::application::report_repository::ReportRepository;
use crate::domain::dashboard::DashboardDefinition;
use crate::domain::error::ExportError;
use crate::domain::request::DateRange;
use crate::domain::table::ResultTable;
use crate::infrastructure::config::{prepare_query, UpstreamSettings};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Keys tried, after the dashboard's own records key, for the record list.
const RECORD_KEYS: [&str; 4] = ["records", "items", "list", "data"];

#[derive(Debug, Clone)]
pub struct GrcApiRepository {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    records_path: String,
    query_path: String,
}

impl GrcApiRepository {
    pub fn new(settings: &UpstreamSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone().filter(|t| !t.is_empty()),
            records_path: settings.records_path.clone(),
            query_path: settings.query_path.clone(),
        })
    }

    fn records_url(&self, dashboard: &DashboardDefinition) -> String {
        let mut vars = HashMap::new();
        vars.insert("dashboard".to_string(), dashboard.id.to_string());
        format!("{}{}", self.base_url, prepare_query(&self.records_path, &vars))
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Value, ExportError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() { "timed out" } else { "request failed" };
                ExportError::DataUnavailable(format!("upstream {}: {}", reason, e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExportError::DataUnavailable(format!(
                "upstream returned status {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let data = response
            .json::<Value>()
            .await
            .map_err(|e| ExportError::DataUnavailable(format!("failed to parse upstream response: {}", e)))?;

        // Check for errors in the response
        if let Some(error) = data.get("error").filter(|e| !matches!(e, Value::Null | Value::Bool(false))) {
            let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            return Err(ExportError::DataUnavailable(format!("upstream error: {}", message)));
        }

        Ok(data)
    }
}

/// Locate the record list in an upstream payload.
pub fn records_table(payload: &Value, records_key: Option<&str>) -> Option<ResultTable> {
    extract(payload, records_key, 2)
}

fn extract(payload: &Value, records_key: Option<&str>, depth: usize) -> Option<ResultTable> {
    match payload {
        Value::Array(items) => ResultTable::from_json_objects(items),
        Value::Object(map) => {
            if let (Some(Value::Array(columns)), Some(Value::Array(rows))) = (map.get("columns"), map.get("rows")) {
                let columns: Option<Vec<String>> = columns.iter().map(|c| c.as_str().map(str::to_string)).collect();
                let rows: Option<Vec<Vec<Value>>> = rows.iter().map(|r| r.as_array().cloned()).collect();
                return Some(ResultTable::from_columns_and_values(columns?, &rows?));
            }
            if depth == 0 {
                return None;
            }
            records_key
                .into_iter()
                .chain(RECORD_KEYS)
                .filter_map(|key| map.get(key))
                .find_map(|nested| extract(nested, records_key, depth - 1))
        }
        _ => None,
    }
}

#[async_trait]
impl ReportRepository for GrcApiRepository {
    async fn dashboard_records(
        &self,
        dashboard: &DashboardDefinition,
        range: &DateRange,
    ) -> Result<ResultTable, ExportError> {
        let mut params = Vec::with_capacity(2);
        if let Some(start) = range.start {
            params.push(("startDate", start.to_string()));
        }
        if let Some(end) = range.end {
            params.push(("endDate", end.to_string()));
        }

        let url = self.records_url(dashboard);
        tracing::debug!(url = %url, ?params, "fetching dashboard records");
        let payload = self.execute(self.client.get(&url).query(&params)).await?;

        records_table(&payload, dashboard.records_key.as_deref()).ok_or_else(|| {
            ExportError::DataUnavailable(format!(
                "upstream response for '{}' has no recognizable record list",
                dashboard.id
            ))
        })
    }

    async fn run_query(&self, query: &str) -> Result<ResultTable, ExportError> {
        let url = format!("{}{}", self.base_url, self.query_path);
        let payload = self.execute(self.client.post(&url).json(&json!({ "query": query }))).await?;

        records_table(&payload, None)
            .ok_or_else(|| ExportError::DataUnavailable("query response has no recognizable rows".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dashboard::DashboardId;
    use crate::domain::table::Scalar;
    use chrono::NaiveDate;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: &str) -> UpstreamSettings {
        UpstreamSettings {
            base_url: format!("{}/", base_url),
            token: Some("secret".to_string()),
            records_path: "/api/grc/${dashboard}".to_string(),
            query_path: "/api/query".to_string(),
            timeout_secs: 1,
            connect_timeout_secs: 1,
        }
    }

    fn risks() -> DashboardDefinition {
        DashboardDefinition {
            id: DashboardId::Risks,
            title: "Risks".to_string(),
            subtitle: None,
            records_key: Some("allRisks".to_string()),
            date_field: "createdAt".to_string(),
            columns: vec![],
            cards: vec![],
            charts: vec![],
        }
    }

    #[test]
    fn test_records_table_shapes() {
        let nested = json!({"allRisks": [{"code": "R-1"}], "records": [{"code": "other"}]});
        let table = records_table(&nested, Some("allRisks")).unwrap();
        assert_eq!(table.rows[0].get("code"), Some(&Scalar::Text("R-1".to_string())));

        let wrapped = json!({"data": {"items": [{"code": "R-2"}, {"code": "R-3"}]}});
        assert_eq!(records_table(&wrapped, None).unwrap().len(), 2);

        let columnar = json!({"columns": ["name", "value"], "rows": [["A", 10], ["B", 5]]});
        let table = records_table(&columnar, None).unwrap();
        assert_eq!(table.columns, vec!["name", "value"]);
        assert_eq!(table.rows[1].get("value"), Some(&Scalar::Number(5.0)));

        assert!(records_table(&json!({"total": 3}), None).is_none());
        assert!(records_table(&json!([1, 2]), None).is_none());
    }

    #[tokio::test]
    async fn test_dashboard_records_passes_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/grc/risks"))
            .and(query_param("startDate", "2024-01-01"))
            .and(query_param("endDate", "2024-01-31"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "allRisks": [
                    {"code": "R-1", "createdAt": "2024-01-05T08:00:00Z"},
                    {"code": "R-2", "createdAt": "2024-01-20T08:00:00Z"}
                ]
            })))
            .mount(&server)
            .await;

        let repository = GrcApiRepository::new(&settings(&server.uri())).unwrap();
        let range = DateRange::new(NaiveDate::from_ymd_opt(2024, 1, 1), NaiveDate::from_ymd_opt(2024, 1, 31)).unwrap();
        let table = repository.dashboard_records(&risks(), &range).await.unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.rows[0].get("createdAt"),
            Some(&Scalar::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()))
        );
    }

    #[tokio::test]
    async fn test_run_query_posts_expanded_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/query"))
            .and(body_json(json!({"query": "SELECT 1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "A", "value": 1}])))
            .mount(&server)
            .await;

        let repository = GrcApiRepository::new(&settings(&server.uri())).unwrap();
        let table = repository.run_query("SELECT 1").await.unwrap();
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_data_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/grc/risks"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "Invalid column name"})))
            .mount(&server)
            .await;

        let repository = GrcApiRepository::new(&settings(&server.uri())).unwrap();
        let status = repository.dashboard_records(&risks(), &DateRange::default()).await.unwrap_err();
        assert!(matches!(status, ExportError::DataUnavailable(ref m) if m.contains("500")));

        let payload = repository.run_query("SELECT bad").await.unwrap_err();
        assert!(matches!(payload, ExportError::DataUnavailable(ref m) if m.contains("Invalid column name")));
    }

    #[tokio::test]
    async fn test_timeout_is_data_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_millis(1500)),
            )
            .mount(&server)
            .await;

        let repository = GrcApiRepository::new(&settings(&server.uri())).unwrap();
        let err = repository.dashboard_records(&risks(), &DateRange::default()).await.unwrap_err();
        assert_eq!(err.kind(), crate::domain::error::ErrorKind::DataUnavailable);
    }
}

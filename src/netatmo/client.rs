use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::{Client, StatusCode, header::ACCEPT};
use serde::Deserialize;
use tracing::debug;

use crate::netatmo::{AccessToken, MeasurePoint, MeasurementType};

pub const DEFAULT_BASE_URL: &str = "https://api.netatmo.com";

const MEASURE_SCALE: &str = "30min";

#[derive(Debug, thiserror::Error)]
pub enum MeasureError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status code {status}")]
    Status { status: u16 },

    #[error("failed to parse getmeasure body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected getmeasure body: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy)]
pub struct MeasureRequest<'a> {
    pub device_id: &'a str,

    pub measurement: &'a MeasurementType,

    /// `None` asks for the full history.
    pub date_begin: Option<i64>,
}

impl MeasureRequest<'_> {
    pub fn query(&self) -> [(&'static str, String); 6] {
        let date_begin = match self.date_begin {
            Some(ts) => ts.to_string(),
            None => "null".to_string(),
        };

        [
            ("device_id", self.device_id.to_string()),
            ("scale", MEASURE_SCALE.to_string()),
            ("type", self.measurement.to_string()),
            ("date_begin", date_begin),
            ("optimize", "false".to_string()),
            ("real_time", "true".to_string()),
        ]
    }
}

#[async_trait]
pub trait MeasureApi: Send + Sync {
    async fn get_measure(
        &self,
        token: &AccessToken,
        request: &MeasureRequest<'_>,
    ) -> Result<Vec<MeasurePoint>, MeasureError>;
}

#[derive(Debug, Clone)]
pub struct NetatmoClient {
    client: Client,
    base_url: String,
}

impl NetatmoClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(super) fn http(&self) -> &Client {
        &self.client
    }

    pub(super) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl MeasureApi for NetatmoClient {
    async fn get_measure(
        &self,
        token: &AccessToken,
        request: &MeasureRequest<'_>,
    ) -> Result<Vec<MeasurePoint>, MeasureError> {
        debug!(
            device_id = request.device_id,
            measurement = %request.measurement,
            date_begin = ?request.date_begin,
            "requesting measurements"
        );

        let response = self
            .client
            .get(self.endpoint("/api/getmeasure"))
            .bearer_auth(token.as_str())
            .header(ACCEPT, "application/json")
            .query(&request.query())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(MeasureError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        parse_measure_body(&body)
    }
}

#[derive(Debug, Deserialize)]
struct MeasureResponse {
    body: MeasureBody,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MeasureBody {
    Series(IndexMap<String, Vec<Option<f64>>>),
    // The API answers `"body": []` when the range holds no data.
    Empty(Vec<serde_json::Value>),
}

/// Decodes `{"body": {"<unix_ts>": [<value>, ...], ...}}`, keeping only the first value.
pub fn parse_measure_body(body: &str) -> Result<Vec<MeasurePoint>, MeasureError> {
    let response: MeasureResponse = serde_json::from_str(body)?;

    let series = match response.body {
        MeasureBody::Series(series) => series,
        MeasureBody::Empty(values) if values.is_empty() => return Ok(Vec::new()),
        MeasureBody::Empty(_) => {
            return Err(MeasureError::Decode(
                "expected an object keyed by timestamp".to_string(),
            ));
        }
    };

    series
        .into_iter()
        .map(|(timestamp, values)| -> Result<MeasurePoint, MeasureError> {
            let timestamp = timestamp
                .parse::<i64>()
                .map_err(|_| MeasureError::Decode(format!("invalid timestamp: {timestamp}")))?;

            Ok(MeasurePoint {
                timestamp,
                value: values.first().copied().flatten(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_measure_body() {
        let body = r#"{"body": {"1704067200": [21.5], "1704069000": [22], "1704070800": [null]}, "status": "ok"}"#;
        let points = parse_measure_body(body).unwrap();

        assert_eq!(
            points,
            vec![
                MeasurePoint {
                    timestamp: 1704067200,
                    value: Some(21.5),
                },
                MeasurePoint {
                    timestamp: 1704069000,
                    value: Some(22.0),
                },
                MeasurePoint {
                    timestamp: 1704070800,
                    value: None,
                },
            ]
        );
    }

    #[test]
    fn test_parse_measure_body_keeps_first_value() {
        let points = parse_measure_body(r#"{"body": {"100": [1.0, 2.0]}}"#).unwrap();
        assert_eq!(points[0].value, Some(1.0));
    }

    #[test]
    fn test_parse_measure_body_empty() {
        assert!(parse_measure_body(r#"{"body": []}"#).unwrap().is_empty());
        assert!(parse_measure_body(r#"{"body": {}}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_measure_body_rejects_bad_timestamp() {
        let result = parse_measure_body(r#"{"body": {"yesterday": [1.0]}}"#);
        assert!(matches!(result, Err(MeasureError::Decode(_))));
    }

    #[test]
    fn test_parse_measure_body_rejects_missing_body() {
        let result = parse_measure_body(r#"{"error": {"code": 2}}"#);
        assert!(matches!(result, Err(MeasureError::Json(_))));
    }

    #[test]
    fn test_query_uses_null_without_begin() {
        let measurement: MeasurementType = "co2".parse().unwrap();
        let request = MeasureRequest {
            device_id: "70:ee:50:aa:bb:cc",
            measurement: &measurement,
            date_begin: None,
        };

        let query = request.query();
        assert!(query.contains(&("date_begin", "null".to_string())));
        assert!(query.contains(&("type", "co2".to_string())));
        assert!(query.contains(&("scale", "30min".to_string())));
        assert!(query.contains(&("optimize", "false".to_string())));
        assert!(query.contains(&("real_time", "true".to_string())));
    }

    #[test]
    fn test_query_with_begin() {
        let measurement: MeasurementType = "temperature".parse().unwrap();
        let request = MeasureRequest {
            device_id: "70:ee:50:aa:bb:cc",
            measurement: &measurement,
            date_begin: Some(1704067200),
        };

        assert!(
            request
                .query()
                .contains(&("date_begin", "1704067200".to_string()))
        );
    }

    #[test]
    fn test_client_normalizes_url() {
        let client = NetatmoClient::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }
}

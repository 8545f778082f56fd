//! Open-Meteo daily forecast client.
//!
//! Requests a single-day window with the daily minimum relative humidity
//! and daily maximum 10 m wind speed:
//!
//! ```text
//! GET {base_url}?latitude=..&longitude=..
//!     &daily=relative_humidity_2m_min,wind_speed_10m_max
//!     &wind_speed_unit=kmh&forecast_days=1&timezone=auto
//! ```
//!
//! See <https://open-meteo.com/en/docs>

use std::time::Duration;

use async_trait::async_trait;
use geoalert_risk_models::{Point, WeatherObservation};

use crate::{ClimateConfig, ClimateError, WeatherSource};

const DAILY_VARIABLES: &str = "relative_humidity_2m_min,wind_speed_10m_max";

/// Fetches observations from an Open-Meteo compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenMeteoClient {
    /// Builds a client with the configured per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &ClimateConfig) -> Result<Self, ClimateError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    fn id(&self) -> &str {
        "open_meteo"
    }

    async fn fetch(&self, point: &Point) -> Result<WeatherObservation, ClimateError> {
        let latitude = point.latitude.to_string();
        let longitude = point.longitude.to_string();

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("daily", DAILY_VARIABLES),
                ("wind_speed_unit", "kmh"),
                ("forecast_days", "1"),
                ("timezone", "auto"),
            ])
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        interpret_response(status, &text)
    }
}

/// Turns a raw response into an observation.
///
/// An `{"error": true}` body wins over the status code. A non-JSON body on
/// a failed request is reported by its status.
fn interpret_response(
    status: reqwest::StatusCode,
    text: &str,
) -> Result<WeatherObservation, ClimateError> {
    let body = serde_json::from_str::<serde_json::Value>(text);

    if let Some(reason) = body.as_ref().ok().and_then(error_reason) {
        return Err(ClimateError::Api { reason });
    }
    if !status.is_success() {
        return Err(ClimateError::Status {
            status: status.as_u16(),
        });
    }

    let body = body.map_err(|e| ClimateError::Parse {
        message: format!("response is not JSON: {e}"),
    })?;
    parse_daily(&body)
}

/// The `reason` of an `{"error": true, "reason": ...}` body.
fn error_reason(body: &serde_json::Value) -> Option<String> {
    if body.get("error").and_then(serde_json::Value::as_bool) != Some(true) {
        return None;
    }
    Some(
        body.get("reason")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unspecified")
            .to_string(),
    )
}

/// Extracts the first day's humidity and wind from a forecast body.
///
/// `null` or missing values become `None`.
///
/// # Errors
///
/// Returns [`ClimateError::Parse`] if the body has no `daily` object.
pub fn parse_daily(body: &serde_json::Value) -> Result<WeatherObservation, ClimateError> {
    let daily = body
        .get("daily")
        .filter(|d| d.is_object())
        .ok_or_else(|| ClimateError::Parse {
            message: "response missing 'daily' object".to_string(),
        })?;

    let first = |key: &str| {
        daily
            .pointer(&format!("/{key}/0"))
            .and_then(serde_json::Value::as_f64)
            .filter(|v| v.is_finite())
    };

    Ok(WeatherObservation {
        humidity_min: first("relative_humidity_2m_min"),
        wind_max_kmh: first("wind_speed_10m_max"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_first_day() {
        let body = json!({
            "latitude": -31.375,
            "longitude": -64.5,
            "daily_units": { "relative_humidity_2m_min": "%", "wind_speed_10m_max": "km/h" },
            "daily": {
                "time": ["2025-10-05"],
                "relative_humidity_2m_min": [18],
                "wind_speed_10m_max": [42.3]
            }
        });
        let obs = parse_daily(&body).unwrap();
        assert_eq!(obs.humidity_min, Some(18.0));
        assert_eq!(obs.wind_max_kmh, Some(42.3));
    }

    #[test]
    fn null_and_missing_values_are_absent() {
        let body = json!({
            "daily": {
                "time": ["2025-10-05"],
                "relative_humidity_2m_min": [null]
            }
        });
        let obs = parse_daily(&body).unwrap();
        assert_eq!(obs, WeatherObservation::default());
    }

    #[test]
    fn missing_daily_is_a_parse_error() {
        let err = parse_daily(&json!({ "hourly": {} })).unwrap_err();
        assert!(matches!(err, ClimateError::Parse { .. }));
    }

    #[test]
    fn error_body_reason_is_extracted() {
        let body = json!({ "error": true, "reason": "Latitude must be in range of -90 to 90°." });
        assert_eq!(
            error_reason(&body).as_deref(),
            Some("Latitude must be in range of -90 to 90°.")
        );
        assert_eq!(error_reason(&json!({ "daily": {} })), None);
    }

    #[test]
    fn html_error_page_reports_status() {
        let page = "<html><body><h1>503 Service Temporarily Unavailable</h1></body></html>";
        let err = interpret_response(reqwest::StatusCode::SERVICE_UNAVAILABLE, page).unwrap_err();
        assert!(matches!(err, ClimateError::Status { status: 503 }));
    }

    #[test]
    fn api_error_body_wins_over_status() {
        let body = r#"{"error": true, "reason": "Cannot initialize WeatherVariable"}"#;
        let err = interpret_response(reqwest::StatusCode::BAD_REQUEST, body).unwrap_err();
        assert!(
            matches!(err, ClimateError::Api { reason } if reason == "Cannot initialize WeatherVariable")
        );
    }

    #[test]
    fn non_json_success_is_a_parse_error() {
        let err = interpret_response(reqwest::StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, ClimateError::Parse { .. }));

        let obs = interpret_response(
            reqwest::StatusCode::OK,
            r#"{"daily": {"relative_humidity_2m_min": [25], "wind_speed_10m_max": [12.5]}}"#,
        )
        .unwrap();
        assert_eq!(obs.humidity_min, Some(25.0));
    }
}

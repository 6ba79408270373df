use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::id_from_number_or_string;

/// Limits enforced by the backend on `PUT /catches/:id`; checked locally so a
/// bad edit never leaves the device.
const WEIGHT_RANGE_KG: (f64, f64) = (0.0, 999.999);
const LENGTH_RANGE_CM: (f64, f64) = (0.0, 999.99);
const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Catch ID is required")]
    MissingCatchId,

    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
    },
}

/// One entry of the personal catch log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchRecord {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: String,
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detections: Option<Value>,
    #[serde(default)]
    pub catch_date: String,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub length_cm: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "memo_or_empty")]
    pub memo: String,
}

fn memo_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_zero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

impl CatchRecord {
    /// Fill the gaps the list endpoint leaves: a missing date becomes `today`,
    /// zero measurements and coordinates become absent.
    pub fn normalized(mut self, today: &str) -> Self {
        if self.catch_date.is_empty() {
            self.catch_date = today.to_string();
        }
        self.weight_kg = non_zero(self.weight_kg);
        self.length_cm = non_zero(self.length_cm);
        self.latitude = non_zero(self.latitude);
        self.longitude = non_zero(self.longitude);
        self
    }
}

/// Body of `POST /catches`
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewCatch {
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detections: Option<Value>,
    pub catch_date: String,
}

/// Edit of an existing catch. The id travels in the path, not the body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatchUpdate {
    #[serde(skip)]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catch_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detections: Option<Value>,
}

fn check_range(
    field: &'static str,
    value: Option<f64>,
    (min, max): (f64, f64),
) -> Result<(), ValidationError> {
    match value {
        Some(v) if !(min..=max).contains(&v) => Err(ValidationError::OutOfRange { field, min, max }),
        _ => Ok(()),
    }
}

impl CatchUpdate {
    /// Check the edit locally and return the id it targets
    pub fn validate(&self) -> Result<&str, ValidationError> {
        let id = self
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(ValidationError::MissingCatchId)?;

        check_range("Weight", self.weight_kg, WEIGHT_RANGE_KG)?;
        check_range("Length", self.length_cm, LENGTH_RANGE_CM)?;
        check_range("Latitude", self.latitude, LATITUDE_RANGE)?;
        check_range("Longitude", self.longitude, LONGITUDE_RANGE)?;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catch_with_numeric_id() {
        let json = r#"{"id": 42, "imageUrl": "/uploads/a.jpg", "detections": null, "catch_date": "2024-05-01", "weight_kg": 1.25, "length_cm": null, "latitude": 35.1, "longitude": 129.0, "memo": null}"#;
        let record: CatchRecord = serde_json::from_str(json).expect("catch json");
        assert_eq!(record.id, "42");
        assert_eq!(record.image_url.as_deref(), Some("/uploads/a.jpg"));
        assert_eq!(record.weight_kg, Some(1.25));
        assert_eq!(record.memo, "");
    }

    #[test]
    fn test_normalized_fills_defaults() {
        let json = r#"{"id": "7", "weight_kg": 0, "latitude": 0.0}"#;
        let record: CatchRecord = serde_json::from_str(json).expect("catch json");
        let record = record.normalized("2024-06-02");

        assert_eq!(record.catch_date, "2024-06-02");
        assert_eq!(record.weight_kg, None);
        assert_eq!(record.latitude, None);
        assert_eq!(record.memo, "");
    }

    #[test]
    fn test_update_requires_id() {
        let update = CatchUpdate::default();
        assert_eq!(update.validate(), Err(ValidationError::MissingCatchId));

        let update = CatchUpdate {
            id: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(update.validate(), Err(ValidationError::MissingCatchId));
    }

    #[test]
    fn test_update_range_checks() {
        let mut update = CatchUpdate {
            id: Some("3".to_string()),
            weight_kg: Some(12.5),
            ..Default::default()
        };
        assert_eq!(update.validate(), Ok("3"));

        update.latitude = Some(91.0);
        let err = update.validate().unwrap_err();
        assert_eq!(err.to_string(), "Latitude must be between -90 and 90");
    }

    #[test]
    fn test_update_body_skips_id() {
        let update = CatchUpdate {
            id: Some("3".to_string()),
            memo: Some("chilly morning".to_string()),
            ..Default::default()
        };
        let body = serde_json::to_value(&update).expect("serialize");
        assert_eq!(body, serde_json::json!({"memo": "chilly morning"}));
    }
}

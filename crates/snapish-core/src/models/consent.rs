use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether the user agreed to AI analysis of their photos
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsentRecord {
    #[serde(rename = "hasConsent", default)]
    pub has_consent: bool,
    #[serde(rename = "lastConsentDate", default)]
    pub last_consent_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsentUpdate {
    pub consent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_consent_check() {
        let json = r#"{"hasConsent": true, "lastConsentDate": "2024-04-01T09:30:00Z"}"#;
        let record: ConsentRecord = serde_json::from_str(json).expect("consent json");
        assert!(record.has_consent);
        assert!(record.last_consent_date.is_some());

        let empty: ConsentRecord = serde_json::from_str("{}").expect("empty json");
        assert_eq!(empty, ConsentRecord::default());
    }
}

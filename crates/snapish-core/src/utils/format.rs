/// Truncate a string to a maximum number of characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional string, returning a default if None
pub fn format_optional(value: &Option<String>, default: &str) -> String {
    value.as_deref().unwrap_or(default).to_string()
}

/// Format a measurement with its unit, or a dash when absent
pub fn format_measure(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{} {}", trim_decimal(v), unit),
        None => "-".to_string(),
    }
}

fn trim_decimal(v: f64) -> String {
    let s = format!("{:.3}", v);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Format a date string to a more readable format
pub fn format_date(date: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date) {
        dt.format("%b %d, %Y").to_string()
    } else if let Ok(day) = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        day.format("%b %d, %Y").to_string()
    } else {
        date.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("감성돔 낚시", 5), "감성...");
    }

    #[test]
    fn test_format_measure() {
        assert_eq!(format_measure(Some(1.25), "kg"), "1.25 kg");
        assert_eq!(format_measure(Some(42.0), "cm"), "42 cm");
        assert_eq!(format_measure(None, "kg"), "-");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2024-05-01T09:30:00Z"), "May 01, 2024");
        assert_eq!(format_date("2024-05-01"), "May 01, 2024");
        assert_eq!(format_date("yesterday"), "yesterday");
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id_from_number_or_string;

/// A community board post. Only `post_id` matters to the client; everything
/// else is carried through for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub post_id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Post {
    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostsResponse {
    #[serde(default)]
    pub posts: Vec<Post>,
}

/// Headline shown on the home screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotIssue {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
}

impl HotIssue {
    fn new(id: u32, title: &str, content: &str, author: &str, at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            timestamp: Some(at),
            author: Some(author.to_string()),
            image_url: Some(format!("https://picsum.photos/800/600?random={}", id)),
        }
    }

    /// Headlines shown when the backend has none to offer, newest first
    pub fn default_list(now: DateTime<Utc>) -> Vec<HotIssue> {
        vec![
            Self::new(
                1,
                "Today's fishing report",
                "West coast report: black porgy and rockfish are biting well.",
                "Angler King",
                now,
            ),
            Self::new(
                2,
                "Weekend weather outlook",
                "Good fishing weather this weekend with low waves and clear skies.",
                "Weather Desk",
                now - Duration::hours(2),
            ),
            Self::new(
                3,
                "Closed seasons",
                "Check this year's closed seasons for the main species.",
                "Fisheries Office",
                now - Duration::hours(4),
            ),
        ]
    }
}

/// Entry of the home-screen service directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub id: i64,
    pub name: String,
    pub icon: String,
    pub route: String,
}

impl ServiceEntry {
    fn new(id: i64, name: &str, icon: &str, route: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            icon: icon.to_string(),
            route: route.to_string(),
        }
    }

    /// Directory used when `/api/services` is unreachable
    pub fn default_directory() -> Vec<ServiceEntry> {
        vec![
            Self::new(1, "Tide Info", "/icons/tide.png", "/map-location-service"),
            Self::new(2, "Weather", "/icons/weather.png", "/map-location-service"),
            Self::new(3, "My Records", "/icons/record.png", "/catches"),
            Self::new(4, "Community", "/icons/community.png", "/community"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_posts_response_keeps_extra_fields() {
        let json = r#"{"posts": [{"post_id": 9, "title": "Sea bream at Geoje", "likes": 3}]}"#;
        let resp: PostsResponse = serde_json::from_str(json).expect("posts json");
        assert_eq!(resp.posts.len(), 1);

        let post = &resp.posts[0];
        assert_eq!(post.post_id, "9");
        assert_eq!(post.title(), Some("Sea bream at Geoje"));
        assert_eq!(post.fields.get("likes"), Some(&Value::from(3)));
    }

    #[test]
    fn test_default_hot_issues_are_newest_first() {
        let now = Utc::now();
        let issues = HotIssue::default_list(now);
        assert_eq!(issues.len(), 3);
        assert_eq!(issues[0].timestamp, Some(now));
        assert!(issues.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
        assert_eq!(
            issues[2].image_url.as_deref(),
            Some("https://picsum.photos/800/600?random=3")
        );
    }

    #[test]
    fn test_default_directory_routes() {
        let services = ServiceEntry::default_directory();
        assert_eq!(services.len(), 4);
        assert_eq!(services[2].route, "/catches");
    }
}

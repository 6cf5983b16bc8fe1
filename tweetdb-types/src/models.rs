use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Custom serde module for DateTime to ensure RFC3339 string format
mod datetime_format {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = date.to_rfc3339();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<DateTime<Utc>>().map_err(serde::de::Error::custom)
    }
}

/// A status object as delivered on the filtered stream.
///
/// Only the fields the ingester reads are declared; everything else in the
/// payload is ignored during decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawStatus {
    pub id: i64,
    pub user: RawUser,
    #[serde(default)]
    pub text: Option<String>,
    /// Set when `text` was cut short and the full body lives in `extended_tweet`
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub extended_tweet: Option<ExtendedTweet>,
    #[serde(default)]
    pub entities: Option<Entities>,
    pub created_at: String,
    #[serde(default)]
    pub lang: Option<String>,
    /// Present (and non-null) only on retweets
    #[serde(default)]
    pub retweeted_status: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawUser {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub followers_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedTweet {
    pub full_text: String,
    pub entities: Entities,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub hashtags: Vec<HashtagEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashtagEntity {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub author_id: i64,
    pub display_name: String,
    pub follower_count: i64,
}

/// Body of a post, taken from exactly one branch of the raw status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PostContent {
    Standard { text: String, hashtags: Vec<String> },
    Extended { text: String, hashtags: Vec<String> },
}

impl PostContent {
    pub fn text(&self) -> &str {
        match self {
            PostContent::Standard { text, .. } | PostContent::Extended { text, .. } => text,
        }
    }

    pub fn hashtags(&self) -> &[String] {
        match self {
            PostContent::Standard { hashtags, .. } | PostContent::Extended { hashtags, .. } => {
                hashtags
            }
        }
    }

    pub fn is_extended(&self) -> bool {
        matches!(self, PostContent::Extended { .. })
    }
}

/// Normalized, flat view of one status, ready for filtering and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub post_id: i64,
    pub author: Author,
    pub content: PostContent,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    /// Declared language code (`None` when the stream sent none)
    #[serde(default)]
    pub language: Option<String>,
    pub is_retweet: bool,
}

impl PostRecord {
    pub fn text(&self) -> &str {
        self.content.text()
    }

    pub fn hashtags(&self) -> &[String] {
        self.content.hashtags()
    }
}

/// A post row as read back from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPost {
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

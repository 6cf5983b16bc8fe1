use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use tweetdb_types::{Author, Entities, PostContent, PostRecord, RawStatus};

use crate::error::ExtractError;

/// Timestamp layout used by the stream, e.g. `Wed Oct 10 20:19:24 +0000 2018`
const STREAM_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Turn one raw stream event into a normalized post record
///
/// Text and hashtags come from `extended_tweet` when the status is marked as
/// truncated and from the top-level `text`/`entities` otherwise; the two
/// branches are never mixed. No inclusion filtering happens here, the
/// retweet marker and language are only surfaced.
///
/// # Examples
///
/// ```
/// use tweetdb_ingest::extract::extract;
/// let event = serde_json::json!({
///     "id": 1,
///     "user": {"id": 2, "name": "Ada", "followers_count": 5},
///     "text": "Hello #rust",
///     "truncated": false,
///     "entities": {"hashtags": [{"text": "rust"}]},
///     "created_at": "Wed Oct 10 20:19:24 +0000 2018",
///     "lang": "en"
/// });
/// let record = extract(&event).unwrap();
/// assert_eq!(record.hashtags(), ["rust".to_string()]);
/// ```
pub fn extract(event: &Value) -> Result<PostRecord, ExtractError> {
    let raw = RawStatus::deserialize(event)
        .map_err(|e| ExtractError::MalformedEvent(format!("undecodable status: {e}")))?;
    from_raw(raw)
}

/// Normalize an already decoded status
pub fn from_raw(raw: RawStatus) -> Result<PostRecord, ExtractError> {
    let content = if raw.truncated {
        let extended = raw.extended_tweet.ok_or_else(|| {
            ExtractError::MalformedEvent(format!(
                "status {} is truncated but has no extended_tweet",
                raw.id
            ))
        })?;
        PostContent::Extended {
            text: extended.full_text,
            hashtags: hashtag_texts(extended.entities),
        }
    } else {
        let text = raw.text.ok_or_else(|| {
            ExtractError::MalformedEvent(format!("status {} has no text", raw.id))
        })?;
        let entities = raw.entities.ok_or_else(|| {
            ExtractError::MalformedEvent(format!("status {} has no entities", raw.id))
        })?;
        PostContent::Standard {
            text,
            hashtags: hashtag_texts(entities),
        }
    };

    let created_at = parse_created_at(&raw.created_at).ok_or_else(|| {
        ExtractError::MalformedEvent(format!(
            "status {} has unparseable created_at {:?}",
            raw.id, raw.created_at
        ))
    })?;

    Ok(PostRecord {
        post_id: raw.id,
        author: Author {
            author_id: raw.user.id,
            display_name: raw.user.name,
            follower_count: raw.user.followers_count,
        },
        content,
        created_at,
        language: raw.lang,
        is_retweet: raw.retweeted_status.is_some(),
    })
}

fn hashtag_texts(entities: Entities) -> Vec<String> {
    entities.hashtags.into_iter().map(|tag| tag.text).collect()
}

/// Parse a stream timestamp, falling back to RFC 3339
pub fn parse_created_at(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, STREAM_TIME_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

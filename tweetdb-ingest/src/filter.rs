use tweetdb_types::{PostRecord, Rejection};

/// Default language a post must declare to be stored
pub const DEFAULT_LANGUAGE: &str = "en";

/// Inclusion rules applied to every extracted post
///
/// A post is accepted only when it is not a retweet AND its declared
/// language equals the target language.
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    target_language: String,
}

impl FilterPolicy {
    pub fn new(target_language: impl Into<String>) -> Self {
        Self {
            target_language: target_language.into(),
        }
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn evaluate(&self, record: &PostRecord) -> Result<(), Rejection> {
        if record.is_retweet {
            return Err(Rejection::Retweet);
        }
        if record.language.as_deref() != Some(self.target_language.as_str()) {
            return Err(Rejection::Language {
                found: record.language.clone(),
            });
        }
        Ok(())
    }
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

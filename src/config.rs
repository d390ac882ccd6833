use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// Environment variable overriding [`EngineConfig::max_terms`]
pub const ENV_MAX_TERMS: &str = "PROFILE_MAX_TERMS";

/// Default cap on the number of terms a profile keeps after trimming
pub const DEFAULT_MAX_TERMS: usize = 500;

/// Engine configuration
///
/// Every field has a default, so a partial JSON document is enough:
/// ```
/// use tf_idf_profiler::EngineConfig;
/// let config = EngineConfig::from_json_str(r#"{ "max_terms": 50 }"#).unwrap();
/// assert_eq!(config.max_terms, 50);
/// assert!(config.tokenizer.strip_markup);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// upper bound of `|raw_counts|` after a trim
    pub max_terms: usize,
    pub tokenizer: TokenizerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_terms: DEFAULT_MAX_TERMS,
            tokenizer: TokenizerConfig::default(),
        }
    }
}

/// Tokenizer normalization rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// remove tags and decode entities before splitting
    pub strip_markup: bool,
    /// terms shorter than this (in chars) are dropped
    pub min_term_len: usize,
    /// terms longer than this (in chars) are dropped
    pub max_term_len: usize,
    /// drop terms made only of digits
    pub drop_numeric: bool,
    /// apply the built-in English stopword list
    pub stopwords: bool,
    /// additional stopwords, normalized the same way as terms
    pub extra_stopwords: Vec<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            strip_markup: true,
            min_term_len: 1,
            max_term_len: 64,
            drop_numeric: false,
            stopwords: true,
            extra_stopwords: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document, missing fields fall back to defaults
    pub fn from_json_str(json: &str) -> Result<Self, ProfileError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ProfileError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PROFILE_MAX_TERMS` if it is set
    pub fn with_env_overrides(self) -> Result<Self, ProfileError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// 環境変数の代わりに任意のlookupを使う (テスト用にも)
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ProfileError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_TERMS) {
            self.max_terms = raw.trim().parse().map_err(|_| {
                ProfileError::InvalidConfig(format!("{ENV_MAX_TERMS}={raw:?} is not a count"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.max_terms == 0 {
            return Err(ProfileError::InvalidConfig("max_terms must be at least 1".into()));
        }
        let tok = &self.tokenizer;
        if tok.min_term_len == 0 {
            return Err(ProfileError::InvalidConfig("min_term_len must be at least 1".into()));
        }
        if tok.max_term_len < tok.min_term_len {
            return Err(ProfileError::InvalidConfig(format!(
                "max_term_len ({}) is below min_term_len ({})",
                tok.max_term_len, tok.min_term_len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_terms, DEFAULT_MAX_TERMS);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{ "tokenizer": { "stopwords": false } }"#).unwrap();
        assert_eq!(config.max_terms, DEFAULT_MAX_TERMS);
        assert!(!config.tokenizer.stopwords);
        assert!(config.tokenizer.strip_markup);
    }

    #[test]
    fn zero_cap_is_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "max_terms": 0 }"#).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidConfig(_)));
    }

    #[test]
    fn bad_json_is_invalid_config() {
        let err = EngineConfig::from_json_str("{ max_terms").unwrap_err();
        assert!(matches!(err, ProfileError::InvalidConfig(_)));
    }

    #[test]
    fn env_override_sets_cap() {
        let config = EngineConfig::default()
            .with_overrides_from(|key| (key == ENV_MAX_TERMS).then(|| " 42 ".to_string()))
            .unwrap();
        assert_eq!(config.max_terms, 42);

        let err = EngineConfig::default()
            .with_overrides_from(|_| Some("many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ProfileError::InvalidConfig(_)));
    }
}

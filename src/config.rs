use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub struct Settings {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub session_ttl: Duration,
    pub max_subscribers_per_session: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8080,
            max_upload_bytes: 5 * 1024 * 1024,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            session_ttl: Duration::from_secs(30 * 60),
            max_subscribers_per_session: 30,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from a key lookup, keeping the default for any key
    /// that is missing or does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            max_upload_bytes: parsed(&lookup, "MAX_UPLOAD_BYTES")
                .unwrap_or(defaults.max_upload_bytes),
            openai_api_key: lookup("OPENAI_API_KEY").filter(|key| !key.is_empty()),
            openai_base_url: lookup("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            openai_model: lookup("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            session_ttl: parsed(&lookup, "SESSION_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_ttl),
            max_subscribers_per_session: parsed(&lookup, "MAX_SUBSCRIBERS_PER_SESSION")
                .unwrap_or(defaults.max_subscribers_per_session),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Settings {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings_from(&[]);
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.max_upload_bytes, 5 * 1024 * 1024);
        assert!(settings.openai_api_key.is_none());
        assert_eq!(settings.openai_model, "gpt-4o-mini");
    }

    #[test]
    fn test_overrides() {
        let settings = settings_from(&[
            ("PORT", "3000"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("OPENAI_API_KEY", "sk-test"),
            ("SESSION_TTL_SECS", "60"),
        ]);
        assert_eq!(settings.port, 3000);
        assert_eq!(settings.max_upload_bytes, 1024);
        assert_eq!(settings.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.session_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let settings = settings_from(&[("PORT", "eighty"), ("OPENAI_API_KEY", "")]);
        assert_eq!(settings.port, 8080);
        assert!(settings.openai_api_key.is_none());
    }
}

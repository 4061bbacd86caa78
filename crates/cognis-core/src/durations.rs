//! Serde helpers for human-readable durations (`"30s"`, `"72h"`).

/// Serialize a `Duration` as a humantime string, accepting strings or
/// plain seconds on input.
pub mod humane {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => humantime::parse_duration(&text).map_err(de::Error::custom),
        }
    }
}

/// Like [`humane`], for optional durations.
pub mod humane_option {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => super::humane::serialize(d, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super::humane")] Duration);

        Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(d)| d))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super::humane")]
        timeout: Duration,
    }

    #[test]
    fn test_parses_text_and_seconds() {
        let text: Holder = serde_json::from_str(r#"{"timeout": "72h"}"#).unwrap();
        assert_eq!(text.timeout, Duration::from_secs(72 * 3600));

        let secs: Holder = serde_json::from_str(r#"{"timeout": 30}"#).unwrap();
        assert_eq!(secs.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_serializes_as_text() {
        let json = serde_json::to_string(&Holder {
            timeout: Duration::from_secs(90),
        })
        .unwrap();
        assert_eq!(json, r#"{"timeout":"1m 30s"}"#);
    }

    #[derive(Serialize, Deserialize)]
    struct Optional {
        #[serde(default, with = "super::humane_option")]
        delay: Option<Duration>,
    }

    #[test]
    fn test_optional_duration() {
        let some: Optional = serde_json::from_str(r#"{"delay": "48h"}"#).unwrap();
        assert_eq!(some.delay, Some(Duration::from_secs(48 * 3600)));

        let none: Optional = serde_json::from_str("{}").unwrap();
        assert_eq!(none.delay, None);
        assert_eq!(serde_json::to_string(&none).unwrap(), r#"{"delay":null}"#);
    }

    #[test]
    fn test_rejects_garbage() {
        let result: Result<Holder, _> = serde_json::from_str(r#"{"timeout": "soon"}"#);
        assert!(result.is_err());
    }
}

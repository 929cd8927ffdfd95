use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Market/language code accepted by the keyword endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Cs,
    Sk,
    Pl,
    Hu,
    Ro,
    Gb,
    Us,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::Cs,
        Language::Sk,
        Language::Pl,
        Language::Hu,
        Language::Ro,
        Language::Gb,
        Language::Us,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Cs => "cs",
            Language::Sk => "sk",
            Language::Pl => "pl",
            Language::Hu => "hu",
            Language::Ro => "ro",
            Language::Gb => "gb",
            Language::Us => "us",
        }
    }

    /// All codes, in declaration order
    pub fn codes() -> Vec<&'static str> {
        Self::ALL.iter().map(Language::as_str).collect()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = UnsupportedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.as_str() == s)
            .ok_or_else(|| UnsupportedValue::new("language", s, &Self::codes()))
    }
}

/// Flavour of keyword suggestions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuggestionsType {
    Questions,
    New,
    Trending,
}

impl SuggestionsType {
    pub const ALL: [SuggestionsType; 3] = [
        SuggestionsType::Questions,
        SuggestionsType::New,
        SuggestionsType::Trending,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionsType::Questions => "questions",
            SuggestionsType::New => "new",
            SuggestionsType::Trending => "trending",
        }
    }

    pub fn codes() -> Vec<&'static str> {
        Self::ALL.iter().map(SuggestionsType::as_str).collect()
    }
}

impl fmt::Display for SuggestionsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuggestionsType {
    type Err = UnsupportedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnsupportedValue::new("suggestions type", s, &Self::codes()))
    }
}

/// A value outside one of the fixed enumerations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported {kind}: {value}. Supported values are: {supported}")]
pub struct UnsupportedValue {
    pub kind: &'static str,
    pub value: String,
    pub supported: String,
}

impl UnsupportedValue {
    pub fn new(kind: &'static str, value: impl Into<String>, supported: &[&str]) -> Self {
        Self {
            kind,
            value: value.into(),
            supported: supported.join(", "),
        }
    }
}

/// `status` field of the upstream envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeStatus {
    Success,
    Error,
    /// Missing, non-string, or any other value
    Other(String),
}

/// Upstream response envelope: `{status, data?, message?}`
#[derive(Debug, Clone, PartialEq)]
pub struct ApiEnvelope {
    pub status: EnvelopeStatus,
    pub data: Value,
    pub message: Option<String>,
}

impl ApiEnvelope {
    /// Interpret an arbitrary JSON document as an envelope. Never fails; shapes
    /// that don't match end up with an `Other` status.
    pub fn from_value(value: Value) -> Self {
        let status = match value.get("status") {
            Some(Value::String(s)) if s == "success" => EnvelopeStatus::Success,
            Some(Value::String(s)) if s == "error" => EnvelopeStatus::Error,
            Some(Value::String(s)) => EnvelopeStatus::Other(s.clone()),
            Some(other) => EnvelopeStatus::Other(other.to_string()),
            None => EnvelopeStatus::Other(String::new()),
        };

        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);

        let data = match value {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        };

        Self {
            status,
            data,
            message,
        }
    }
}

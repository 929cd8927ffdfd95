// Keyword research tools backed by the Marketing Miner API

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{
    json_schema_boolean, json_schema_enum, json_schema_object, json_schema_string,
    parse_arguments, Tool, ToolError,
};
use marketing_miner_core::{
    ApiEnvelope, EnvelopeStatus, Language, MarketingMinerClient, SuggestionsQuery,
    SuggestionsType, UnsupportedValue,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

pub const KEYWORD_SUGGESTIONS: &str = "get_keyword_suggestions";
pub const SEARCH_VOLUME_DATA: &str = "get_search_volume_data";

/// Separator between rendered result lines: the two characters `\` and `n`.
pub const LINE_SEPARATOR: &str = "\\n";

pub const UNKNOWN_ERROR: &str = "An unknown error occurred";
pub const NO_SUGGESTIONS: &str = "No data found for this query.";
pub const NO_SEARCH_VOLUME: &str = "No data found for this keyword.";
pub const UNEXPECTED_RESPONSE: &str = "Unexpected response format from the API";

const NOT_AVAILABLE: &str = "N/A";

/// Tool returning keyword suggestions for a seed keyword
pub struct KeywordSuggestionsTool {
    client: MarketingMinerClient,
}

impl KeywordSuggestionsTool {
    pub fn new(client: MarketingMinerClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Default, Deserialize)]
struct KeywordSuggestionsArgs {
    #[serde(default)]
    lang: Option<Value>,
    #[serde(default)]
    keyword: Option<Value>,
    #[serde(default)]
    suggestions_type: Option<Value>,
    #[serde(default)]
    with_keyword_data: Option<Value>,
}

#[async_trait::async_trait]
impl Tool for KeywordSuggestionsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: KEYWORD_SUGGESTIONS.to_string(),
            description: "Get keyword suggestions from the Marketing Miner API".to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "lang": json_schema_enum("Language (cs/sk/pl/hu/ro/gb/us)", &Language::codes()),
                    "keyword": json_schema_string("Keyword to analyze"),
                    "suggestions_type": json_schema_enum(
                        "Type of suggestions (optional)",
                        &SuggestionsType::codes()
                    ),
                    "with_keyword_data": json_schema_boolean(
                        "Include keyword data (optional)",
                        false
                    )
                }),
                vec!["lang", "keyword"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<CallToolResult, ToolError> {
        let args: KeywordSuggestionsArgs = parse_arguments(arguments)?;

        let lang = parse_language(args.lang.as_ref())?;
        let suggestions_type = parse_suggestions_type(args.suggestions_type.as_ref())?;
        let query = SuggestionsQuery {
            lang,
            keyword: args.keyword.as_ref().and_then(scalar_argument),
            suggestions_type,
            with_keyword_data: args.with_keyword_data.as_ref().map(flag_argument),
        };

        info!(tool = KEYWORD_SUGGESTIONS, lang = %lang, "Calling Marketing Miner");
        let text = match self.client.keyword_suggestions(&query).await {
            Ok(envelope) => format_suggestions(&envelope),
            Err(e) => {
                warn!(tool = KEYWORD_SUGGESTIONS, error = %e, "Upstream call failed");
                e.to_string()
            }
        };

        Ok(CallToolResult::text(text))
    }
}

/// Tool returning search volume data for one keyword
pub struct SearchVolumeTool {
    client: MarketingMinerClient,
}

impl SearchVolumeTool {
    pub fn new(client: MarketingMinerClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchVolumeArgs {
    #[serde(default)]
    lang: Option<Value>,
    #[serde(default)]
    keyword: Option<Value>,
}

#[async_trait::async_trait]
impl Tool for SearchVolumeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: SEARCH_VOLUME_DATA.to_string(),
            description: "Get search volume data for a keyword from the Marketing Miner API"
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "lang": json_schema_enum("Language (cs/sk/pl/hu/ro/gb/us)", &Language::codes()),
                    "keyword": json_schema_string("Keyword to analyze")
                }),
                vec!["lang", "keyword"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<CallToolResult, ToolError> {
        let args: SearchVolumeArgs = parse_arguments(arguments)?;

        let lang = parse_language(args.lang.as_ref())?;
        let keyword = args.keyword.as_ref().and_then(scalar_argument);

        info!(tool = SEARCH_VOLUME_DATA, lang = %lang, "Calling Marketing Miner");
        let text = match self
            .client
            .search_volume_data(lang, keyword.as_deref())
            .await
        {
            Ok(envelope) => format_search_volume(&envelope),
            Err(e) => {
                warn!(tool = SEARCH_VOLUME_DATA, error = %e, "Upstream call failed");
                e.to_string()
            }
        };

        Ok(CallToolResult::text(text))
    }
}

fn parse_language(value: Option<&Value>) -> Result<Language, ToolError> {
    match value {
        Some(Value::String(s)) => Ok(s.parse()?),
        other => Err(UnsupportedValue::new("language", describe(other), &Language::codes()).into()),
    }
}

fn parse_suggestions_type(value: Option<&Value>) -> Result<Option<SuggestionsType>, ToolError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.parse()?)),
        other => Err(
            UnsupportedValue::new("suggestions type", describe(other), &SuggestionsType::codes())
                .into(),
        ),
    }
}

fn describe(value: Option<&Value>) -> String {
    value.map_or_else(|| "none".to_string(), Value::to_string)
}

/// Strings pass through, numbers and booleans are stringified, anything else is dropped.
fn scalar_argument(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn flag_argument(value: &Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn field_or_na(item: &Value, field: &str) -> String {
    match item.get(field) {
        None | Some(Value::Null) => NOT_AVAILABLE.to_string(),
        Some(Value::String(s)) if s.is_empty() => NOT_AVAILABLE.to_string(),
        Some(value) => render(value),
    }
}

fn error_message(envelope: &ApiEnvelope) -> String {
    envelope
        .message
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}

/// Render a suggestions envelope as one `Keyword: .. | Search volume: ..` line per keyword.
pub fn format_suggestions(envelope: &ApiEnvelope) -> String {
    match &envelope.status {
        EnvelopeStatus::Error => error_message(envelope),
        EnvelopeStatus::Success => {
            let keywords = envelope
                .data
                .get("keywords")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            if keywords.is_empty() {
                return NO_SUGGESTIONS.to_string();
            }

            keywords
                .iter()
                .map(|item| {
                    let mut parts = vec![format!("Keyword: {}", field_or_na(item, "keyword"))];
                    match item.get("search_volume") {
                        None | Some(Value::Null) => {}
                        Some(volume) => parts.push(format!("Search volume: {}", render(volume))),
                    }
                    parts.join(" | ")
                })
                .collect::<Vec<_>>()
                .join(LINE_SEPARATOR)
        }
        EnvelopeStatus::Other(_) => UNEXPECTED_RESPONSE.to_string(),
    }
}

/// Render the first entry of a search volume envelope; further entries are ignored.
pub fn format_search_volume(envelope: &ApiEnvelope) -> String {
    match &envelope.status {
        EnvelopeStatus::Error => error_message(envelope),
        EnvelopeStatus::Success => {
            let Some(item) = envelope.data.as_array().and_then(|items| items.first()) else {
                return NO_SEARCH_VOLUME.to_string();
            };

            let mut lines = vec![
                format!("Keyword: {}", field_or_na(item, "keyword")),
                format!("Search volume: {}", field_or_na(item, "search_volume")),
            ];

            if let Some(cpc) = item.get("cpc") {
                if let Some(value) = cpc.get("value").filter(|v| v.is_number()) {
                    let currency = cpc
                        .get("currency_code")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    let line = format!("CPC: {} {}", value, currency);
                    lines.push(line.trim_end().to_string());
                }
            }

            lines.join(LINE_SEPARATOR)
        }
        EnvelopeStatus::Other(_) => UNEXPECTED_RESPONSE.to_string(),
    }
}

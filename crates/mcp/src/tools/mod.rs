pub mod keywords;
mod registry;

pub use keywords::{KeywordSuggestionsTool, SearchVolumeTool};
pub use registry::{
    json_schema_boolean, json_schema_enum, json_schema_object, json_schema_string,
    parse_arguments, Tool, ToolError, ToolRegistry,
};

use marketing_miner_core::MarketingMinerClient;
use std::sync::Arc;

/// Registry holding both keyword tools, sharing one upstream client
pub fn keyword_registry(client: MarketingMinerClient) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(KeywordSuggestionsTool::new(client.clone())));
    registry.register(Arc::new(SearchVolumeTool::new(client)));
    registry
}

//! Chart rendering agent output contract
//!
//! The chat agent emits a JSON chart description, usually inside a
//! ```json fence. This module extracts that JSON, validates it against the
//! contract (known chart type, non-empty dimension/measure mappings, a
//! config title) and converts it into a `ChartSpec`. Invalid output is
//! rejected whole; nothing is partially rendered.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use vizql_spec::{ChartConfig, ChartSpec, ChartType, FieldMapping, FilterCondition};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("no JSON object found in agent output")]
    NoJsonFound,

    #[error("agent output is not a valid chart description: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("agent output needs at least one dimension")]
    MissingDimensions,

    #[error("agent output needs at least one measure")]
    MissingMeasures,

    #[error("field mapping is missing field or name")]
    EmptyFieldMapping,

    #[error("config.title is required")]
    MissingTitle,
}

/// A full chart request: the agent output contract, also accepted directly
/// on the render endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRequest {
    #[serde(rename = "type")]
    pub chart_type: ChartType,

    pub data_source: DataSource,

    pub dimensions: Vec<FieldMapping>,
    pub measures: Vec<FieldMapping>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<FieldMapping>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterCondition>,

    #[serde(default)]
    pub config: ChartConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub table: String,

    #[serde(default)]
    pub field: Vec<String>,
}

impl ChartRequest {
    /// Lower the request into the query-layer spec. Query shaping keeps
    /// its defaults (groupBy on, limit 1000, day granularity).
    pub fn to_spec(&self) -> ChartSpec {
        let mut spec = ChartSpec::for_table(&self.data_source.table);
        spec.fields = self.data_source.field.clone();
        spec.dimensions = self.dimensions.clone();
        spec.measures = self.measures.clone();
        spec.series = self.series.clone();
        spec.filters = self.filters.clone();
        spec
    }

    /// Contract checks beyond what deserialization enforces.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.dimensions.is_empty() {
            return Err(AgentError::MissingDimensions);
        }
        if self.measures.is_empty() {
            return Err(AgentError::MissingMeasures);
        }
        let mappings = self
            .dimensions
            .iter()
            .chain(self.measures.iter())
            .chain(self.series.iter());
        for mapping in mappings {
            if mapping.field.is_empty() || mapping.name.is_empty() {
                return Err(AgentError::EmptyFieldMapping);
            }
        }
        if self.config.title.is_empty() {
            return Err(AgentError::MissingTitle);
        }
        Ok(())
    }
}

/// Parse raw agent text into a validated chart request.
pub fn parse_agent_output(text: &str) -> Result<ChartRequest, AgentError> {
    let json = extract_json(text).ok_or(AgentError::NoJsonFound)?;
    let request: ChartRequest = serde_json::from_str(json)?;
    request.validate()?;
    Ok(request)
}

/// Pull the JSON payload out of the agent text: a ```json fence when
/// present, otherwise the outermost braces.
fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim());
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

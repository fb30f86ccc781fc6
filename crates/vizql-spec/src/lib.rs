//! VizQL chart specification model
//!
//! Canonical JSON representation of a chart request: the table, dimension/
//! measure/series field mappings, filters and output shaping directives.
//! All types are deterministically serializable for caching and provenance.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

mod value;
pub mod validate;

pub use validate::{validate, ValidationError};
pub use value::{Row, ScalarValue};

/// Declarative chart data request.
///
/// Field names follow the JSON wire contract (`groupBy`, `orderBy`,
/// `timeGranularity`). A spec is constructed by the caller, consumed once
/// per render or refetch, and never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub table: String,

    /// Declared field allow-list of the data source. When non-empty, every
    /// field referenced by dimensions, measures or series must be a member.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<FieldMapping>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measures: Vec<FieldMapping>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<FieldMapping>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterCondition>,

    #[serde(default = "default_true")]
    pub group_by: bool,

    #[serde(default = "default_limit")]
    pub limit: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,

    #[serde(default)]
    pub time_granularity: TimeGranularity,
}

fn default_true() -> bool {
    true
}

fn default_limit() -> u32 {
    1000
}

impl ChartSpec {
    /// Minimal spec over a table with everything else defaulted.
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
            dimensions: Vec::new(),
            measures: Vec::new(),
            series: None,
            filters: Vec::new(),
            group_by: true,
            limit: default_limit(),
            order_by: None,
            time_granularity: TimeGranularity::Day,
        }
    }

    /// Calculate fingerprint (SHA-256) for deterministic caching.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).expect("spec should always serialize");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A dimension, measure or series column mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Source column name.
    pub field: String,

    /// Display label used in shaped output.
    pub name: String,

    /// Aggregation directive. Only meaningful on measures; validation
    /// rejects it on dimensions.
    #[serde(
        default,
        alias = "aggregation",
        skip_serializing_if = "Option::is_none"
    )]
    pub aggregate: Option<Aggregate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortDirection>,
}

impl FieldMapping {
    pub fn new(field: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            name: name.into(),
            aggregate: None,
            sort_by: None,
        }
    }

    pub fn aggregated(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = Some(aggregate);
        self
    }
}

/// Measure aggregation functions. Unknown names are rejected at
/// deserialization; there is no silent fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    Distinct,
}

impl Default for Aggregate {
    fn default() -> Self {
        Aggregate::Sum
    }
}

impl Aggregate {
    /// SQL function name; `distinct` expands to `COUNT(DISTINCT ..)` in the
    /// compiler rather than mapping to a bare function.
    pub fn sql_name(&self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::Count => "count",
            Aggregate::Distinct => "count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A single flat filter condition. Conditions are ANDed; there is no OR or
/// nesting in this contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOp,
    pub value: ScalarValue,
}

/// Canonical filter operator vocabulary.
///
/// The symbolic names are canonical; the SQL-token spellings of the wire
/// contract (`=`, `!=`, `LIKE`, `IN`, ...) are accepted as aliases and
/// normalized here, at the model boundary. Translation back to SQL syntax
/// happens only inside the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
    #[serde(alias = "=")]
    Eq,
    #[serde(alias = "!=", alias = "<>")]
    Neq,
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = ">=")]
    Gte,
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = "<=")]
    Lte,
    #[serde(alias = "IN")]
    In,
    #[serde(alias = "NOT IN")]
    Nin,
    #[serde(alias = "LIKE")]
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,

    #[serde(default)]
    pub direction: OrderDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl Default for OrderDirection {
    fn default() -> Self {
        OrderDirection::Asc
    }
}

impl OrderDirection {
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Date bucketing granularity applied to dimension fields whose name
/// contains "date".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeGranularity {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Default for TimeGranularity {
    fn default() -> Self {
        TimeGranularity::Day
    }
}

/// Supported chart type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Scatter,
    Area,
    Heatmap,
    Radar,
    Funnel,
}

impl ChartType {
    pub const ALL: [ChartType; 8] = [
        ChartType::Bar,
        ChartType::Line,
        ChartType::Pie,
        ChartType::Scatter,
        ChartType::Area,
        ChartType::Heatmap,
        ChartType::Radar,
        ChartType::Funnel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
            ChartType::Scatter => "scatter",
            ChartType::Area => "area",
            ChartType::Heatmap => "heatmap",
            ChartType::Radar => "radar",
            ChartType::Funnel => "funnel",
        }
    }

    pub fn parse(tag: &str) -> Option<ChartType> {
        ChartType::ALL.iter().copied().find(|t| t.as_str() == tag)
    }
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation options attached to a chart request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<String>,

    #[serde(default)]
    pub stacked: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_field: Option<String>,
}

//! Chart data transformer
//!
//! Reshapes raw query rows into the exact structure each chart renderer
//! consumes. Pure and deterministic: distinct-value ordering follows first
//! occurrence in the input rows unless an explicit `sortBy` is given, and
//! every transformation produces a new structure.

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use vizql_spec::{ChartConfig, ChartSpec, ChartType, Row, ScalarValue};

mod aggregate;
mod filter;
mod format;
mod shape;

pub use format::{format_value, ValueFormat};

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{chart} chart requires at least one dimension")]
    MissingDimension { chart: ChartType },

    #[error("{chart} chart requires at least one measure")]
    MissingMeasure { chart: ChartType },

    #[error("heatmap requires exactly 2 dimensions, got {found}")]
    HeatmapDimensions { found: usize },
}

/// Transformer output: the shaped data plus the distinct-value and range
/// bookkeeping renderers use for axes and legends.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedChartData {
    pub raw_data: Vec<Row>,
    pub shaped: ShapedData,
    /// Field -> distinct values in first-seen order.
    pub dimension_values: Vec<(String, Vec<ScalarValue>)>,
    /// Distinct series values, or None when the spec has no series.
    pub series_values: Option<Vec<ScalarValue>>,
    pub metadata: ChartMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub dimension_fields: Vec<String>,
    pub measure_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_field: Option<String>,
    /// Min/max per measure over the filtered set, for axis scaling.
    pub min_values: HashMap<String, f64>,
    pub max_values: HashMap<String, f64>,
}

/// Per-chart-type shaped data.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ShapedData {
    /// Terminal "no data" state: empty input, fully filtered-out input or a
    /// zero-sum pie. Renderers show a placeholder, never a crash.
    Empty,
    Category { rows: Vec<CategoryRow> },
    Stacked { categories: Vec<StackedCategory> },
    Pie { slices: Vec<PieSlice> },
    Scatter { groups: Vec<ScatterGroup> },
    Heatmap(HeatmapGrid),
    Radar(RadarData),
    Funnel { stages: Vec<FunnelStage> },
}

impl ShapedData {
    pub fn is_empty(&self) -> bool {
        match self {
            ShapedData::Empty => true,
            ShapedData::Category { rows } => rows.is_empty(),
            ShapedData::Stacked { categories } => categories.is_empty(),
            ShapedData::Pie { slices } => slices.is_empty(),
            ShapedData::Scatter { groups } => groups.iter().all(|g| g.points.is_empty()),
            ShapedData::Heatmap(grid) => grid.cells.is_empty(),
            ShapedData::Radar(radar) => radar.series.is_empty(),
            ShapedData::Funnel { stages } => stages.is_empty(),
        }
    }
}

/// One category record: the dimension value plus one named column per
/// series value (pivoted) or per measure (plain).
#[derive(Debug, Clone, Serialize)]
pub struct CategoryRow {
    pub category: ScalarValue,
    pub columns: Vec<ColumnValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnValue {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StackedCategory {
    pub category: ScalarValue,
    pub layers: Vec<StackedLayer>,
}

/// A stack segment: `baseline` is the cumulative sum of all earlier series
/// at this category, so segment k spans [baseline, baseline + value].
#[derive(Debug, Clone, Serialize)]
pub struct StackedLayer {
    pub series: String,
    pub value: f64,
    pub baseline: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PieSlice {
    pub name: String,
    pub value: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScatterGroup {
    /// Series value, or None for the single unnamed group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub points: Vec<ScatterPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScatterPoint {
    pub x: ScalarValue,
    pub y: f64,
    /// Visual radius in [4, 20], present when a size field is mapped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    /// Full source row for tooltips and click handling.
    pub original: Row,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapGrid {
    pub x_field: String,
    pub y_field: String,
    pub x_values: Vec<ScalarValue>,
    pub y_values: Vec<ScalarValue>,
    /// Full cross product: one cell per (x, y) index pair, missing
    /// combinations filled with 0.
    pub cells: Vec<HeatmapCell>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeatmapCell {
    pub x: usize,
    pub y: usize,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RadarData {
    pub indicators: Vec<RadarIndicator>,
    pub series: Vec<RadarSeries>,
}

/// One radar axis per measure; `max` carries 20% headroom over the
/// observed maximum.
#[derive(Debug, Clone, Serialize)]
pub struct RadarIndicator {
    pub name: String,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RadarSeries {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunnelStage {
    pub name: String,
    pub value: f64,
}

/// Transform raw rows into the shape `chart_type` needs.
///
/// Pipeline: client-side filters, then aggregation when any measure carries
/// an aggregate, then `sortBy` ordering, then per-chart shaping.
pub fn transform(
    rows: &[Row],
    spec: &ChartSpec,
    chart_type: ChartType,
    config: &ChartConfig,
) -> Result<ProcessedChartData, TransformError> {
    let filtered = filter::apply_filters(rows, &spec.filters);
    if filtered.is_empty() {
        return Ok(empty_result(rows, spec));
    }

    let needs_aggregation = spec.measures.iter().any(|m| m.aggregate.is_some());
    let mut working = if needs_aggregation {
        aggregate::aggregate(&filtered, spec)
    } else {
        filtered.clone()
    };
    aggregate::apply_sorting(&mut working, spec);

    let dimension_values = collect_dimension_values(&filtered, spec);
    let series_values = spec
        .series
        .as_ref()
        .map(|s| distinct_values(&filtered, &s.field));
    let (min_values, max_values) = measure_ranges(&filtered, spec);

    let shaped = shape::shape(&working, spec, chart_type, config)?;

    Ok(ProcessedChartData {
        raw_data: rows.to_vec(),
        shaped,
        dimension_values,
        series_values,
        metadata: ChartMetadata {
            dimension_fields: spec.dimensions.iter().map(|d| d.field.clone()).collect(),
            measure_fields: spec.measures.iter().map(|m| m.field.clone()).collect(),
            series_field: spec.series.as_ref().map(|s| s.field.clone()),
            min_values,
            max_values,
        },
    })
}

fn empty_result(rows: &[Row], spec: &ChartSpec) -> ProcessedChartData {
    ProcessedChartData {
        raw_data: rows.to_vec(),
        shaped: ShapedData::Empty,
        dimension_values: Vec::new(),
        series_values: spec.series.as_ref().map(|_| Vec::new()),
        metadata: ChartMetadata {
            dimension_fields: spec.dimensions.iter().map(|d| d.field.clone()).collect(),
            measure_fields: spec.measures.iter().map(|m| m.field.clone()).collect(),
            series_field: spec.series.as_ref().map(|s| s.field.clone()),
            min_values: HashMap::new(),
            max_values: HashMap::new(),
        },
    }
}

fn collect_dimension_values(rows: &[Row], spec: &ChartSpec) -> Vec<(String, Vec<ScalarValue>)> {
    spec.dimensions
        .iter()
        .map(|d| (d.field.clone(), distinct_values(rows, &d.field)))
        .collect()
}

/// Distinct values of a field in first-seen order, keyed by their label
/// rendering.
pub(crate) fn distinct_values(rows: &[Row], field: &str) -> Vec<ScalarValue> {
    let mut seen = Vec::new();
    let mut out = Vec::new();
    for row in rows {
        let value = row.get(field).cloned().unwrap_or(ScalarValue::Null);
        let key = value.label();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(value);
        }
    }
    out
}

pub(crate) fn measure_of(row: &Row, field: &str) -> f64 {
    row.get(field).and_then(ScalarValue::as_f64).unwrap_or(0.0)
}

fn measure_ranges(rows: &[Row], spec: &ChartSpec) -> (HashMap<String, f64>, HashMap<String, f64>) {
    let mut min_values = HashMap::new();
    let mut max_values = HashMap::new();
    for measure in &spec.measures {
        let values: Vec<f64> = rows
            .iter()
            .filter_map(|r| r.get(&measure.field).and_then(ScalarValue::as_f64))
            .collect();
        if let Some(min) = values.iter().cloned().reduce(f64::min) {
            min_values.insert(measure.field.clone(), min);
        }
        if let Some(max) = values.iter().cloned().reduce(f64::max) {
            max_values.insert(measure.field.clone(), max);
        }
    }
    (min_values, max_values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shaped_data_serializes_tagged() {
        let shaped = ShapedData::Pie {
            slices: vec![PieSlice {
                name: "A".to_string(),
                value: 150.0,
                percentage: 0.75,
            }],
        };
        let json = serde_json::to_value(&shaped).expect("serialize");
        assert_eq!(json["kind"], "pie");
        assert_eq!(json["slices"][0]["percentage"], 0.75);

        let json = serde_json::to_value(ShapedData::Empty).expect("serialize");
        assert_eq!(json["kind"], "empty");
    }

    #[test]
    fn test_distinct_values_first_seen() {
        let rows: Vec<Row> = ["b", "a", "b", "c"]
            .iter()
            .map(|v| {
                let mut row = Row::new();
                row.insert("k".to_string(), ScalarValue::from(*v));
                row
            })
            .collect();
        let labels: Vec<String> = distinct_values(&rows, "k")
            .iter()
            .map(|v| v.label())
            .collect();
        assert_eq!(labels, ["b", "a", "c"]);
    }
}

//! Per-chart-type shaping of processed rows.

use vizql_spec::{ChartConfig, ChartSpec, ChartType, FieldMapping, Row, ScalarValue};

use crate::{
    distinct_values, measure_of, CategoryRow, ColumnValue, FunnelStage, HeatmapCell, HeatmapGrid,
    PieSlice, RadarData, RadarIndicator, RadarSeries, ScatterGroup, ScatterPoint, ShapedData,
    StackedCategory, StackedLayer, TransformError,
};

const SIZE_MIN: f64 = 4.0;
const SIZE_MAX: f64 = 20.0;

pub fn shape(
    rows: &[Row],
    spec: &ChartSpec,
    chart_type: ChartType,
    config: &ChartConfig,
) -> Result<ShapedData, TransformError> {
    match chart_type {
        ChartType::Line | ChartType::Bar | ChartType::Area => {
            let dim = first_dimension(spec, chart_type)?;
            first_measure(spec, chart_type)?;
            if config.stacked && spec.series.is_some() && chart_type != ChartType::Line {
                Ok(shape_stacked(rows, spec, dim))
            } else {
                Ok(shape_category(rows, spec, dim))
            }
        }
        ChartType::Pie => {
            let dim = first_dimension(spec, chart_type)?;
            let measure = first_measure(spec, chart_type)?;
            Ok(shape_pie(rows, dim, measure))
        }
        ChartType::Scatter => {
            let dim = first_dimension(spec, chart_type)?;
            let measure = first_measure(spec, chart_type)?;
            Ok(shape_scatter(rows, spec, config, dim, measure))
        }
        ChartType::Heatmap => {
            if spec.dimensions.len() != 2 {
                return Err(TransformError::HeatmapDimensions {
                    found: spec.dimensions.len(),
                });
            }
            let measure = first_measure(spec, chart_type)?;
            Ok(shape_heatmap(rows, spec, measure))
        }
        ChartType::Radar => {
            first_measure(spec, chart_type)?;
            if spec.series.is_none() {
                first_dimension(spec, chart_type)?;
            }
            Ok(shape_radar(rows, spec))
        }
        ChartType::Funnel => {
            let dim = first_dimension(spec, chart_type)?;
            let measure = first_measure(spec, chart_type)?;
            Ok(shape_funnel(rows, dim, measure))
        }
    }
}

fn first_dimension(spec: &ChartSpec, chart: ChartType) -> Result<&FieldMapping, TransformError> {
    spec.dimensions
        .first()
        .ok_or(TransformError::MissingDimension { chart })
}

fn first_measure(spec: &ChartSpec, chart: ChartType) -> Result<&FieldMapping, TransformError> {
    spec.measures
        .first()
        .ok_or(TransformError::MissingMeasure { chart })
}

/// Category charts. With a series the rows pivot into one record per
/// distinct dimension value with one column per distinct series value
/// (first measure, missing combinations 0); without a series each row
/// becomes a record with measure columns renamed to their display names.
fn shape_category(rows: &[Row], spec: &ChartSpec, dim: &FieldMapping) -> ShapedData {
    match &spec.series {
        Some(series) => {
            let (categories, columns) = pivot(rows, spec, dim, series);
            let rows = categories
                .into_iter()
                .zip(columns)
                .map(|(category, columns)| CategoryRow { category, columns })
                .collect();
            ShapedData::Category { rows }
        }
        None => {
            let rows = rows
                .iter()
                .map(|row| CategoryRow {
                    category: row.get(&dim.field).cloned().unwrap_or(ScalarValue::Null),
                    columns: spec
                        .measures
                        .iter()
                        .map(|m| ColumnValue {
                            name: m.name.clone(),
                            value: measure_of(row, &m.field),
                        })
                        .collect(),
                })
                .collect();
            ShapedData::Category { rows }
        }
    }
}

/// Pivot helper shared by the plain and stacked category shapes: the value
/// of the first measure per (dimension, series) pair, series columns in
/// first-seen order, missing pairs as 0. A duplicate pair keeps the last
/// value, matching the source contract.
fn pivot(
    rows: &[Row],
    spec: &ChartSpec,
    dim: &FieldMapping,
    series: &FieldMapping,
) -> (Vec<ScalarValue>, Vec<Vec<ColumnValue>>) {
    let dim_values = distinct_values(rows, &dim.field);
    let series_values = distinct_values(rows, &series.field);
    let measure_field = spec.measures.first().map(|m| m.field.as_str());

    let mut lookup: std::collections::HashMap<(String, String), f64> =
        std::collections::HashMap::new();
    if let Some(field) = measure_field {
        for row in rows {
            let dim_key = row.get(&dim.field).map(ScalarValue::label).unwrap_or_default();
            let series_key = row
                .get(&series.field)
                .map(ScalarValue::label)
                .unwrap_or_default();
            lookup.insert((dim_key, series_key), measure_of(row, field));
        }
    }

    let columns = dim_values
        .iter()
        .map(|dim_value| {
            series_values
                .iter()
                .map(|series_value| ColumnValue {
                    name: series_value.label(),
                    value: lookup
                        .get(&(dim_value.label(), series_value.label()))
                        .copied()
                        .unwrap_or(0.0),
                })
                .collect()
        })
        .collect();
    (dim_values, columns)
}

/// Stacked area/bar: cumulative layers per category in series first-seen
/// order; the baseline of layer k is the sum of layers 0..k-1.
fn shape_stacked(rows: &[Row], spec: &ChartSpec, dim: &FieldMapping) -> ShapedData {
    let series = match &spec.series {
        Some(series) => series,
        None => return shape_category(rows, spec, dim),
    };
    let (categories, columns) = pivot(rows, spec, dim, series);
    let categories = categories
        .into_iter()
        .zip(columns)
        .map(|(category, columns)| {
            let mut baseline = 0.0;
            let layers = columns
                .into_iter()
                .map(|col| {
                    let layer = StackedLayer {
                        series: col.name,
                        value: col.value,
                        baseline,
                    };
                    baseline += col.value;
                    layer
                })
                .collect();
            StackedCategory { category, layers }
        })
        .collect();
    ShapedData::Stacked { categories }
}

/// Pie slices with share of total. A zero total is the defined "no data"
/// terminal state rather than a divide-by-zero.
fn shape_pie(rows: &[Row], dim: &FieldMapping, measure: &FieldMapping) -> ShapedData {
    let total: f64 = rows.iter().map(|r| measure_of(r, &measure.field)).sum();
    if total == 0.0 {
        return ShapedData::Empty;
    }
    let slices = rows
        .iter()
        .map(|row| {
            let value = measure_of(row, &measure.field);
            PieSlice {
                name: row.get(&dim.field).map(ScalarValue::label).unwrap_or_default(),
                value,
                percentage: value / total,
            }
        })
        .collect();
    ShapedData::Pie { slices }
}

fn shape_scatter(
    rows: &[Row],
    spec: &ChartSpec,
    config: &ChartConfig,
    dim: &FieldMapping,
    measure: &FieldMapping,
) -> ShapedData {
    let size_field = config
        .size_field
        .clone()
        .or_else(|| spec.measures.get(1).map(|m| m.field.clone()));

    // Point sizes rescale over the entire filtered set, not per series.
    let sizes: Option<Vec<f64>> = size_field.as_deref().map(|field| {
        let raw: Vec<f64> = rows.iter().map(|r| measure_of(r, field)).collect();
        let min = raw.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = raw.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        raw.iter()
            .map(|v| {
                if max > min {
                    SIZE_MIN + (v - min) / (max - min) * (SIZE_MAX - SIZE_MIN)
                } else {
                    (SIZE_MIN + SIZE_MAX) / 2.0
                }
            })
            .collect()
    });

    let point = |index: usize, row: &Row| ScatterPoint {
        x: row.get(&dim.field).cloned().unwrap_or(ScalarValue::Null),
        y: measure_of(row, &measure.field),
        size: sizes.as_ref().map(|s| s[index]),
        original: row.clone(),
    };

    let groups = match &spec.series {
        Some(series) => {
            let mut names: Vec<String> = Vec::new();
            let mut grouped: Vec<Vec<ScatterPoint>> = Vec::new();
            for (index, row) in rows.iter().enumerate() {
                let name = row
                    .get(&series.field)
                    .map(ScalarValue::label)
                    .unwrap_or_default();
                match names.iter().position(|n| *n == name) {
                    Some(pos) => grouped[pos].push(point(index, row)),
                    None => {
                        names.push(name);
                        grouped.push(vec![point(index, row)]);
                    }
                }
            }
            names
                .into_iter()
                .zip(grouped)
                .map(|(name, points)| ScatterGroup {
                    name: Some(name),
                    points,
                })
                .collect()
        }
        None => vec![ScatterGroup {
            name: None,
            points: rows
                .iter()
                .enumerate()
                .map(|(index, row)| point(index, row))
                .collect(),
        }],
    };
    ShapedData::Scatter { groups }
}

/// Full cross-product grid of the two dimensions; cells without a source
/// row default to 0. A duplicate (x, y) pair keeps the last value.
fn shape_heatmap(rows: &[Row], spec: &ChartSpec, measure: &FieldMapping) -> ShapedData {
    let x_field = &spec.dimensions[0].field;
    let y_field = &spec.dimensions[1].field;
    let x_values = distinct_values(rows, x_field);
    let y_values = distinct_values(rows, y_field);

    let mut lookup: std::collections::HashMap<(String, String), f64> =
        std::collections::HashMap::new();
    for row in rows {
        let x = row.get(x_field).map(ScalarValue::label).unwrap_or_default();
        let y = row.get(y_field).map(ScalarValue::label).unwrap_or_default();
        lookup.insert((x, y), measure_of(row, &measure.field));
    }

    let mut cells = Vec::with_capacity(x_values.len() * y_values.len());
    for (xi, x) in x_values.iter().enumerate() {
        for (yi, y) in y_values.iter().enumerate() {
            let value = lookup
                .get(&(x.label(), y.label()))
                .copied()
                .unwrap_or(0.0);
            cells.push(HeatmapCell {
                x: xi,
                y: yi,
                value,
            });
        }
    }

    ShapedData::Heatmap(HeatmapGrid {
        x_field: x_field.clone(),
        y_field: y_field.clone(),
        x_values,
        y_values,
        cells,
    })
}

/// One indicator per measure with 20% axis headroom; one polygon per
/// distinct series value (first row wins), or one per row without a series.
fn shape_radar(rows: &[Row], spec: &ChartSpec) -> ShapedData {
    let indicators = spec
        .measures
        .iter()
        .map(|m| {
            let max = rows
                .iter()
                .map(|r| measure_of(r, &m.field))
                .fold(f64::NEG_INFINITY, f64::max);
            RadarIndicator {
                name: m.name.clone(),
                max: if max.is_finite() { max * 1.2 } else { 0.0 },
            }
        })
        .collect();

    let values_of = |row: &Row| -> Vec<f64> {
        spec.measures
            .iter()
            .map(|m| measure_of(row, &m.field))
            .collect()
    };

    let series = match &spec.series {
        Some(series_field) => {
            let mut seen: Vec<String> = Vec::new();
            let mut out: Vec<RadarSeries> = Vec::new();
            for row in rows {
                let name = row
                    .get(&series_field.field)
                    .map(ScalarValue::label)
                    .unwrap_or_default();
                if !seen.contains(&name) {
                    seen.push(name.clone());
                    out.push(RadarSeries {
                        name,
                        values: values_of(row),
                    });
                }
            }
            out
        }
        None => {
            let dim_field = &spec.dimensions[0].field;
            rows.iter()
                .map(|row| RadarSeries {
                    name: row.get(dim_field).map(ScalarValue::label).unwrap_or_default(),
                    values: values_of(row),
                })
                .collect()
        }
    };

    ShapedData::Radar(RadarData { indicators, series })
}

/// Funnel stages sorted by value descending; the transformer guarantees the
/// monotone ordering, not the caller.
fn shape_funnel(rows: &[Row], dim: &FieldMapping, measure: &FieldMapping) -> ShapedData {
    let mut stages: Vec<FunnelStage> = rows
        .iter()
        .map(|row| FunnelStage {
            name: row.get(&dim.field).map(ScalarValue::label).unwrap_or_default(),
            value: measure_of(row, &measure.field),
        })
        .collect();
    stages.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ShapedData::Funnel { stages }
}

//! In-memory aggregation and ordering.

use std::collections::{HashMap, HashSet};

use vizql_spec::{Aggregate, ChartSpec, Row, ScalarValue, SortDirection};

use crate::measure_of;

const KEY_SEP: char = '\u{1f}';

/// Group rows by the full dimension+series key tuple and apply each
/// measure's aggregate within its group. Groups keep first-seen order.
pub fn aggregate(rows: &[Row], spec: &ChartSpec) -> Vec<Row> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Row>> = HashMap::new();

    for row in rows {
        let key = group_key(row, spec);
        match groups.get_mut(&key) {
            Some(group) => group.push(row),
            None => {
                order.push(key.clone());
                groups.insert(key, vec![row]);
            }
        }
    }

    order
        .iter()
        .map(|key| aggregate_group(&groups[key], spec))
        .collect()
}

fn group_key(row: &Row, spec: &ChartSpec) -> String {
    let mut parts: Vec<String> = spec
        .dimensions
        .iter()
        .map(|d| row.get(&d.field).map(ScalarValue::label).unwrap_or_default())
        .collect();
    if let Some(series) = &spec.series {
        parts.push(
            row.get(&series.field)
                .map(ScalarValue::label)
                .unwrap_or_default(),
        );
    }
    parts.join(&KEY_SEP.to_string())
}

fn aggregate_group(items: &[&Row], spec: &ChartSpec) -> Row {
    let first = items[0];
    let mut result = Row::new();

    for dim in &spec.dimensions {
        result.insert(
            dim.field.clone(),
            first.get(&dim.field).cloned().unwrap_or(ScalarValue::Null),
        );
    }
    if let Some(series) = &spec.series {
        result.insert(
            series.field.clone(),
            first
                .get(&series.field)
                .cloned()
                .unwrap_or(ScalarValue::Null),
        );
    }

    for measure in &spec.measures {
        let field = &measure.field;
        let value = match measure.aggregate.unwrap_or_default() {
            Aggregate::Sum => ScalarValue::Float(items.iter().map(|r| measure_of(r, field)).sum()),
            Aggregate::Avg => {
                let sum: f64 = items.iter().map(|r| measure_of(r, field)).sum();
                ScalarValue::Float(sum / items.len() as f64)
            }
            Aggregate::Min => ScalarValue::Float(
                items
                    .iter()
                    .map(|r| measure_of(r, field))
                    .fold(f64::INFINITY, f64::min),
            ),
            Aggregate::Max => ScalarValue::Float(
                items
                    .iter()
                    .map(|r| measure_of(r, field))
                    .fold(f64::NEG_INFINITY, f64::max),
            ),
            Aggregate::Count => ScalarValue::Int(items.len() as i64),
            Aggregate::Distinct => {
                let distinct: HashSet<String> = items
                    .iter()
                    .map(|r| r.get(field).map(ScalarValue::label).unwrap_or_default())
                    .collect();
                ScalarValue::Int(distinct.len() as i64)
            }
        };
        result.insert(field.clone(), value);
    }

    result
}

/// Stable multi-key sort over the fields carrying `sortBy`, dimensions
/// before measures.
pub fn apply_sorting(rows: &mut [Row], spec: &ChartSpec) {
    let sort_fields: Vec<(&str, SortDirection)> = spec
        .dimensions
        .iter()
        .chain(spec.measures.iter())
        .filter_map(|f| f.sort_by.map(|dir| (f.field.as_str(), dir)))
        .collect();
    if sort_fields.is_empty() {
        return;
    }

    rows.sort_by(|a, b| {
        for (field, direction) in &sort_fields {
            let left = a.get(*field).cloned().unwrap_or(ScalarValue::Null);
            let right = b.get(*field).cloned().unwrap_or(ScalarValue::Null);
            let ord = left.compare(&right);
            if ord != std::cmp::Ordering::Equal {
                return match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
            }
        }
        std::cmp::Ordering::Equal
    });
}

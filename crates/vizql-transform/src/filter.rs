//! Client-side filter evaluation over scalar rows.

use vizql_spec::{FilterCondition, FilterOp, Row, ScalarValue};

/// Keep the rows matching every condition (flat conjunction). A field
/// missing from a row evaluates as Null.
pub fn apply_filters(rows: &[Row], filters: &[FilterCondition]) -> Vec<Row> {
    if filters.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .filter(|row| filters.iter().all(|f| matches(row, f)))
        .cloned()
        .collect()
}

fn matches(row: &Row, filter: &FilterCondition) -> bool {
    let cell = row.get(&filter.field).cloned().unwrap_or(ScalarValue::Null);
    let value = &filter.value;

    match filter.operator {
        FilterOp::Eq => cell.loose_eq(value),
        FilterOp::Neq => !cell.loose_eq(value),
        FilterOp::Gt => cell.compare(value) == std::cmp::Ordering::Greater,
        FilterOp::Gte => cell.compare(value) != std::cmp::Ordering::Less,
        FilterOp::Lt => cell.compare(value) == std::cmp::Ordering::Less,
        FilterOp::Lte => cell.compare(value) != std::cmp::Ordering::Greater,
        FilterOp::In => value.contains_value(&cell),
        FilterOp::Nin => !value.contains_value(&cell),
        FilterOp::Contains => cell.label().contains(&value.label()),
        FilterOp::StartsWith => cell.label().starts_with(&value.label()),
        FilterOp::EndsWith => cell.label().ends_with(&value.label()),
    }
}

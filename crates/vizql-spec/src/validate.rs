//! Spec validation
//!
//! Validation runs before compilation; a spec that fails here never reaches
//! the query layer. The identifier checks cover every name that would be
//! interpolated into SQL, on both the aggregated and flat query paths.

use thiserror::Error;

use crate::ChartSpec;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: table")]
    MissingTable,

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid field name: {0}")]
    InvalidFieldName(String),

    #[error("Field not in data source allow-list: {0}")]
    FieldNotAllowed(String),

    #[error("Aggregate is not defined on dimension field: {0}")]
    AggregateOnDimension(String),
}

/// Tables are bare identifiers: `^[A-Za-z0-9_]+$`.
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Field names additionally admit single interior spaces ("Net Sales");
/// such names are always quoted when interpolated.
pub fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(' ')
        && !name.ends_with(' ')
        && !name.contains("  ")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')
}

/// Validate a chart spec against the identifier rules and the data source
/// field allow-list.
pub fn validate(spec: &ChartSpec) -> Result<(), ValidationError> {
    if spec.table.is_empty() {
        return Err(ValidationError::MissingTable);
    }
    if !is_valid_table_name(&spec.table) {
        return Err(ValidationError::InvalidTableName(spec.table.clone()));
    }

    for field in &spec.fields {
        // "*" selects all columns on the flat path; it is never quoted or
        // treated as an identifier.
        if field == "*" {
            continue;
        }
        check_field_name(field)?;
    }

    for dim in &spec.dimensions {
        check_field_name(&dim.field)?;
        check_allowed(spec, &dim.field)?;
        if dim.aggregate.is_some() {
            return Err(ValidationError::AggregateOnDimension(dim.field.clone()));
        }
    }

    for measure in &spec.measures {
        check_field_name(&measure.field)?;
        check_allowed(spec, &measure.field)?;
    }

    if let Some(series) = &spec.series {
        check_field_name(&series.field)?;
        check_allowed(spec, &series.field)?;
    }

    for filter in &spec.filters {
        check_field_name(&filter.field)?;
    }

    if let Some(order) = &spec.order_by {
        check_field_name(&order.field)?;
    }

    Ok(())
}

fn check_field_name(field: &str) -> Result<(), ValidationError> {
    if is_valid_field_name(field) {
        Ok(())
    } else {
        Err(ValidationError::InvalidFieldName(field.to_string()))
    }
}

fn check_allowed(spec: &ChartSpec, field: &str) -> Result<(), ValidationError> {
    if spec.fields.is_empty() || spec.fields.iter().any(|f| f == field) {
        Ok(())
    } else {
        Err(ValidationError::FieldNotAllowed(field.to_string()))
    }
}

//! Display formatting for cell values.

use vizql_spec::ScalarValue;

/// Built-in display formats for shaped values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    Plain,
    /// Thousands-separated number.
    Number,
    /// USD with two decimals.
    Currency,
    /// Ratio rendered as a percentage with two decimals.
    Percent,
    /// ISO date portion of a date/timestamp string.
    Date,
}

/// Format a scalar for display. Nulls render empty; values that do not fit
/// the requested format fall back to their label.
pub fn format_value(value: &ScalarValue, format: ValueFormat) -> String {
    if value.is_null() {
        return String::new();
    }
    match format {
        ValueFormat::Plain => value.label(),
        ValueFormat::Number => match value.as_f64() {
            Some(n) => group_thousands(n, decimals_of(value)),
            None => value.label(),
        },
        ValueFormat::Currency => match value.as_f64() {
            Some(n) => format!("${}", group_thousands(n, 2)),
            None => value.label(),
        },
        ValueFormat::Percent => match value.as_f64() {
            Some(n) => format!("{:.2}%", n * 100.0),
            None => value.label(),
        },
        ValueFormat::Date => {
            let label = value.label();
            let head = label.get(..10).unwrap_or(&label);
            match chrono::NaiveDate::parse_from_str(head, "%Y-%m-%d") {
                Ok(date) => date.format("%Y-%m-%d").to_string(),
                Err(_) => label,
            }
        }
    }
}

fn decimals_of(value: &ScalarValue) -> usize {
    match value {
        ScalarValue::Float(f) if f.fract() != 0.0 => 2,
        _ => 0,
    }
}

fn group_thousands(n: f64, decimals: usize) -> String {
    let negative = n < 0.0;
    let formatted = format!("{:.*}", decimals, n.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (formatted, None),
    };

    let mut grouped = String::new();
    for (count, ch) in int_part.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let mut out: String = grouped.chars().rev().collect();
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(&frac);
    }
    if negative {
        out.insert(0, '-');
    }
    out
}

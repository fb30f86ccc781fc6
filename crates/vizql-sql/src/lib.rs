//! Compiler - transforms a chart spec into DuckDB SQL
//!
//! Pure string generation, no I/O. Every interpolated identifier passes the
//! spec validation layer first; the filter clause is a flat conjunction with
//! no OR, nesting or parameterization (a deliberate simplification of the
//! contract, not an oversight).

use thiserror::Error;

use vizql_spec::{
    Aggregate, ChartSpec, FilterCondition, FilterOp, ScalarValue, TimeGranularity, ValidationError,
};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Filter on {field}: operator {operator} requires a non-empty list value")]
    EmptyFilterList { field: String, operator: String },

    #[error("Filter on {field}: list value is only valid with in/nin")]
    ListOutsideInFilter { field: String },
}

/// Compile a validated chart spec into a single SELECT statement.
///
/// With `groupBy` and non-empty dimensions and measures this emits an
/// aggregation query; otherwise it falls back to a flat select over the
/// referenced fields. `LIMIT` is always applied.
pub fn compile(spec: &ChartSpec) -> Result<String, CompileError> {
    vizql_spec::validate(spec)?;

    if spec.group_by && !spec.dimensions.is_empty() && !spec.measures.is_empty() {
        compile_grouped(spec)
    } else {
        compile_flat(spec)
    }
}

fn compile_grouped(spec: &ChartSpec) -> Result<String, CompileError> {
    let mut select = Vec::new();
    let mut group = Vec::new();

    for dim in &spec.dimensions {
        let col = quote_ident(&dim.field);
        match bucket_expr(&dim.field, &col, spec.time_granularity) {
            Some(expr) => {
                select.push(format!("{} AS {}", expr, quote_alias(&dim.field)));
                group.push(expr);
            }
            None => {
                select.push(col.clone());
                group.push(col);
            }
        }
    }

    if let Some(series) = &spec.series {
        let col = quote_ident(&series.field);
        if !group.contains(&col) {
            select.push(col.clone());
            group.push(col);
        }
    }

    for measure in &spec.measures {
        let col = quote_ident(&measure.field);
        let agg = measure.aggregate.unwrap_or_default();
        let call = match agg {
            Aggregate::Distinct => format!("count(DISTINCT {})", col),
            _ => format!("{}({})", agg.sql_name(), col),
        };
        select.push(format!("{} AS {}", call, quote_alias(&measure.field)));
    }

    let mut sql = format!("SELECT {} FROM {}", select.join(", "), spec.table);
    push_where(&mut sql, &spec.filters)?;
    sql.push_str(" GROUP BY ");
    sql.push_str(&group.join(", "));
    push_order_limit(&mut sql, spec);
    Ok(sql)
}

fn compile_flat(spec: &ChartSpec) -> Result<String, CompileError> {
    // Collect every referenced field, declared fields first, deduplicated
    // in first-mention order.
    fn add(list: &mut Vec<String>, f: &str) {
        if f != "*" && !list.iter().any(|x| x == f) {
            list.push(f.to_string());
        }
    }
    let mut collected: Vec<String> = Vec::new();
    for f in &spec.fields {
        add(&mut collected, f);
    }
    for d in &spec.dimensions {
        add(&mut collected, &d.field);
    }
    for m in &spec.measures {
        add(&mut collected, &m.field);
    }
    if let Some(s) = &spec.series {
        add(&mut collected, &s.field);
    }

    let projection = if collected.is_empty() || spec.fields.iter().any(|f| f == "*") {
        "*".to_string()
    } else {
        collected
            .iter()
            .map(|f| quote_ident(f))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut sql = format!("SELECT {} FROM {}", projection, spec.table);
    push_where(&mut sql, &spec.filters)?;
    push_order_limit(&mut sql, spec);
    Ok(sql)
}

fn push_where(sql: &mut String, filters: &[FilterCondition]) -> Result<(), CompileError> {
    if filters.is_empty() {
        return Ok(());
    }
    let conditions = filters
        .iter()
        .map(filter_sql)
        .collect::<Result<Vec<_>, _>>()?;
    sql.push_str(" WHERE ");
    sql.push_str(&conditions.join(" AND "));
    Ok(())
}

fn push_order_limit(sql: &mut String, spec: &ChartSpec) {
    if let Some(order) = &spec.order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(&quote_ident(&order.field));
        sql.push(' ');
        sql.push_str(order.direction.sql_keyword());
    }
    sql.push_str(&format!(" LIMIT {}", spec.limit));
}

/// Identifiers containing a space must be quoted; bare otherwise. Every
/// name reaching this point already passed the allow-list check.
fn quote_ident(field: &str) -> String {
    if field.contains(' ') {
        format!("\"{}\"", field)
    } else {
        field.to_string()
    }
}

fn quote_alias(field: &str) -> String {
    quote_ident(field)
}

/// Date bucketing expression for dimension fields whose name contains
/// "date". Day is the identity; the other granularities produce the
/// `YYYY-MM` / `YYYY-Qn` / `YYYY-Wn` / `YYYY` label shapes.
fn bucket_expr(field: &str, col: &str, granularity: TimeGranularity) -> Option<String> {
    if !field.to_lowercase().contains("date") {
        return None;
    }
    match granularity {
        TimeGranularity::Day => None,
        TimeGranularity::Week => Some(format!("concat(isoyear({col}), '-W', week({col}))")),
        TimeGranularity::Month => Some(format!("strftime({col}, '%Y-%m')")),
        TimeGranularity::Quarter => Some(format!("concat(year({col}), '-Q', quarter({col}))")),
        TimeGranularity::Year => Some(format!("strftime({col}, '%Y')")),
    }
}

fn filter_sql(filter: &FilterCondition) -> Result<String, CompileError> {
    let col = quote_ident(&filter.field);
    let value = &filter.value;

    let sql = match filter.operator {
        FilterOp::Eq => match value {
            ScalarValue::Null => format!("{col} IS NULL"),
            _ => format!("{col} = {}", literal(filter, value)?),
        },
        FilterOp::Neq => match value {
            ScalarValue::Null => format!("{col} IS NOT NULL"),
            _ => format!("{col} != {}", literal(filter, value)?),
        },
        FilterOp::Gt => format!("{col} > {}", literal(filter, value)?),
        FilterOp::Gte => format!("{col} >= {}", literal(filter, value)?),
        FilterOp::Lt => format!("{col} < {}", literal(filter, value)?),
        FilterOp::Lte => format!("{col} <= {}", literal(filter, value)?),
        FilterOp::In => format!("{col} IN ({})", list_literal(filter)?),
        FilterOp::Nin => format!("{col} NOT IN ({})", list_literal(filter)?),
        FilterOp::Contains => format!("{col} LIKE '%{}%'", escape_str(&value.label())),
        FilterOp::StartsWith => format!("{col} LIKE '{}%'", escape_str(&value.label())),
        FilterOp::EndsWith => format!("{col} LIKE '%{}'", escape_str(&value.label())),
    };
    Ok(sql)
}

/// Literals are single-quoted when textual, bare otherwise.
fn literal(filter: &FilterCondition, value: &ScalarValue) -> Result<String, CompileError> {
    match value {
        ScalarValue::Null => Ok("NULL".to_string()),
        ScalarValue::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        ScalarValue::Int(i) => Ok(i.to_string()),
        ScalarValue::Float(f) => Ok(f.to_string()),
        ScalarValue::String(s) => Ok(format!("'{}'", escape_str(s))),
        ScalarValue::List(_) => Err(CompileError::ListOutsideInFilter {
            field: filter.field.clone(),
        }),
    }
}

fn list_literal(filter: &FilterCondition) -> Result<String, CompileError> {
    let items = match &filter.value {
        ScalarValue::List(items) if !items.is_empty() => items,
        _ => {
            return Err(CompileError::EmptyFilterList {
                field: filter.field.clone(),
                operator: if filter.operator == FilterOp::In {
                    "in".to_string()
                } else {
                    "nin".to_string()
                },
            })
        }
    };
    let rendered = items
        .iter()
        .map(|v| literal(filter, v))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rendered.join(", "))
}

fn escape_str(s: &str) -> String {
    s.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use vizql_spec::{FieldMapping, OrderBy, OrderDirection};

    fn base_spec() -> ChartSpec {
        let mut spec = ChartSpec::for_table("orders");
        spec.dimensions.push(FieldMapping::new("month", "Month"));
        spec.measures.push(FieldMapping::new("sales", "Sales"));
        spec
    }

    #[test]
    fn test_grouped_select() {
        let sql = compile(&base_spec()).unwrap();
        assert_eq!(
            sql,
            "SELECT month, sum(sales) AS sales FROM orders GROUP BY month LIMIT 1000"
        );
    }

    #[test]
    fn test_series_grouped_once() {
        let mut spec = base_spec();
        spec.series = Some(FieldMapping::new("region", "Region"));
        let sql = compile(&spec).unwrap();
        assert_eq!(
            sql,
            "SELECT month, region, sum(sales) AS sales FROM orders \
             GROUP BY month, region LIMIT 1000"
        );

        // A series that duplicates a dimension is not grouped twice.
        spec.series = Some(FieldMapping::new("month", "Month"));
        let sql = compile(&spec).unwrap();
        assert_eq!(
            sql,
            "SELECT month, sum(sales) AS sales FROM orders GROUP BY month LIMIT 1000"
        );
    }

    #[test]
    fn test_aggregate_variants() {
        let mut spec = base_spec();
        spec.measures = vec![
            FieldMapping::new("sales", "Sales").aggregated(Aggregate::Avg),
            FieldMapping::new("customer", "Customers").aggregated(Aggregate::Distinct),
        ];
        let sql = compile(&spec).unwrap();
        assert!(sql.contains("avg(sales) AS sales"));
        assert!(sql.contains("count(DISTINCT customer) AS customer"));
    }

    #[test]
    fn test_date_bucketing() {
        let mut spec = base_spec();
        spec.dimensions = vec![FieldMapping::new("order_date", "Date")];

        spec.time_granularity = TimeGranularity::Month;
        let sql = compile(&spec).unwrap();
        assert_eq!(
            sql,
            "SELECT strftime(order_date, '%Y-%m') AS order_date, sum(sales) AS sales \
             FROM orders GROUP BY strftime(order_date, '%Y-%m') LIMIT 1000"
        );

        spec.time_granularity = TimeGranularity::Quarter;
        let sql = compile(&spec).unwrap();
        assert!(sql.contains("concat(year(order_date), '-Q', quarter(order_date))"));

        spec.time_granularity = TimeGranularity::Week;
        let sql = compile(&spec).unwrap();
        assert!(sql.contains("concat(isoyear(order_date), '-W', week(order_date))"));

        spec.time_granularity = TimeGranularity::Year;
        let sql = compile(&spec).unwrap();
        assert!(sql.contains("strftime(order_date, '%Y') AS order_date"));

        // Day is the identity.
        spec.time_granularity = TimeGranularity::Day;
        let sql = compile(&spec).unwrap();
        assert!(sql.starts_with("SELECT order_date, sum(sales)"));
    }

    #[test]
    fn test_bucketing_only_touches_date_fields() {
        let mut spec = base_spec();
        spec.time_granularity = TimeGranularity::Month;
        let sql = compile(&spec).unwrap();
        assert!(!sql.contains("strftime"));
    }

    #[test]
    fn test_spaced_identifiers_quoted() {
        let mut spec = base_spec();
        spec.dimensions = vec![FieldMapping::new("product line", "Line")];
        spec.measures = vec![FieldMapping::new("Net Sales", "Net")];
        let sql = compile(&spec).unwrap();
        assert_eq!(
            sql,
            "SELECT \"product line\", sum(\"Net Sales\") AS \"Net Sales\" \
             FROM orders GROUP BY \"product line\" LIMIT 1000"
        );
    }

    #[test]
    fn test_filters() {
        let mut spec = base_spec();
        spec.filters = vec![
            FilterCondition {
                field: "region".into(),
                operator: FilterOp::Eq,
                value: ScalarValue::from("EU"),
            },
            FilterCondition {
                field: "qty".into(),
                operator: FilterOp::Gte,
                value: ScalarValue::Int(10),
            },
            FilterCondition {
                field: "channel".into(),
                operator: FilterOp::In,
                value: ScalarValue::List(vec![
                    ScalarValue::from("web"),
                    ScalarValue::from("store"),
                ]),
            },
            FilterCondition {
                field: "sku".into(),
                operator: FilterOp::Contains,
                value: ScalarValue::from("A-"),
            },
        ];
        let sql = compile(&spec).unwrap();
        assert!(sql.contains(
            "WHERE region = 'EU' AND qty >= 10 AND channel IN ('web', 'store') \
             AND sku LIKE '%A-%'"
        ));
    }

    #[test]
    fn test_null_filters_use_is_null() {
        let mut spec = base_spec();
        spec.filters = vec![
            FilterCondition {
                field: "a".into(),
                operator: FilterOp::Eq,
                value: ScalarValue::Null,
            },
            FilterCondition {
                field: "b".into(),
                operator: FilterOp::Neq,
                value: ScalarValue::Null,
            },
        ];
        let sql = compile(&spec).unwrap();
        assert!(sql.contains("WHERE a IS NULL AND b IS NOT NULL"));
    }

    #[test]
    fn test_string_literal_escaping() {
        let mut spec = base_spec();
        spec.filters = vec![FilterCondition {
            field: "name".into(),
            operator: FilterOp::Eq,
            value: ScalarValue::from("O'Brien"),
        }];
        let sql = compile(&spec).unwrap();
        assert!(sql.contains("name = 'O''Brien'"));
    }

    #[test]
    fn test_empty_in_list_rejected() {
        let mut spec = base_spec();
        spec.filters = vec![FilterCondition {
            field: "region".into(),
            operator: FilterOp::In,
            value: ScalarValue::List(vec![]),
        }];
        assert!(matches!(
            compile(&spec),
            Err(CompileError::EmptyFilterList { .. })
        ));
    }

    #[test]
    fn test_flat_fallback_without_measures() {
        let mut spec = base_spec();
        spec.measures.clear();
        let sql = compile(&spec).unwrap();
        assert_eq!(sql, "SELECT month FROM orders LIMIT 1000");
    }

    #[test]
    fn test_flat_collects_and_dedupes_fields() {
        let mut spec = base_spec();
        spec.group_by = false;
        spec.fields = vec!["month".to_string(), "extra".to_string()];
        spec.series = Some(FieldMapping::new("region", "Region"));
        let sql = compile(&spec).unwrap();
        assert_eq!(
            sql,
            "SELECT month, extra, sales, region FROM orders LIMIT 1000"
        );
    }

    #[test]
    fn test_select_star() {
        let spec = ChartSpec::for_table("orders");
        assert_eq!(compile(&spec).unwrap(), "SELECT * FROM orders LIMIT 1000");

        let mut spec = ChartSpec::for_table("orders");
        spec.fields = vec!["*".to_string()];
        assert_eq!(compile(&spec).unwrap(), "SELECT * FROM orders LIMIT 1000");
    }

    #[test]
    fn test_order_and_limit() {
        let mut spec = base_spec();
        spec.limit = 25;
        spec.order_by = Some(OrderBy {
            field: "sales".to_string(),
            direction: OrderDirection::Desc,
        });
        let sql = compile(&spec).unwrap();
        assert!(sql.ends_with("GROUP BY month ORDER BY sales DESC LIMIT 25"));
    }

    #[test]
    fn test_unsafe_identifiers_never_reach_sql() {
        let mut spec = base_spec();
        spec.table = "orders; DROP TABLE users".to_string();
        assert!(matches!(compile(&spec), Err(CompileError::Validation(_))));

        let mut spec = base_spec();
        spec.dimensions = vec![FieldMapping::new("month`--", "Month")];
        assert!(matches!(compile(&spec), Err(CompileError::Validation(_))));

        let mut spec = base_spec();
        spec.filters = vec![FilterCondition {
            field: "1=1; --".into(),
            operator: FilterOp::Eq,
            value: ScalarValue::Int(1),
        }];
        assert!(matches!(compile(&spec), Err(CompileError::Validation(_))));
    }

    // --- WHERE round-trip -------------------------------------------------

    fn parse_where(sql: &str) -> Vec<FilterCondition> {
        let start = sql.find(" WHERE ").expect("no WHERE clause") + " WHERE ".len();
        let rest = &sql[start..];
        let end = [" GROUP BY ", " ORDER BY ", " LIMIT "]
            .iter()
            .filter_map(|kw| rest.find(kw))
            .min()
            .unwrap_or(rest.len());
        rest[..end]
            .split(" AND ")
            .map(parse_condition)
            .collect()
    }

    fn parse_condition(cond: &str) -> FilterCondition {
        for (token, op) in [
            (" NOT IN ", FilterOp::Nin),
            (" >= ", FilterOp::Gte),
            (" <= ", FilterOp::Lte),
            (" != ", FilterOp::Neq),
            (" IN ", FilterOp::In),
            (" LIKE ", FilterOp::Contains),
            (" = ", FilterOp::Eq),
            (" > ", FilterOp::Gt),
            (" < ", FilterOp::Lt),
        ] {
            if let Some(pos) = cond.find(token) {
                let field = cond[..pos].trim_matches('"').to_string();
                let raw = &cond[pos + token.len()..];
                let (operator, value) = match op {
                    FilterOp::In | FilterOp::Nin => {
                        let inner = raw.trim_start_matches('(').trim_end_matches(')');
                        let items = inner.split(", ").map(parse_literal).collect();
                        (op, ScalarValue::List(items))
                    }
                    FilterOp::Contains => {
                        let inner = raw.trim_matches('\'');
                        match (inner.starts_with('%'), inner.ends_with('%')) {
                            (true, true) => (
                                FilterOp::Contains,
                                ScalarValue::from(inner.trim_matches('%')),
                            ),
                            (false, true) => (
                                FilterOp::StartsWith,
                                ScalarValue::from(inner.trim_end_matches('%')),
                            ),
                            (true, false) => (
                                FilterOp::EndsWith,
                                ScalarValue::from(inner.trim_start_matches('%')),
                            ),
                            (false, false) => (FilterOp::Contains, ScalarValue::from(inner)),
                        }
                    }
                    _ => (op, parse_literal(raw)),
                };
                return FilterCondition {
                    field,
                    operator,
                    value,
                };
            }
        }
        panic!("unparseable condition: {cond}");
    }

    fn parse_literal(raw: &str) -> ScalarValue {
        if let Some(inner) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
            return ScalarValue::String(inner.replace("''", "'"));
        }
        if raw == "TRUE" {
            return ScalarValue::Bool(true);
        }
        if raw == "FALSE" {
            return ScalarValue::Bool(false);
        }
        if let Ok(i) = raw.parse::<i64>() {
            return ScalarValue::Int(i);
        }
        ScalarValue::Float(raw.parse().unwrap())
    }

    #[test]
    fn test_where_round_trip() {
        let filters = vec![
            FilterCondition {
                field: "region".into(),
                operator: FilterOp::Eq,
                value: ScalarValue::from("EU"),
            },
            FilterCondition {
                field: "qty".into(),
                operator: FilterOp::Gt,
                value: ScalarValue::Int(3),
            },
            FilterCondition {
                field: "price".into(),
                operator: FilterOp::Lte,
                value: ScalarValue::Float(9.75),
            },
            FilterCondition {
                field: "channel".into(),
                operator: FilterOp::Nin,
                value: ScalarValue::List(vec![ScalarValue::from("fax")]),
            },
            FilterCondition {
                field: "sku".into(),
                operator: FilterOp::StartsWith,
                value: ScalarValue::from("AB"),
            },
            FilterCondition {
                field: "name".into(),
                operator: FilterOp::EndsWith,
                value: ScalarValue::from("Ltd"),
            },
        ];
        let mut spec = base_spec();
        spec.filters = filters.clone();

        let sql = compile(&spec).unwrap();
        let recovered = parse_where(&sql);
        assert_eq!(recovered, filters);
    }
}

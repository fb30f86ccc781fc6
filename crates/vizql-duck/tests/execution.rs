//! End-to-end: compile a chart spec and execute the SQL against DuckDB.

use std::time::Duration;

use vizql_duck::{ExecutionError, Pool};
use vizql_spec::{
    Aggregate, ChartSpec, FieldMapping, FilterCondition, FilterOp, OrderBy, OrderDirection,
    ScalarValue, TimeGranularity,
};

async fn seeded_pool() -> Result<(Pool, vizql_duck::PooledConn), ExecutionError> {
    let pool = Pool::open(None, 1, Duration::from_secs(5))?;
    let conn = pool.acquire().await?;
    conn.execute_batch(
        "CREATE TABLE orders (order_date DATE, region VARCHAR, sales DOUBLE, qty INTEGER);
         INSERT INTO orders VALUES
           (DATE '2024-01-05', 'EU', 100.0, 3),
           (DATE '2024-01-20', 'US', 80.0, 2),
           (DATE '2024-02-10', 'EU', 60.0, 5),
           (DATE '2024-02-11', 'EU', 40.0, 1);",
    )?;
    Ok((pool, conn))
}

fn spec() -> ChartSpec {
    let mut spec = ChartSpec::for_table("orders");
    spec.dimensions.push(FieldMapping::new("region", "Region"));
    spec.measures
        .push(FieldMapping::new("sales", "Sales").aggregated(Aggregate::Sum));
    spec
}

#[tokio::test]
async fn grouped_query_executes() -> Result<(), Box<dyn std::error::Error>> {
    let (_pool, conn) = seeded_pool().await?;

    let mut spec = spec();
    spec.order_by = Some(OrderBy {
        field: "sales".to_string(),
        direction: OrderDirection::Desc,
    });
    let sql = vizql_sql::compile(&spec)?;
    let result = conn.query(&sql)?;

    assert_eq!(result.columns, ["region", "sales"]);
    assert_eq!(result.row_count(), 2);
    assert_eq!(result.rows[0]["region"], ScalarValue::String("EU".into()));
    assert_eq!(result.rows[0]["sales"], ScalarValue::Float(200.0));
    assert_eq!(result.rows[1]["sales"], ScalarValue::Float(80.0));
    Ok(())
}

#[tokio::test]
async fn month_bucketing_executes() -> Result<(), Box<dyn std::error::Error>> {
    let (_pool, conn) = seeded_pool().await?;

    let mut spec = spec();
    spec.dimensions = vec![FieldMapping::new("order_date", "Date")];
    spec.time_granularity = TimeGranularity::Month;
    spec.order_by = Some(OrderBy {
        field: "order_date".to_string(),
        direction: OrderDirection::Asc,
    });

    let sql = vizql_sql::compile(&spec)?;
    let result = conn.query(&sql)?;

    assert_eq!(result.row_count(), 2);
    assert_eq!(
        result.rows[0]["order_date"],
        ScalarValue::String("2024-01".into())
    );
    assert_eq!(result.rows[0]["sales"], ScalarValue::Float(180.0));
    assert_eq!(
        result.rows[1]["order_date"],
        ScalarValue::String("2024-02".into())
    );
    assert_eq!(result.rows[1]["sales"], ScalarValue::Float(100.0));
    Ok(())
}

#[tokio::test]
async fn quarter_and_year_bucketing_execute() -> Result<(), Box<dyn std::error::Error>> {
    let (_pool, conn) = seeded_pool().await?;

    let mut spec = spec();
    spec.dimensions = vec![FieldMapping::new("order_date", "Date")];
    spec.time_granularity = TimeGranularity::Quarter;
    spec.order_by = Some(OrderBy {
        field: "order_date".to_string(),
        direction: OrderDirection::Asc,
    });
    let result = conn.query(&vizql_sql::compile(&spec)?)?;
    assert_eq!(
        result.rows[0]["order_date"],
        ScalarValue::String("2024-Q1".into())
    );

    spec.time_granularity = TimeGranularity::Year;
    let result = conn.query(&vizql_sql::compile(&spec)?)?;
    assert_eq!(result.row_count(), 1);
    assert_eq!(
        result.rows[0]["order_date"],
        ScalarValue::String("2024".into())
    );
    assert_eq!(result.rows[0]["sales"], ScalarValue::Float(280.0));
    Ok(())
}

#[tokio::test]
async fn filters_and_flat_path_execute() -> Result<(), Box<dyn std::error::Error>> {
    let (_pool, conn) = seeded_pool().await?;

    let mut spec = ChartSpec::for_table("orders");
    spec.group_by = false;
    spec.fields = vec!["region".to_string(), "qty".to_string()];
    spec.filters = vec![
        FilterCondition {
            field: "region".to_string(),
            operator: FilterOp::Eq,
            value: ScalarValue::from("EU"),
        },
        FilterCondition {
            field: "qty".to_string(),
            operator: FilterOp::Gte,
            value: ScalarValue::Int(3),
        },
    ];

    let result = conn.query(&vizql_sql::compile(&spec)?)?;
    assert_eq!(result.row_count(), 2);
    assert!(result
        .rows
        .iter()
        .all(|r| r["region"] == ScalarValue::String("EU".into())));
    Ok(())
}

#[tokio::test]
async fn limit_is_always_applied() -> Result<(), Box<dyn std::error::Error>> {
    let (_pool, conn) = seeded_pool().await?;

    let mut spec = ChartSpec::for_table("orders");
    spec.group_by = false;
    spec.limit = 2;
    let result = conn.query(&vizql_sql::compile(&spec)?)?;
    assert_eq!(result.row_count(), 2);
    Ok(())
}

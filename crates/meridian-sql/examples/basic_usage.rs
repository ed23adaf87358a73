//! Basic usage of the analyzer: build a query, analyze it against an
//! in-memory catalog, and inspect the result.
//!
//! Run with: cargo run --example basic_usage

use meridian_sql::builder::*;
use meridian_sql::{
    AnalysisResult, AnalyzeOptions, Analyzer, Column, DataType, Settings, TableWithColumns,
};

fn main() {
    let columns = vec![
        Column::new("user_id", DataType::UInt64),
        Column::new("url", DataType::String),
        Column::new("duration_ms", DataType::UInt32),
    ];
    let tables = vec![TableWithColumns::new("visits", columns.clone())];

    // SELECT countDistinct(user_id) AS users
    // FROM visits
    // WHERE greater(duration_ms, 100)
    let mut query = select(vec![aliased(
        func("countDistinct", vec![col("user_id")]),
        "users",
    )])
    .from("visits")
    .where_(func("greater", vec![col("duration_ms"), lit(100u64)]))
    .build();

    let analyzer = Analyzer::new(Settings::default());
    let result = analyzer
        .analyze_select(
            &mut query,
            AnalysisResult::new(columns, None),
            &AnalyzeOptions::default(),
            &tables,
            &[],
        )
        .expect("analysis failed");

    println!("rewritten query: {}", query);
    println!(
        "aggregates: {:?}",
        result
            .aggregates
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
    );
    println!(
        "columns to read: {:?}",
        result
            .required_source_columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
    );
}

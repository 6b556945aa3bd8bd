//! Table encoding: type inference, column spec and chunking.

use chrono::NaiveDate;
use serde_json::json;
use storedproc::{AdapterError, ColumnSpec, ColumnType, Row, TableEncoder};

fn row_of_cost_50(i: usize) -> Row {
    // 6 + len("v") + 43
    Row::new().with("v", format!("{:a<43}", i % 10))
}

// Chunking Tests

#[test]
fn test_hundred_rows_fill_ten_chunks_exactly() {
    let rows: Vec<Row> = (0..100).map(row_of_cost_50).collect();
    let table = TableEncoder::with_threshold(500).encode(&rows).unwrap();

    assert_eq!(table.chunks.len(), 10);
    assert!(table.chunks.iter().all(|c| c.rows.len() == 10 && c.size == 500));
    assert_eq!(table.row_count(), 100);
}

#[test]
fn test_thousand_rows_fill_hundred_chunks() {
    let rows: Vec<Row> = (0..1000).map(row_of_cost_50).collect();
    let table = TableEncoder::with_threshold(500).encode(&rows).unwrap();
    assert_eq!(table.chunks.len(), 100);
}

#[test]
fn test_default_threshold_chunking() {
    let rows: Vec<Row> = (0..100)
        .map(|_| Row::new().with("text", "x".repeat(1000)))
        .collect();
    let table = TableEncoder::new().encode(&rows).unwrap();

    // 1010 per row, 31 rows fit under 32000
    let sizes: Vec<usize> = table.chunks.iter().map(|c| c.rows.len()).collect();
    assert_eq!(sizes, vec![31, 31, 31, 7]);
    assert!(table.chunks.iter().all(|c| c.size <= 32_000));
}

#[test]
fn test_rows_keep_their_order_across_chunks() {
    let rows: Vec<Row> = (0..25).map(|i| Row::new().with("id", i as i64)).collect();
    let table = TableEncoder::with_threshold(30).encode(&rows).unwrap();

    let ids: Vec<i64> = table
        .chunks
        .iter()
        .flat_map(|c| c.rows.iter())
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, (0..25).collect::<Vec<_>>());
}

#[test]
fn test_oversized_row_is_rejected() {
    let rows = vec![
        Row::new().with("id", 1),
        Row::new().with("blob", "z".repeat(200)),
    ];
    let err = TableEncoder::with_threshold(100).encode(&rows).unwrap_err();
    match err {
        AdapterError::Argument(message) => assert!(message.contains("row 1")),
        other => panic!("expected argument error, got {other:?}"),
    }
}

#[test]
fn test_zero_rows() {
    let table = TableEncoder::new().encode(&[]).unwrap();
    assert!(table.spec.is_empty());
    assert!(table.chunks.is_empty());
    assert_eq!(table.to_params().unwrap(), vec!["[]".to_string()]);
}

// Type Inference Tests

#[test]
fn test_column_spec_types_and_lengths() {
    let date = NaiveDate::from_ymd_opt(2016, 3, 9).unwrap();
    let rows = vec![
        Row::new()
            .with("id", 1)
            .with("name", "Ada")
            .with("born", date)
            .with("tags", json!(["a", "b"])),
        Row::new()
            .with("id", 2.5)
            .with("name", "Grace Hopper")
            .with("born", date)
            .with("tags", json!({"k": 1})),
    ];
    let table = TableEncoder::new().encode(&rows).unwrap();

    assert_eq!(
        table.spec,
        vec![
            ColumnSpec {
                name: "id".to_string(),
                col_type: ColumnType::Numeric,
                length: 8
            },
            ColumnSpec {
                name: "name".to_string(),
                col_type: ColumnType::Text,
                length: 12
            },
            ColumnSpec {
                name: "born".to_string(),
                col_type: ColumnType::Date,
                length: 8
            },
            ColumnSpec {
                name: "tags".to_string(),
                col_type: ColumnType::Json,
                length: 9
            },
        ]
    );
    assert_eq!(table.chunks[0].rows[0]["born"], "09/03/2016");
}

#[test]
fn test_spec_wire_form() {
    let rows = vec![Row::new().with("name", "x")];
    let params = TableEncoder::new().encode(&rows).unwrap().to_params().unwrap();
    assert_eq!(
        params[0],
        r#"[{"colName":"name","colType":"string","colLength":1}]"#
    );
    assert_eq!(params[1], r#"[{"name":"x"}]"#);
}

#[test]
fn test_type_mismatch_aborts() {
    let rows = vec![Row::new().with("a", 1), Row::new().with("a", "one")];
    let err = TableEncoder::new().encode(&rows).unwrap_err();
    assert!(matches!(err, AdapterError::Type(_)));
    assert_eq!(err.kind(), "typeError");
}

#[test]
fn test_empty_string_becomes_space() {
    let rows = vec![Row::new().with("note", "")];
    let table = TableEncoder::new().encode(&rows).unwrap();
    assert_eq!(table.chunks[0].rows[0]["note"], " ");
    assert_eq!(table.spec[0].length, 1);
}

#[test]
fn test_text_is_escaped_but_length_counts_characters() {
    let rows = vec![Row::new().with("city", "Zürich & Co")];
    let table = TableEncoder::new().encode(&rows).unwrap();
    assert_eq!(table.chunks[0].rows[0]["city"], "Z%C3%BCrich%20%26%20Co");
    assert_eq!(table.spec[0].length, 11);
}

#[test]
fn test_booleans_and_null_are_json() {
    let rows = vec![Row::new().with("flag", true), Row::new().with("flag", json!(null))];
    let table = TableEncoder::new().encode(&rows).unwrap();
    assert_eq!(table.spec[0].col_type, ColumnType::Json);
}

// JSON Input Tests

#[test]
fn test_encode_json_and_decode_back() {
    let input = json!([
        {"id": 1, "name": "Ada Lovelace", "meta": {"x": [1, 2]}},
        {"id": 2, "name": "a%b", "meta": {"x": []}}
    ]);
    let table = TableEncoder::new().encode_json(&input).unwrap();
    let rows = table.decode_rows().unwrap();
    assert_eq!(serde_json::Value::from(rows[0].clone()), input[0]);
    assert_eq!(serde_json::Value::from(rows[1].clone()), input[1]);
}

#[test]
fn test_decode_rows_lossy_cases() {
    let rows = vec![
        Row::new()
            .with("name", "")
            .with("born", NaiveDate::from_ymd_opt(1815, 12, 10).unwrap())
            .with("n", 7),
        Row::new()
            .with("name", "Ada Lovelace")
            .with("born", NaiveDate::from_ymd_opt(2001, 1, 2).unwrap())
            .with("n", 8),
    ];
    let decoded = TableEncoder::new().encode(&rows).unwrap().decode_rows().unwrap();

    // Empty strings come back as one space, dates in wire format
    assert_eq!(
        serde_json::Value::from(decoded[0].clone()),
        json!({"name": " ", "born": "10/12/1815", "n": 7})
    );
    assert_eq!(
        serde_json::Value::from(decoded[1].clone()),
        json!({"name": "Ada Lovelace", "born": "02/01/2001", "n": 8})
    );
}

#[test]
fn test_encode_json_rejects_non_tables() {
    let encoder = TableEncoder::new();
    assert!(matches!(
        encoder.encode_json(&json!({"id": 1})),
        Err(AdapterError::Argument(_))
    ));
    assert!(matches!(
        encoder.encode_json(&json!([{"id": 1}, 7])),
        Err(AdapterError::Argument(_))
    ));
}

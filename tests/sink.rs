use csv_table_loader::sink::{MemorySink, SqliteSink, TableSink};
use csv_table_loader::types::{Column, DataType, Table, Value};
use csv_table_loader::SinkError;

fn scores(n: i64) -> Table {
    Table::new(
        vec![
            Column::new("id", DataType::Int64),
            Column::new("score", DataType::Float64),
            Column::new("city", DataType::Utf8),
        ],
        (1..=n)
            .map(|i| {
                vec![
                    Value::Int64(i),
                    if i % 2 == 0 { Value::Null } else { Value::Float64(i as f64 + 0.5) },
                    Value::Utf8(format!("city {i}")),
                ]
            })
            .collect(),
    )
}

#[test]
fn sqlite_round_trip_keeps_order_types_and_nulls() {
    let mut sink = SqliteSink::in_memory().unwrap();
    let table = scores(5);

    // 5 rows in batches of 2 -> three insert statements
    assert_eq!(sink.replace_table("scores", &table, 2).unwrap(), 5);

    let back = sink.read_table("scores", None).unwrap();
    assert_eq!(back.columns, table.columns);
    assert_eq!(back.rows, table.rows);
}

#[test]
fn replace_discards_previous_contents_and_shape() {
    let mut sink = SqliteSink::in_memory().unwrap();
    sink.replace_table("brand_image", &scores(4), 100).unwrap();

    let replacement = Table::new(
        vec![Column::new("Brand", DataType::Utf8)],
        vec![vec![Value::Utf8("Highlands".into())]],
    );
    assert_eq!(sink.replace_table("brand_image", &replacement, 100).unwrap(), 1);

    let back = sink.read_table("brand_image", None).unwrap();
    assert_eq!(back, replacement);
}

#[test]
fn read_back_honours_limit() {
    let mut sink = SqliteSink::in_memory().unwrap();
    sink.replace_table("scores", &scores(10), 3).unwrap();

    let head = sink.read_table("scores", Some(5)).unwrap();
    assert_eq!(head.row_count(), 5);
    assert_eq!(head.rows[4][0], Value::Int64(5));
}

#[test]
fn header_only_table_is_created_empty() {
    let mut sink = SqliteSink::in_memory().unwrap();
    let empty = Table::new(
        vec![Column::new("a", DataType::Utf8), Column::new("b", DataType::Utf8)],
        vec![],
    );
    assert_eq!(sink.replace_table("empty", &empty, 10).unwrap(), 0);

    let back = sink.read_table("empty", None).unwrap();
    assert_eq!(back.column_count(), 2);
    assert_eq!(back.row_count(), 0);
}

#[test]
fn duplicate_and_blank_headers_are_renamed() {
    let mut sink = SqliteSink::in_memory().unwrap();
    let table = Table::new(
        vec![
            Column::new("ID", DataType::Int64),
            Column::new("", DataType::Utf8),
            Column::new("ID", DataType::Int64),
        ],
        vec![vec![Value::Int64(1), Value::Utf8("x".into()), Value::Int64(2)]],
    );
    sink.replace_table("dupes", &table, 10).unwrap();

    let back = sink.read_table("dupes", None).unwrap();
    let names: Vec<&str> = back.column_names().collect();
    assert_eq!(names, vec!["ID", "Unnamed: 1", "ID.1"]);
    assert_eq!(back.rows, table.rows);
}

#[test]
fn wide_tables_stay_under_the_bind_limit() {
    let columns: Vec<Column> = (0..400).map(|i| Column::new(format!("c{i}"), DataType::Int64)).collect();
    let rows: Vec<Vec<Value>> = (0..200)
        .map(|r| (0..400).map(|c| Value::Int64(r * 1000 + c)).collect())
        .collect();
    let table = Table::new(columns, rows);

    let mut sink = SqliteSink::in_memory().unwrap();
    assert_eq!(sink.replace_table("wide", &table, 50_000).unwrap(), 200);
    assert_eq!(sink.read_table("wide", None).unwrap().rows, table.rows);
}

#[test]
fn invalid_writes_are_rejected_before_dropping() {
    let mut sink = SqliteSink::in_memory().unwrap();
    sink.replace_table("scores", &scores(2), 10).unwrap();

    assert!(matches!(
        sink.replace_table("scores", &scores(3), 0),
        Err(SinkError::InvalidBatchSize(0))
    ));
    assert!(matches!(
        sink.replace_table("scores", &Table::new(vec![], vec![]), 10),
        Err(SinkError::NoColumns(_))
    ));
    assert_eq!(sink.read_table("scores", None).unwrap().row_count(), 2);
}

#[test]
fn missing_table_is_reported() {
    let mut sink = SqliteSink::in_memory().unwrap();
    assert!(matches!(
        sink.read_table("nope", None),
        Err(SinkError::TableNotFound(name)) if name == "nope"
    ));

    let mut memory = MemorySink::new();
    assert!(matches!(memory.read_table("nope", Some(1)), Err(SinkError::TableNotFound(_))));
}

#[test]
fn memory_sink_batches_rows_in_order() {
    let mut sink = MemorySink::new();
    assert_eq!(sink.replace_table("scores", &scores(5), 2).unwrap(), 5);

    let sizes: Vec<usize> = sink.batches().iter().map(|(_, n)| *n).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(sink.table("scores").unwrap().rows, scores(5).rows);
    assert_eq!(sink.describe(), "memory");
}

#[test]
fn sqlite_file_database_persists_between_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("loader.db").display());

    {
        let mut sink = SqliteSink::open(&url).unwrap();
        sink.replace_table("scores", &scores(3), 10).unwrap();
    }
    let mut reopened = SqliteSink::open(&url).unwrap();
    assert_eq!(reopened.read_table("scores", None).unwrap().row_count(), 3);
    assert!(reopened.describe().starts_with("sqlite "));
}

#[test]
fn sqlite_headers_differing_only_in_case_get_suffixes() {
    let mut sink = SqliteSink::in_memory().unwrap();
    let table = Table::new(
        vec![Column::new("ID", DataType::Int64), Column::new("id", DataType::Utf8)],
        vec![vec![Value::Int64(7), Value::Utf8("seven".into())]],
    );
    assert_eq!(sink.replace_table("cased", &table, 10).unwrap(), 1);

    let back = sink.read_table("cased", None).unwrap();
    let names: Vec<&str> = back.column_names().collect();
    assert_eq!(names, vec!["ID", "id.1"]);
    assert_eq!(back.rows, table.rows);
}

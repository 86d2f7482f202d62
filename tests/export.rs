use csv_table_loader::export::{write_csv, write_csv_to_path};
use csv_table_loader::ingestion::{run, LoadOptions};
use csv_table_loader::sink::{SqliteSink, TableSink};

#[test]
fn loaded_table_exports_back_to_csv() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Companion.csv"),
        "ID,Companion,Share\n1,Alone,0.25\n2,\"Friends, family\",\n3,Colleagues,3\n",
    )
    .unwrap();

    let mut sink = SqliteSink::in_memory().unwrap();
    run(dir.path(), &mut sink, &LoadOptions::default()).unwrap();

    let table = sink.read_table("companion", None).unwrap();
    let mut out = Vec::new();
    write_csv(&table, &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "ID,Companion,Share\n1,Alone,0.25\n2,\"Friends, family\",\n3,Colleagues,3.0\n"
    );
}

#[test]
fn sample_export_writes_first_rows_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("raw");
    std::fs::create_dir(&src).unwrap();
    let mut text = String::from("n,square\n");
    for i in 1..=20 {
        text.push_str(&format!("{i},{}\n", i * i));
    }
    std::fs::write(src.join("Squares.csv"), text).unwrap();

    let mut sink = SqliteSink::in_memory().unwrap();
    run(&src, &mut sink, &LoadOptions::default()).unwrap();

    let sample = sink.read_table("squares", Some(5)).unwrap();
    let out = dir.path().join("squares_sample.csv");
    write_csv_to_path(&sample, &out).unwrap();

    let written = std::fs::read_to_string(&out).unwrap();
    assert_eq!(written, "n,square\n1,1\n2,4\n3,9\n4,16\n5,25\n");
}

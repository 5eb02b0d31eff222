//! Pipeline benchmarks

use bookflow_core::reader::{CsvReader, JsonReader};
use bookflow_core::writer::{CallbackWriter, CsvWriter};
use bookflow_core::{AuthorInfo, BookInfo, SeriesInfo, Workflow, Writer};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn record(n: usize) -> BookInfo {
    let mut book = BookInfo::new("bench", format!("book-{}", n))
        .with_title(format!("Book number {}", n))
        .with_path("/library", format!("Author {}", n % 50));
    book.add_author(AuthorInfo::new(format!("Author {}", n % 50)));
    book.add_series(SeriesInfo::new(format!("Series {}", n % 20), (n % 7) as f64 + 1.0));
    book.add_identifier("isbn", format!("978{:010}", n));
    book.set_creation_date("2001-02-03");
    book
}

fn pipeline_benchmark(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = CsvWriter::open(&dir.path().join("books.csv"), true).unwrap();
    for n in 0..1000 {
        writer.add_book(&record(n), 0).unwrap();
    }
    writer.finish().unwrap();

    let json: Vec<BookInfo> = (0..1000).map(record).collect();
    std::fs::write(dir.path().join("books.json"), serde_json::to_vec(&json).unwrap()).unwrap();

    c.bench_function("csv_read_1000", |b| {
        b.iter(|| {
            let mut workflow = Workflow::new(
                Box::new(CsvReader::new()),
                Box::new(CallbackWriter::new(|_: &BookInfo, id| Ok(id))),
                None,
            );
            let report = workflow.process(dir.path(), "books.csv").unwrap();
            black_box(report.ok_count())
        })
    });

    c.bench_function("json_read_1000", |b| {
        b.iter(|| {
            let mut workflow = Workflow::new(
                Box::new(JsonReader::new()),
                Box::new(CallbackWriter::new(|_: &BookInfo, id| Ok(id))),
                None,
            );
            let report = workflow.process(dir.path(), "books.json").unwrap();
            black_box(report.ok_count())
        })
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);

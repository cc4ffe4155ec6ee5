//! Benchmarks pour le nommage et l'écriture GeoJSON

use std::collections::HashSet;
use std::path::PathBuf;

use cadtxt::{convert, GeometryOptions};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use txt2geo::export::geojson::export_to_geojson;
use txt2geo::export::plan::ProcessedFile;
use txt2geo::naming::{render_name_template, sanitize_name};

fn synthetic_document(parcels: usize) -> String {
    let mut text = String::from(
        "[属性描述]\n坐标系=2000国家大地坐标系\n几度分带=3\n投影类型=高斯克吕格\n带号=39\n[地块坐标]\n",
    );
    for p in 0..parcels {
        let x = 3_500_000.0 + p as f64 * 200.0;
        let y = 39_500_000.0;
        text.push_str(&format!("4,0.0100,P{p:05},地块{p},面,,,,@\n"));
        text.push_str(&format!("J1,1,{x:.3},{y:.3}\n"));
        text.push_str(&format!("J2,1,{:.3},{y:.3}\n", x + 100.0));
        text.push_str(&format!("J3,1,{:.3},{:.3}\n", x + 100.0, y + 100.0));
        text.push_str(&format!("J4,1,{x:.3},{:.3}\n", y + 100.0));
    }
    text
}

fn bench_naming(c: &mut Criterion) {
    let mut group = c.benchmark_group("naming");

    group.bench_function("render", |b| {
        b.iter(|| {
            black_box(render_name_template(
                black_box("{name:upper}_{index:04}_{date}"),
                "parcelles",
                42,
                1000,
            ))
        })
    });

    group.bench_function("sanitize_1000", |b| {
        b.iter(|| {
            let mut used = HashSet::new();
            for i in 0..1000 {
                black_box(sanitize_name(&format!("地块 数据 {}", i % 100), &mut used));
            }
        })
    });

    group.finish();
}

fn bench_geojson(c: &mut Criterion) {
    let result = convert(&synthetic_document(1000), GeometryOptions::default()).unwrap();
    let file = ProcessedFile {
        path: PathBuf::from("bench.txt"),
        fingerprint: String::new(),
        result,
    };
    let output = std::env::temp_dir().join("txt2geo_bench.geojson");

    let mut group = c.benchmark_group("geojson");
    group.throughput(Throughput::Elements(file.feature_count() as u64));
    group.sample_size(20);
    group.bench_function("write_1000", |b| {
        b.iter(|| black_box(export_to_geojson(&[&file], &output, true).unwrap()))
    });
    group.finish();

    std::fs::remove_file(output).ok();
}

criterion_group!(benches, bench_naming, bench_geojson);
criterion_main!(benches);

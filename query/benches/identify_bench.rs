use criterion::{black_box, criterion_group, criterion_main, Criterion};
use geo::polygon;
use geograph_core::model::{IdentificationMode, PolygonTable};
use query::{identify_graphs_with, IdentifyOptions};
use std::sync::Arc;
use storage::{GraphOptions, PolygonGraph};

const SIDE: usize = 30;

fn grid(offset: f64) -> PolygonTable {
    let rows = (0..SIDE * SIDE).map(|cell| {
        let x = (cell % SIDE) as f64 + offset;
        let y = (cell / SIDE) as f64 + offset;
        (
            polygon![
                (x: x, y: y),
                (x: x + 1.0, y: y),
                (x: x + 1.0, y: y + 1.0),
                (x: x, y: y + 1.0),
            ],
            (cell % 3) as i64,
        )
    });
    PolygonTable::from_rows(rows)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("build grid graph", |b| {
        b.iter(|| PolygonGraph::from_table(black_box(grid(0.0)), GraphOptions::default()))
    });

    let Ok(src) = PolygonGraph::from_table(grid(0.0), GraphOptions::default()) else {
        return;
    };
    let Ok(trg) = PolygonGraph::from_table(grid(0.5), GraphOptions::default()) else {
        return;
    };
    let (src, trg) = (Arc::new(src), Arc::new(trg));

    for parallel in [false, true] {
        for mode in [IdentificationMode::Interior, IdentificationMode::Corner] {
            let options = IdentifyOptions { mode, parallel };
            c.bench_function(&format!("identify {mode} parallel={parallel}"), |b| {
                b.iter(|| identify_graphs_with(&src, &trg, black_box(options)))
            });
        }
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

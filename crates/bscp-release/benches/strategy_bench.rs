// Benchmarks for strategy parsing and label matching
// Fan-out evaluates one predicate against every open session of an app

use std::collections::HashMap;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;

use bscp_release::{LabelMatcher, Predicate};

fn strategy() -> serde_json::Value {
    json!({
        "labelsOr": [{"zone": "gz", "set": "1"}, {"zone": "sh"}, {"zone": "bj", "set": "3"}],
        "labelsAnd": [{"env": "prod"}, {"tier": "web"}],
        "namespace": "blue"
    })
}

fn labels(i: usize) -> HashMap<String, String> {
    let zone = ["gz", "sh", "bj", "sz"][i % 4];
    HashMap::from([
        ("zone".to_string(), zone.to_string()),
        ("set".to_string(), (i % 5).to_string()),
        ("env".to_string(), "prod".to_string()),
        ("tier".to_string(), "web".to_string()),
        ("namespace".to_string(), "blue".to_string()),
    ])
}

fn bench_parse(c: &mut Criterion) {
    let value = strategy();
    let stored = serde_json::to_string(&value).unwrap();

    c.bench_function("strategy_parse", |b| {
        b.iter(|| Predicate::parse(black_box(&value)))
    });
    c.bench_function("strategy_parse_str", |b| {
        b.iter(|| Predicate::parse_str(black_box(&stored)))
    });
}

fn bench_match_sessions(c: &mut Criterion) {
    let predicate = Predicate::parse(&strategy()).unwrap();
    let mut group = c.benchmark_group("strategy_match");

    for count in [100, 1_000, 10_000] {
        let sessions: Vec<_> = (0..count).map(labels).collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &sessions, |b, sessions| {
            b.iter(|| {
                sessions
                    .iter()
                    .filter(|l| predicate.matches(black_box(l)))
                    .count()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_match_sessions);
criterion_main!(benches);

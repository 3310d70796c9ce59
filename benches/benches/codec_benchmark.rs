use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use zgraph::{
    codec::{deserializable, deserializing, serializable, serialize},
    Array, DeserializeOptions, Graph, Node, Object, SerializeOptions, TypedArray, Value,
};

/// Массив из `count` объектов вида `{ id, name, score, tags }`, где `tags`
/// разделяется всеми записями, а последняя запись ссылается на корень.
fn records(count: usize) -> (Graph, Value) {
    let mut rng = SmallRng::seed_from_u64(42);
    let mut graph = Graph::with_capacity(count + 2);

    let tags = graph.insert(Node::Array(Array::dense([
        Value::from("alpha"),
        Value::from("beta"),
    ])));
    let root = graph.insert(Node::Array(Array::new()));

    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let mut obj = Object::new();
        obj.insert("id", Value::Number(i as f64));
        obj.insert("name", Value::String(format!("record-{i}")));
        obj.insert("score", Value::Number(rng.gen::<f64>()));
        obj.insert("tags", Value::Ref(tags));
        ids.push(graph.insert(Node::Object(obj)));
    }
    if let Some(&last) = ids.last() {
        if let Some(Node::Object(obj)) = graph.get_mut(last) {
            obj.insert("parent", Value::Ref(root));
        }
    }
    if let Some(Node::Array(arr)) = graph.get_mut(root) {
        for id in ids {
            arr.push(Value::Ref(id));
        }
    }
    (graph, Value::Ref(root))
}

fn float_lanes(count: usize) -> (Graph, Value) {
    let mut rng = SmallRng::seed_from_u64(7);
    let mut graph = Graph::new();
    let lanes = (0..count).map(|_| rng.gen::<f64>()).collect();
    let id = graph.insert(Node::TypedArray(TypedArray::Float64(lanes)));
    (graph, Value::Ref(id))
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");
    let options = SerializeOptions::default();

    for &count in &[10usize, 1_000, 10_000] {
        let (graph, root) = records(count);
        let size = serialize(&graph, &root, &options).unwrap().len();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("records", count), &count, |b, _| {
            b.iter(|| black_box(serialize(black_box(&graph), &root, &options).unwrap()))
        });
    }

    let (graph, root) = float_lanes(100_000);
    let size = serialize(&graph, &root, &options).unwrap().len();
    group.throughput(Throughput::Bytes(size as u64));
    group.bench_function("float64_lanes", |b| {
        b.iter(|| black_box(serialize(black_box(&graph), &root, &options).unwrap()))
    });

    group.finish();
}

fn bench_pull_serializer(c: &mut Criterion) {
    let mut group = c.benchmark_group("serializable");
    let options = SerializeOptions::default();
    let (graph, root) = records(10_000);
    let size = serialize(&graph, &root, &options).unwrap().len();
    group.throughput(Throughput::Bytes(size as u64));

    for &chunk in &[64usize, 4 * 1024, 64 * 1024] {
        group.bench_with_input(BenchmarkId::new("chunk", chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let mut total = 0usize;
                let mut ser = serializable(&graph, &root, &options).unwrap();
                while let Some(bytes) = ser.next_chunk(chunk) {
                    total += bytes.len();
                }
                black_box(total)
            })
        });
    }

    group.finish();
}

fn bench_deserialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("deserialize");
    let options = DeserializeOptions::default();
    let (graph, root) = records(10_000);
    let bytes = serialize(&graph, &root, &SerializeOptions::default()).unwrap();
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("one_shot", |b| {
        b.iter(|| {
            let mut session = deserializable(&options).unwrap();
            session.feed(black_box(&bytes)).unwrap();
            black_box(session.finish().unwrap())
        })
    });

    for &chunk in &[1usize, 16, 4 * 1024] {
        group.bench_with_input(BenchmarkId::new("chunked", chunk), &chunk, |b, &chunk| {
            b.iter(|| black_box(deserializing(bytes.chunks(chunk), &options).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_serialize,
    bench_pull_serializer,
    bench_deserialize
);
criterion_main!(benches);

use tokio::io::duplex;
use zgraph::{
    codec::{CountHandler, ParseEvent, ParseHandler},
    Array, Codec, Graph, Node, Object, Value, ZgraphResult,
};

#[tokio::main]
async fn main() -> ZgraphResult<()> {
    println!("=== zgraph streaming examples ===\n");

    let (graph, root) = build_graph();

    example_1_pull_encoder(&graph, &root)?;
    example_2_chunked_decode(&graph, &root)?;
    example_3_observer(&graph, &root)?;
    example_4_async_pipe(graph, root).await?;

    println!("\n=== All examples completed successfully! ===");
    Ok(())
}

/// Список пользователей с общим объектом `team`, у которого есть ссылка
/// обратно на список.
fn build_graph() -> (Graph, Value) {
    let mut graph = Graph::new();
    let users = graph.insert(Node::Array(Array::new()));

    let mut team = Object::new();
    team.insert("name", Value::from("storage"));
    team.insert("members", Value::Ref(users));
    let team = graph.insert(Node::Object(team));

    let mut ids = Vec::new();
    for (i, name) in ["anna", "boris", "vera"].into_iter().enumerate() {
        let mut user = Object::new();
        user.insert("id", Value::Number(i as f64));
        user.insert("name", Value::from(name));
        user.insert("team", Value::Ref(team));
        ids.push(graph.insert(Node::Object(user)));
    }
    if let Some(Node::Array(list)) = graph.get_mut(users) {
        for id in ids {
            list.push(Value::Ref(id));
        }
    }
    (graph, Value::Ref(users))
}

/// Пример 1: кодирование по кускам фиксированного размера.
fn example_1_pull_encoder(
    graph: &Graph,
    root: &Value,
) -> ZgraphResult<()> {
    println!("Example 1: Pull encoder");
    println!("-----------------------");

    let mut serializer = Codec::new().serializable(graph, root)?;
    let mut chunks = 0;
    while let Some(chunk) = serializer.next_chunk(16) {
        if chunks < 3 {
            println!("  chunk {chunks}: {:02x?}", &chunk[..]);
        }
        chunks += 1;
    }
    println!(
        "{chunks} chunks, {} bytes total\n",
        serializer.bytes_produced()
    );
    Ok(())
}

/// Пример 2: декодирование по одному байту.
fn example_2_chunked_decode(
    graph: &Graph,
    root: &Value,
) -> ZgraphResult<()> {
    println!("Example 2: Byte-at-a-time decode");
    println!("--------------------------------");

    let codec = Codec::new();
    let bytes = codec.serialize(graph, root)?;
    let mut session = codec.deserializable()?;
    let mut max_depth = 0;
    for byte in bytes.chunks(1) {
        session.feed(byte)?;
        max_depth = max_depth.max(session.depth());
    }
    println!(
        "accepted {} bytes, max open structures {max_depth}",
        session.bytes_accepted()
    );

    let doc = session.finish()?;
    println!(
        "decoded {} nodes, isomorphic to source: {}\n",
        doc.graph.len(),
        doc.is_isomorphic(&zgraph::Document::new(graph.clone(), root.clone()))
    );
    Ok(())
}

/// Печатает ключи объектов по мере разбора и считает заголовки.
#[derive(Default)]
struct KeyPrinter {
    counts: CountHandler,
}

impl ParseHandler for KeyPrinter {
    fn handle_event(
        &mut self,
        event: ParseEvent<'_>,
    ) {
        if let ParseEvent::RawString { offset, value, .. } = &event {
            println!("  key {value:?} at byte {offset}");
        }
        self.counts.handle_event(event);
    }
}

/// Пример 3: наблюдатель событий разбора.
fn example_3_observer(
    graph: &Graph,
    root: &Value,
) -> ZgraphResult<()> {
    println!("Example 3: Parse observer");
    println!("-------------------------");

    let codec = Codec::new();
    let bytes = codec.serialize(graph, root)?;
    let mut session = codec.deserializable_with(KeyPrinter::default())?;
    session.feed(&bytes)?;
    let (result, printer) = session.finish_with_handler();
    result?;
    println!(
        "{} items, {} back-references\n",
        printer.counts.items, printer.counts.back_references
    );
    Ok(())
}

/// Пример 4: запись и чтение через асинхронный канал.
async fn example_4_async_pipe(
    graph: Graph,
    root: Value,
) -> ZgraphResult<()> {
    println!("Example 4: Async pipe");
    println!("---------------------");

    let (writer, reader) = duplex(64);
    let codec = Codec::new();

    let producer = {
        let codec = codec.clone();
        tokio::spawn(async move { codec.write_to_async(&graph, &root, writer, 32).await })
    };
    let doc = codec.read_from_async(reader).await?;
    let written = producer.await.map_err(std::io::Error::other)??;

    println!("wrote {written} bytes, read back {} nodes", doc.graph.len());
    Ok(())
}

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use zgraph::{deserializable, DeserializeOptions};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    data: Vec<u8>,
    /// Длины чанков; перебираются по кругу.
    splits: Vec<u8>,
    max_length: u16,
}

fuzz_target!(|input: FuzzInput| {
    let options = DeserializeOptions::default().with_max_length(u64::from(input.max_length).max(1));

    // Эталон: тот же вход одним куском.
    let whole = deserializable(&options).and_then(|mut session| {
        session.feed(&input.data)?;
        session.finish()
    });

    let mut session = match deserializable(&options) {
        Ok(session) => session,
        Err(_) => return,
    };
    let mut rest = input.data.as_slice();
    let mut splits = input.splits.iter().cycle();
    let mut fed = Ok(());
    while !rest.is_empty() && fed.is_ok() {
        let len = splits
            .next()
            .map(|&n| usize::from(n).max(1))
            .unwrap_or(rest.len())
            .min(rest.len());
        let (chunk, tail) = rest.split_at(len);
        fed = session.feed(chunk);
        rest = tail;
    }
    let chunked = fed.and_then(|_| session.finish());

    // Разбиение на чанки не влияет на исход. Сверх лимита длины чанковый
    // разбор может раньше упасть на битом байте, поэтому там сверяется
    // только сам факт ошибки.
    let within_limit = input.data.len() as u64 <= options.max_length;
    match (&whole, &chunked) {
        (Ok(a), Ok(b)) => assert!(a.is_isomorphic(b), "chunking changed the result"),
        (Err(a), Err(b)) if within_limit => assert_eq!(a.status_code(), b.status_code()),
        (Err(_), Err(_)) => {}
        _ => panic!("chunking changed success: {whole:?} vs {chunked:?}"),
    }
});

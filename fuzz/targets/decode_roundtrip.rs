#![no_main]

use libfuzzer_sys::fuzz_target;
use zgraph::{deserialize, serialize, DeserializeOptions, SerializeOptions};

fuzz_target!(|data: &[u8]| {
    // Декодер не должен паниковать ни на каких данных.
    let Ok(doc) = deserialize(data, &DeserializeOptions::default()) else {
        return;
    };

    // Всё, что удалось декодировать, кодируется обратно и даёт тот же граф.
    let bytes = serialize(&doc.graph, &doc.root, &SerializeOptions::default())
        .expect("decoded graph must be encodable");
    let again = deserialize(&bytes, &DeserializeOptions::default())
        .expect("re-encoded stream must decode");
    assert!(doc.is_isomorphic(&again), "round trip changed the graph");
});

use std::sync::Arc;

use caselake_core::types::IndexedRecord;
use caselake_core::Error;
use caselake_embed::FakeEmbedder;
use caselake_vector::{IndexStorage, LanceStorage, VectorIndex};
use tempfile::TempDir;

const DIM: usize = 16;

fn records(texts: &[&str], source: &str) -> Vec<IndexedRecord> {
    texts.iter().map(|t| IndexedRecord { text: t.to_string(), source: source.to_string() }).collect()
}

#[test]
fn lance_backend_round_trips_in_insertion_order() {
    let tmp = TempDir::new().expect("tmp");
    let embedder = FakeEmbedder::new(DIM);
    let texts = ["solar farm tender", "hospital bed occupancy", "retail shrinkage audit"];

    {
        let storage = Arc::new(LanceStorage::open(tmp.path(), "chunks").expect("storage"));
        let index = VectorIndex::open_or_create(storage, DIM).expect("open");
        index.reset().expect("reset");
        index
            .add(texts.iter().map(|t| embedder.embed_text(t)).collect(), records(&texts, "energy.pdf"))
            .expect("add");
        index.add(vec![embedder.embed_text("fmcg snacks")], records(&["fmcg snacks"], "fmcg_snacks.pdf")).expect("add");
    }

    let storage = Arc::new(LanceStorage::open(tmp.path(), "chunks").expect("storage"));
    let snapshot = storage.load().expect("load").expect("persisted");
    let order: Vec<&str> = snapshot.records.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(order, vec!["solar farm tender", "hospital bed occupancy", "retail shrinkage audit", "fmcg snacks"]);

    let index = VectorIndex::open_existing(storage, DIM).expect("existing");
    assert_eq!(index.count(), 4);
    let hits = index.search(&embedder.embed_text("hospital bed occupancy"), 2).expect("search");
    assert_eq!(hits[0].text, "hospital bed occupancy");
    assert!(hits[0].score > 0.99);
    assert_eq!(index.sources(), vec!["energy.pdf", "fmcg_snacks.pdf"]);
}

#[test]
fn lance_reset_and_missing_index() {
    let tmp = TempDir::new().expect("tmp");
    let storage = Arc::new(LanceStorage::open(tmp.path(), "chunks").expect("storage"));
    assert!(matches!(VectorIndex::open_existing(storage.clone(), DIM), Err(Error::IndexNotFound(_))));

    let index = VectorIndex::open_or_create(storage.clone(), DIM).expect("open");
    index.add(vec![vec![0.25; DIM]], records(&["x"], "x.pdf")).expect("add");
    index.reset().expect("reset");
    index.reset().expect("reset again");
    assert_eq!(index.count(), 0);
    assert_eq!(storage.load().expect("load").expect("persisted").records.len(), 0);
}

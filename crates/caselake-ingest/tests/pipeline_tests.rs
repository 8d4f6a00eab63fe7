use std::fs;
use std::sync::Arc;

use caselake_core::chunker::{reassemble, Chunker};
use caselake_core::retry::RetryPolicy;
use caselake_core::traits::{FileStore, TextExtractor};
use caselake_core::types::{DocumentRef, IndexedRecord, PDF_MIME};
use caselake_core::{Error, Result};
use caselake_embed::{EmbeddingGateway, FakeEmbedder};
use caselake_ingest::{IngestPipeline, LocalFolderStore, PdfTextExtractor};
use caselake_vector::{MemoryStorage, VectorIndex};
use tempfile::TempDir;

const DIM: usize = 16;
const FOLDER: &str = "CASE_STUDIES";

/// Documents whose bytes are UTF-8 text, pages separated by form feeds.
struct StubStore {
    docs: Vec<(DocumentRef, Vec<u8>)>,
    fail_fetch_of: Option<String>,
}

impl StubStore {
    fn new(docs: &[(&str, &str, &str)]) -> Self {
        Self {
            docs: docs
                .iter()
                .map(|(name, mime, body)| {
                    (DocumentRef { id: format!("id-{}", name), name: name.to_string(), mime_type: mime.to_string() }, body.as_bytes().to_vec())
                })
                .collect(),
            fail_fetch_of: None,
        }
    }
}

impl FileStore for StubStore {
    fn resolve_folder(&self, name: &str) -> Result<String> {
        if name == FOLDER { Ok("folder-1".into()) } else { Err(Error::FolderNotFound(name.into())) }
    }

    fn list_documents(&self, _folder_id: &str) -> Result<Vec<DocumentRef>> {
        Ok(self.docs.iter().map(|(d, _)| d.clone()).collect())
    }

    fn fetch_content(&self, id: &str) -> Result<Vec<u8>> {
        if self.fail_fetch_of.as_deref() == Some(id) {
            return Err(Error::provider("stub", "connection reset", false));
        }
        self.docs.iter().find(|(d, _)| d.id == id).map(|(_, b)| b.clone()).ok_or_else(|| Error::provider("stub", "missing", false))
    }
}

struct PagesExtractor;

impl TextExtractor for PagesExtractor {
    fn extract_pages(&self, _name: &str, bytes: &[u8]) -> Result<Vec<Option<String>>> {
        let text = String::from_utf8_lossy(bytes);
        Ok(text.split('\u{c}').map(|p| if p.is_empty() { None } else { Some(p.to_string()) }).collect())
    }
}

fn seeded_index() -> Arc<VectorIndex> {
    let index = Arc::new(VectorIndex::open_or_create(Arc::new(MemoryStorage::new()), DIM).unwrap());
    index
        .add(vec![vec![0.5; DIM]], vec![IndexedRecord { text: "stale".into(), source: "old.pdf".into() }])
        .unwrap();
    index
}

fn pipeline(store: StubStore, index: Arc<VectorIndex>, chunker: Chunker, folder: &str) -> IngestPipeline {
    let gateway = EmbeddingGateway::new(Arc::new(FakeEmbedder::new(DIM)), DIM, 4, RetryPolicy::none()).unwrap();
    IngestPipeline::new(Arc::new(store), Arc::new(PagesExtractor), gateway, index, chunker, folder).unwrap()
}

#[test]
fn ingests_pdfs_and_tags_chunks_with_document_names() {
    let store = StubStore::new(&[
        ("fashion_retail.pdf", PDF_MIME, "Fashion retail footfall grew.\u{c}Store formats compared."),
        ("fmcg_snacks.pdf", PDF_MIME, "Snack category penetration in tier-2 cities."),
        ("notes.txt", "text/plain", "not a pdf"),
        ("scanned.pdf", PDF_MIME, "\u{c}\u{c}   "),
    ]);
    let index = seeded_index();
    let report = pipeline(store, index.clone(), Chunker::new(20, 5).unwrap(), FOLDER).run().expect("ingest");

    assert_eq!(report.documents, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.chunks, index.count());
    assert_eq!(index.metadata_count(), index.count());
    assert_eq!(index.sources(), vec!["fashion_retail.pdf", "fmcg_snacks.pdf"]);

    let snapshot = index.snapshot();
    let fashion: Vec<String> =
        snapshot.records.iter().filter(|r| r.source == "fashion_retail.pdf").map(|r| r.text.clone()).collect();
    assert_eq!(reassemble(&fashion, 5), "Fashion retail footfall grew. Store formats compared.");
}

#[test]
fn pages_join_with_single_spaces_and_missing_pages_count_as_empty() {
    let store = StubStore::new(&[("deck.pdf", PDF_MIME, "alpha\u{c}\u{c}beta")]);
    let index = Arc::new(VectorIndex::open_or_create(Arc::new(MemoryStorage::new()), DIM).unwrap());
    pipeline(store, index.clone(), Chunker::new(800, 100).unwrap(), FOLDER).run().unwrap();
    assert_eq!(index.snapshot().records[0].text, "alpha  beta");
}

#[test]
fn only_blank_documents_is_no_extractable_content_and_leaves_index_empty() {
    let store = StubStore::new(&[("scan1.pdf", PDF_MIME, ""), ("scan2.pdf", PDF_MIME, " \n \u{c} ")]);
    let index = seeded_index();
    let err = pipeline(store, index.clone(), Chunker::new(800, 100).unwrap(), FOLDER).run().unwrap_err();
    assert!(matches!(err, Error::NoExtractableContent { documents: 2 }));
    assert_eq!(index.count(), 0);
    assert!(index.sources().is_empty());
}

#[test]
fn folder_without_pdfs_is_no_documents_found() {
    let store = StubStore::new(&[("readme.txt", "text/plain", "hello")]);
    let index = seeded_index();
    let err = pipeline(store, index.clone(), Chunker::new(800, 100).unwrap(), FOLDER).run().unwrap_err();
    assert!(matches!(err, Error::NoDocumentsFound(ref f) if f == FOLDER));
    assert_eq!(index.count(), 0);
}

#[test]
fn missing_folder_aborts_after_reset() {
    let store = StubStore::new(&[("a.pdf", PDF_MIME, "text")]);
    let index = seeded_index();
    let err = pipeline(store, index.clone(), Chunker::new(800, 100).unwrap(), "NOPE").run().unwrap_err();
    assert!(matches!(err, Error::FolderNotFound(_)));
    assert_eq!(index.count(), 0);
}

#[test]
fn fetch_failure_aborts_without_partial_commit() {
    let mut store = StubStore::new(&[("a.pdf", PDF_MIME, "first document"), ("b.pdf", PDF_MIME, "second document")]);
    store.fail_fetch_of = Some("id-b.pdf".into());
    let index = seeded_index();
    let err = pipeline(store, index.clone(), Chunker::new(800, 100).unwrap(), FOLDER).run().unwrap_err();
    assert!(matches!(err, Error::Provider { .. }));
    assert_eq!(index.count(), 0, "a.pdf must not be committed on its own");
}

#[test]
fn gateway_and_index_dimensions_must_agree() {
    let gateway = EmbeddingGateway::new(Arc::new(FakeEmbedder::new(8)), 8, 4, RetryPolicy::none()).unwrap();
    let index = Arc::new(VectorIndex::open_or_create(Arc::new(MemoryStorage::new()), DIM).unwrap());
    let res = IngestPipeline::new(Arc::new(StubStore::new(&[])), Arc::new(PagesExtractor), gateway, index, Chunker::new(10, 2).unwrap(), FOLDER);
    assert!(matches!(res, Err(Error::DimensionMismatch { expected: DIM, actual: 8 })));
}

#[test]
fn local_folder_store_lists_files_with_inferred_mime_types() {
    let tmp = TempDir::new().unwrap();
    let folder = tmp.path().join(FOLDER);
    fs::create_dir_all(folder.join("nested")).unwrap();
    fs::write(folder.join("b_fmcg.PDF"), b"%PDF-1.5").unwrap();
    fs::write(folder.join("a_fashion.pdf"), b"%PDF-1.5").unwrap();
    fs::write(folder.join("notes.txt"), b"x").unwrap();

    let store = LocalFolderStore::new(tmp.path());
    assert!(matches!(store.resolve_folder("MISSING"), Err(Error::FolderNotFound(_))));
    let id = store.resolve_folder(FOLDER).unwrap();
    let docs = store.list_documents(&id).unwrap();
    let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["a_fashion.pdf", "b_fmcg.PDF", "notes.txt"]);
    assert!(docs[0].is_pdf() && docs[1].is_pdf() && !docs[2].is_pdf());
    assert_eq!(store.fetch_content(&docs[0].id).unwrap(), b"%PDF-1.5");
}

#[test]
fn unparseable_pdf_is_invalid_document() {
    let err = PdfTextExtractor::new().extract_pages("broken.pdf", b"definitely not a pdf").unwrap_err();
    assert!(matches!(err, Error::InvalidDocument { ref name, .. } if name == "broken.pdf"));
}

#[test]
fn pdf_pages_are_extracted_in_order() {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! { "Font" => dictionary! { "F1" => font_id } });
    let mut kids: Vec<Object> = Vec::new();
    for text in ["Retail audit findings", "Snack volume uplift"] {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => 2,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let pages = PdfTextExtractor::new().extract_pages("two_pages.pdf", &bytes).unwrap();
    assert_eq!(pages.len(), 2);
    assert!(pages[0].as_deref().unwrap_or_default().contains("Retail audit findings"));
    assert!(pages[1].as_deref().unwrap_or_default().contains("Snack volume uplift"));
}

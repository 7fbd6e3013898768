//! Concatenate per-page PDFs into one document with `lopdf`.
//!
//! ## Page Order
//!
//! Inputs are appended in the order given, and each input's pages in their
//! own page-tree order. Callers pass buffers sorted by work-item ordinal
//! (see [`successful_pdfs`]), so the merged document reads in input order.
//!
//! ## Object Copying
//!
//! Each input is renumbered past the current maximum object id before its
//! objects are copied, so ids never collide. Catalog, page-tree and outline
//! nodes are left behind; page dictionaries get `MediaBox`, `CropBox`,
//! `Resources` and `Rotate` copied down from their old parents so nothing
//! they inherited is lost when they are re-parented.
//!
//! Unreadable inputs are skipped and reported in [`MergeReport::skipped`].

use crate::error::Web2PdfError;
use crate::output::BatchSummary;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, info, warn};

/// Attributes a page may inherit from an ancestor `Pages` node.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Page-tree depth beyond which an inherited attribute lookup gives up.
const MAX_TREE_DEPTH: usize = 64;

/// An input the merge could not use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedInput {
    /// Position in the input slice.
    pub index: usize,
    pub reason: String,
}

/// The merged document plus what went into it.
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub merged_inputs: usize,
    pub skipped: Vec<SkippedInput>,
}

/// PDF bytes of every successful outcome, ordered by ordinal.
pub fn successful_pdfs(summary: &BatchSummary) -> Vec<&[u8]> {
    let mut ok: Vec<_> = summary
        .results
        .iter()
        .filter_map(|r| r.pdf_bytes.as_deref().map(|b| (r.work_item.ordinal, b)))
        .collect();
    ok.sort_by_key(|(ordinal, _)| *ordinal);
    ok.into_iter().map(|(_, b)| b).collect()
}

/// Merge on the blocking pool; parsing and serialising large documents
/// is CPU-bound.
pub async fn merge_pdfs(inputs: Vec<Vec<u8>>) -> Result<MergeReport, Web2PdfError> {
    tokio::task::spawn_blocking(move || merge_documents(&inputs))
        .await
        .map_err(|e| Web2PdfError::Internal(format!("merge task panicked: {e}")))?
}

/// Merge `inputs` in order. A zero-page result is not an error.
pub fn merge_documents<B: AsRef<[u8]>>(inputs: &[B]) -> Result<MergeReport, Web2PdfError> {
    let mut merged = Document::with_version("1.5");
    let pages_id = merged.new_object_id();
    let catalog_id = merged.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    let mut skipped = Vec::new();
    let mut merged_inputs = 0;

    for (index, input) in inputs.iter().enumerate() {
        let mut doc = match Document::load_mem(input.as_ref()) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Skipping unreadable PDF #{}: {e}", index + 1);
                skipped.push(SkippedInput {
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        doc.renumber_objects_with(merged.max_id + 1);
        merged.max_id = merged.max_id.max(doc.max_id);

        // Page number → object id, already in reading order.
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let mut pages = Vec::with_capacity(page_ids.len());
        for id in &page_ids {
            let Ok(Object::Dictionary(dict)) = doc.get_object(*id).cloned() else {
                warn!("PDF #{}: page object {id:?} is not a dictionary", index + 1);
                continue;
            };
            pages.push((*id, materialise_page(&doc, dict, pages_id)));
        }

        for (id, object) in doc.objects {
            if !is_structural(&object) {
                merged.objects.insert(id, object);
            }
        }
        for (id, dict) in pages {
            merged.objects.insert(id, Object::Dictionary(dict));
            kids.push(Object::Reference(id));
        }

        debug!("PDF #{}: {} page(s) appended", index + 1, page_ids.len());
        merged_inputs += 1;
    }

    let page_count = kids.len();

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Kids", Object::Array(kids));
    pages.set("Count", Object::Integer(page_count as i64));
    merged.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    merged.objects.insert(catalog_id, Object::Dictionary(catalog));

    merged.trailer.set("Root", Object::Reference(catalog_id));
    merged.prune_objects();

    let mut bytes = Vec::new();
    merged
        .save_to(&mut bytes)
        .map_err(|e| Web2PdfError::Internal(format!("failed to serialise merged PDF: {e}")))?;

    info!(
        "Merged {} page(s) from {} of {} PDF(s)",
        page_count,
        merged_inputs,
        inputs.len()
    );
    Ok(MergeReport {
        bytes,
        page_count,
        merged_inputs,
        skipped,
    })
}

/// Re-parent a page under `new_parent`, pulling down inherited attributes.
fn materialise_page(doc: &Document, mut page: Dictionary, new_parent: ObjectId) -> Dictionary {
    for key in INHERITABLE {
        if page.has(key) {
            continue;
        }
        if let Some(value) = inherited(doc, &page, key) {
            page.set(key.to_vec(), value);
        }
    }
    page.set("Parent", Object::Reference(new_parent));
    page
}

/// Walk up the `Parent` chain looking for `key`.
fn inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_object(parent?).and_then(Object::as_dict).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Document-level nodes rebuilt by the merge rather than copied.
fn is_structural(object: &Object) -> bool {
    let kind = object
        .as_dict()
        .ok()
        .and_then(|d| d.get(b"Type").ok())
        .and_then(|t| t.as_name().ok());
    matches!(
        kind,
        Some(b"Catalog") | Some(b"Pages") | Some(b"Outlines") | Some(b"Outline")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RenderError, RenderErrorKind};
    use crate::output::{RenderOutcome, RenderedPage, WorkItem};
    use chrono::Utc;

    /// One page per width; MediaBox is set on the page itself, or on the
    /// parent `Pages` node when `inherit` is true.
    fn fixture(widths: &[i64], inherit: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let media_box =
            |w: i64| Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Integer(w), Object::Integer(100)]);

        let mut kids = Vec::new();
        for w in widths {
            let mut page = Dictionary::new();
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", Object::Reference(pages_id));
            if !inherit {
                page.set("MediaBox", media_box(*w));
            }
            kids.push(Object::Reference(doc.add_object(Object::Dictionary(page))));
        }

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(kids.len() as i64));
        pages.set("Kids", Object::Array(kids));
        if inherit {
            pages.set("MediaBox", media_box(widths[0]));
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(Object::Dictionary(catalog));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn page_widths(pdf: &[u8]) -> Vec<i64> {
        let doc = Document::load_mem(pdf).unwrap();
        doc.get_pages()
            .into_values()
            .map(|id| {
                let page = doc.get_object(id).unwrap().as_dict().unwrap();
                page.get(b"MediaBox").unwrap().as_array().unwrap()[2]
                    .as_i64()
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn pages_follow_input_order() {
        let inputs = vec![fixture(&[101, 102], false), fixture(&[201], false), fixture(&[301, 302], false)];
        let report = merge_documents(&inputs).unwrap();
        assert_eq!(report.page_count, 5);
        assert_eq!(report.merged_inputs, 3);
        assert_eq!(page_widths(&report.bytes), vec![101, 102, 201, 301, 302]);
    }

    #[test]
    fn corrupt_input_is_skipped() {
        let inputs = vec![fixture(&[101], false), b"not a pdf at all".to_vec(), fixture(&[301], false)];
        let report = merge_documents(&inputs).unwrap();
        assert_eq!(page_widths(&report.bytes), vec![101, 301]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
    }

    #[test]
    fn zero_pages_is_legal() {
        let report = merge_documents(&[b"garbage".to_vec()]).unwrap();
        assert_eq!(report.page_count, 0);
        assert_eq!(report.merged_inputs, 0);
        assert!(report.bytes.starts_with(b"%PDF"));

        let empty: Vec<Vec<u8>> = Vec::new();
        assert_eq!(merge_documents(&empty).unwrap().page_count, 0);
    }

    #[test]
    fn inherited_media_box_survives_reparenting() {
        let report = merge_documents(&[fixture(&[555, 555], true)]).unwrap();
        assert_eq!(page_widths(&report.bytes), vec![555, 555]);
    }

    #[tokio::test]
    async fn merge_runs_off_the_async_runtime() {
        let report = merge_pdfs(vec![fixture(&[1], false), fixture(&[2], false)]).await.unwrap();
        assert_eq!(page_widths(&report.bytes), vec![1, 2]);
    }

    #[test]
    fn successful_pdfs_sorted_by_ordinal() {
        let ok = |ordinal: usize, byte: u8| {
            RenderOutcome::success(
                WorkItem::new(format!("https://a.com/{ordinal}"), ordinal),
                RenderedPage {
                    pdf: vec![byte],
                    ..RenderedPage::default()
                },
                1,
            )
        };
        let failed = RenderOutcome::failure(
            WorkItem::new("https://a.com/1", 1),
            RenderError::new("https://a.com/1", RenderErrorKind::Navigation, "down"),
            3,
        );
        let summary = BatchSummary {
            total: 3,
            successful: 2,
            failed: 1,
            duration_seconds: 0.0,
            output_location: "out".into(),
            started_at: Utc::now(),
            results: vec![ok(2, b'c'), failed, ok(0, b'a')],
        };
        assert_eq!(successful_pdfs(&summary), vec![&b"a"[..], &b"c"[..]]);
    }
}

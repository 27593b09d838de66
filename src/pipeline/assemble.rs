//! Document assembly: pack normalized JPEG pages into a single PDF.
//!
//! ## Why DCTDecode XObjects?
//!
//! The normalizer already produced final JPEG streams. PDF can embed a JPEG
//! stream verbatim as an image XObject with the `DCTDecode` filter, so the
//! packaging step is lossless by construction — the bytes a reader
//! decompresses are exactly the bytes the normalizer encoded. No second
//! encode pass, no generation loss, no decode buffers held here.
//!
//! ## Atomic finalisation
//!
//! The document is written to a named temp file in the target directory and
//! renamed into place only after a complete, valid save. A crash, full disk,
//! or batch cancellation therefore never leaves a truncated PDF at the final
//! path — either the finished document exists or nothing does.

use crate::error::Cb2PdfError;
use crate::pipeline::normalize::NormalizedPage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Pack pages into a PDF at `target`, atomically. Returns the output size
/// in bytes.
///
/// Pages are embedded in ordinal order. `source` only feeds error messages;
/// `title` lands in the PDF /Info dictionary.
pub fn assemble(
    mut pages: Vec<NormalizedPage>,
    source: &Path,
    target: &Path,
    title: &str,
) -> Result<u64, Cb2PdfError> {
    if pages.is_empty() {
        return Err(Cb2PdfError::AssemblyFailed {
            path: source.to_path_buf(),
            detail: "no pages survived normalization".into(),
        });
    }
    pages.sort_by_key(|p| p.ordinal);

    let doc = build_document(pages, title).map_err(|e| Cb2PdfError::AssemblyFailed {
        path: source.to_path_buf(),
        detail: e.to_string(),
    })?;

    write_atomic(doc, target)
}

/// Build the in-memory PDF object tree.
fn build_document(pages: Vec<NormalizedPage>, title: &str) -> Result<Document, lopdf::Error> {
    let page_count = pages.len();
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(page_count);

    for page in pages {
        let (w, h) = (page.width as i64, page.height as i64);

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w,
                "Height" => h,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            page.jpeg,
        ));

        // One pixel maps to one point: scale the unit image square to the
        // page box and draw.
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![w.into(), 0.into(), 0.into(), h.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Producer" => Object::string_literal(concat!("cb2pdf ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    debug!(pages = page_count, "built PDF object tree");
    Ok(doc)
}

/// Save to a temp file next to `target`, then rename into place.
fn write_atomic(mut doc: Document, target: &Path) -> Result<u64, Cb2PdfError> {
    let io_err = |source: std::io::Error| Cb2PdfError::OutputWriteFailed {
        path: target.to_path_buf(),
        source,
    };

    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(io_err)?;

    // Temp file lives in the target directory so the final rename stays on
    // one filesystem and is therefore atomic.
    let tmp = tempfile::Builder::new()
        .prefix(".cb2pdf-")
        .suffix(".pdf.tmp")
        .tempfile_in(&parent)
        .map_err(io_err)?;

    let mut writer = BufWriter::new(tmp.as_file());
    doc.save_to(&mut writer)
        .map_err(|e| Cb2PdfError::AssemblyFailed {
            path: target.to_path_buf(),
            detail: format!("PDF serialisation failed: {e}"),
        })?;
    writer.flush().map_err(io_err)?;
    drop(writer);

    let bytes = tmp.as_file().metadata().map_err(io_err)?.len();
    tmp.persist(target).map_err(|e| Cb2PdfError::OutputWriteFailed {
        path: target.to_path_buf(),
        source: e.error,
    })?;

    info!(target = %target.display(), bytes, "finalised PDF");
    Ok(bytes)
}

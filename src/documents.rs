//! Carga de PDFs desde un directorio y reducción de metadatos.

use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::models::{Document, Metadata, SOURCE_KEY};

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Recorre `dir` recursivamente y extrae el texto de cada PDF, una
/// `Document` por página con metadatos `source` y `page`.
///
/// Un directorio inexistente o sin PDFs produce una lista vacía. Los PDFs
/// que no se pueden leer se registran y se omiten.
pub fn load_pdf_files(dir: &Path) -> Vec<Document> {
    if !dir.is_dir() {
        warn!("El directorio de datos no existe: {}", dir.display());
        return Vec::new();
    }

    let mut documents = Vec::new();
    let pdf_paths = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_pdf(e.path()))
        .map(|e| e.into_path());

    for path in pdf_paths {
        let pages = match pdf_extract::extract_text_by_pages(&path) {
            Ok(pages) => pages,
            Err(e) => {
                warn!("No se pudo extraer texto del PDF {}: {}. Saltando fichero.", path.display(), e);
                continue;
            }
        };

        let source = path.to_string_lossy().to_string();
        info!("Cargado {} ({} páginas)", source, pages.len());

        for (page, text) in pages.into_iter().enumerate() {
            let mut metadata = Metadata::new();
            metadata.insert(SOURCE_KEY.to_string(), Value::String(source.clone()));
            metadata.insert("page".to_string(), Value::from(page as u64));
            documents.push(Document::new(text, metadata));
        }
    }

    documents
}

/// Deja en cada documento sólo el texto y el metadato `source`.
pub fn filter_to_minimal_docs(docs: Vec<Document>) -> Vec<Document> {
    docs.into_iter()
        .map(|doc| {
            let mut metadata = Metadata::new();
            let source = doc.metadata.get(SOURCE_KEY).cloned().unwrap_or(Value::Null);
            metadata.insert(SOURCE_KEY.to_string(), source);
            Document::new(doc.page_content, metadata)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_directory_yields_no_documents() {
        let docs = load_pdf_files(Path::new("/definitely/not/here"));
        assert!(docs.is_empty());
    }

    #[test]
    fn directory_without_pdfs_yields_no_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a pdf").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("readme.md"), "# hi").unwrap();

        assert!(load_pdf_files(dir.path()).is_empty());
    }

    #[test]
    fn unreadable_pdf_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.PDF"), b"this is not a pdf").unwrap();

        assert!(load_pdf_files(dir.path()).is_empty());
    }

    #[test]
    fn pdf_extension_is_case_insensitive() {
        assert!(is_pdf(Path::new("a/b/Guide.PDF")));
        assert!(is_pdf(Path::new("guide.pdf")));
        assert!(!is_pdf(Path::new("guide.pdf.txt")));
        assert!(!is_pdf(Path::new("pdf")));
    }

    #[test]
    fn filter_keeps_only_source_and_order() {
        let docs = vec![
            Document::new(
                "first",
                json!({"source": "data/a.pdf", "page": 0, "creator": "x"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            ),
            Document::new(
                "second",
                json!({"source": "data/b.pdf", "page": 3}).as_object().cloned().unwrap(),
            ),
        ];

        let minimal = filter_to_minimal_docs(docs);

        assert_eq!(minimal.len(), 2);
        assert_eq!(minimal[0].page_content, "first");
        assert_eq!(minimal[0].source(), Some("data/a.pdf"));
        assert_eq!(minimal[0].metadata.len(), 1);
        assert_eq!(minimal[1].page_content, "second");
        assert_eq!(minimal[1].source(), Some("data/b.pdf"));
        assert_eq!(minimal[1].metadata.len(), 1);
    }

    #[test]
    fn filter_without_source_keeps_null_source() {
        let minimal = filter_to_minimal_docs(vec![Document::new("text", Metadata::new())]);
        assert_eq!(minimal[0].metadata.get(SOURCE_KEY), Some(&Value::Null));
        assert_eq!(minimal[0].source(), None);
    }
}

//! Lectura recursiva de un directorio del sistema de archivos en `Document`s.

use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use chrono::{DateTime, Local};
use mime_guess::MimeGuess;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::{DirEntry, WalkDir};

use crate::{
    error::LoadError,
    models::{Document, DocumentMetadata},
};

/// Bytes inspeccionados para decidir si un fichero es binario.
const BINARY_SNIFF_LEN: usize = 8192;

/// Lector de directorios: cada fichero soportado produce un `Document`.
#[derive(Debug, Clone)]
pub struct DirectoryReader {
    root: PathBuf,
    recursive: bool,
}

impl DirectoryReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: true,
        }
    }

    /// Limita la lectura al primer nivel del directorio.
    pub fn non_recursive(mut self) -> Self {
        self.recursive = false;
        self
    }

    /// Carga todos los documentos, ordenados por ruta.
    ///
    /// Falla si el directorio no existe o si no hay ningún fichero legible.
    pub fn load_data(&self) -> Result<Vec<Document>, LoadError> {
        if !self.root.exists() {
            return Err(LoadError::MissingDirectory(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(LoadError::NotADirectory(self.root.clone()));
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut documents = Vec::new();

        let walker = WalkDir::new(&self.root)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(doc) = load_file(entry.path())? {
                debug!("Documento cargado: {}", entry.path().display());
                documents.push(doc);
            }
        }

        if documents.is_empty() {
            return Err(LoadError::NoDocuments(self.root.clone()));
        }

        Ok(documents)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Lee un fichero. Los PDF pasan por el extractor; el resto se lee como texto
/// UTF-8 (con reemplazo). `Ok(None)` si es binario o no hay texto extraíble.
fn load_file(path: &Path) -> Result<Option<Document>, LoadError> {
    let io_err = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let metadata = fs::metadata(path).map_err(io_err)?;
    let extension = path
        .extension()
        .and_then(OsStr::to_str)
        .unwrap_or("")
        .to_lowercase();

    let text = match extension.as_str() {
        "pdf" => match pdf_extract::extract_text(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("No se pudo extraer texto del PDF {}: {}. Saltando fichero.", path.display(), e);
                return Ok(None);
            }
        },
        _ => {
            let bytes = fs::read(path).map_err(io_err)?;
            if looks_binary(&bytes) {
                info!("Saltando fichero binario: {}", path.display());
                return Ok(None);
            }
            String::from_utf8_lossy(&bytes).into_owned()
        }
    };

    let path_str = path.to_string_lossy().to_string();
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.clone());
    let mime: MimeGuess = MimeGuess::from_path(path);

    Ok(Some(Document {
        id: Uuid::new_v4().to_string(),
        text,
        metadata: DocumentMetadata {
            file_path: path_str,
            file_name,
            file_type: mime.first().map(|m| m.to_string()),
            file_size: metadata.len(),
            creation_date: metadata.created().ok().map(format_date),
            last_modified_date: metadata.modified().ok().map(format_date),
        },
    }))
}

fn looks_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(BINARY_SNIFF_LEN)].contains(&0)
}

fn format_date(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format("%Y-%m-%d").to_string()
}

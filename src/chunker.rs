//! División de documentos en nodos de tamaño fijo con solapamiento.
//!
//! Las unidades son caracteres (no bytes), así que un chunk nunca corta un
//! carácter multibyte.

use uuid::Uuid;

use crate::{error::ConfigError, models::{Document, Node}};

/// Ventana de texto dentro de un documento.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeParser {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl NodeParser {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::invalid("chunk_size", "0", "debe ser mayor que cero"));
        }
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::invalid(
                "chunk_overlap",
                &chunk_overlap.to_string(),
                format!("debe ser menor que chunk_size ({chunk_size})"),
            ));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Divide un texto en ventanas de como mucho `chunk_size` caracteres.
    ///
    /// Ventanas consecutivas comparten exactamente `chunk_overlap` caracteres y
    /// la última termina al final del texto. Un texto vacío o sólo con espacios
    /// no produce ninguna.
    pub fn split_text(&self, text: &str) -> Vec<TextSpan> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // bounds[i] = offset en bytes del carácter i; el último es text.len().
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let len = bounds.len() - 1;
        let step = self.chunk_size - self.chunk_overlap;

        let mut spans = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(len);
            spans.push(TextSpan {
                start,
                end,
                text: text[bounds[start]..bounds[end]].to_string(),
            });
            if end == len {
                break;
            }
            start += step;
        }
        spans
    }

    /// Nodos de todos los documentos, en orden de documento y de posición.
    pub fn get_nodes_from_documents(&self, documents: &[Document]) -> Vec<Node> {
        documents
            .iter()
            .flat_map(|doc| {
                let metadata = doc.metadata.to_map();
                self.split_text(&doc.text)
                    .into_iter()
                    .enumerate()
                    .map(move |(index, span)| Node {
                        id: Uuid::new_v4().to_string(),
                        ref_doc_id: doc.id.clone(),
                        index,
                        text: span.text,
                        start_char_idx: span.start,
                        end_char_idx: span.end,
                        metadata: metadata.clone(),
                    })
            })
            .collect()
    }
}

impl Default for NodeParser {
    fn default() -> Self {
        Self {
            chunk_size: crate::config::DEFAULT_CHUNK_SIZE,
            chunk_overlap: crate::config::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentMetadata;

    fn document(text: &str) -> Document {
        Document {
            id: "doc-1".into(),
            text: text.into(),
            metadata: DocumentMetadata {
                file_path: "/tmp/doc.txt".into(),
                file_name: "doc.txt".into(),
                file_type: Some("text/plain".into()),
                file_size: text.len() as u64,
                creation_date: None,
                last_modified_date: None,
            },
        }
    }

    fn sample_text(len: usize) -> String {
        (0..len)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect()
    }

    fn expected_count(len: usize, size: usize, overlap: usize) -> usize {
        if len <= overlap {
            1
        } else {
            (len - overlap).div_ceil(size - overlap)
        }
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(NodeParser::new(10, 10).is_err());
        assert!(NodeParser::new(0, 0).is_err());
        assert!(NodeParser::new(10, 9).is_ok());
    }

    #[test]
    fn short_document_is_a_single_chunk() {
        let parser = NodeParser::default();
        let spans = parser.split_text("un documento corto");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "un documento corto");
        assert_eq!((spans[0].start, spans[0].end), (0, 18));
    }

    #[test]
    fn document_of_exactly_chunk_size_is_a_single_chunk() {
        let parser = NodeParser::default();
        let text = sample_text(1024);
        assert_eq!(parser.split_text(&text).len(), 1);
    }

    #[test]
    fn two_thousand_chars_give_two_chunks() {
        let parser = NodeParser::default();
        let text = sample_text(2000);
        let spans = parser.split_text(&text);
        assert_eq!(spans.len(), 2);
        assert_eq!((spans[0].start, spans[0].end), (0, 1024));
        assert_eq!((spans[1].start, spans[1].end), (974, 2000));
    }

    #[test]
    fn chunk_count_matches_formula_and_neighbours_share_overlap() {
        let (size, overlap) = (100, 10);
        let parser = NodeParser::new(size, overlap).unwrap();
        for len in [1, 5, 10, 11, 99, 100, 101, 190, 191, 1000, 1234] {
            let text = sample_text(len);
            let spans = parser.split_text(&text);
            assert_eq!(spans.len(), expected_count(len, size, overlap), "len {len}");
            assert_eq!(spans.last().unwrap().end, len);
            for pair in spans.windows(2) {
                assert!(pair[0].text.chars().count() <= size);
                let tail: String = pair[0].text.chars().skip(size - overlap).collect();
                let head: String = pair[1].text.chars().take(overlap).collect();
                assert_eq!(tail, head);
            }
        }
    }

    #[test]
    fn splitting_is_deterministic() {
        let parser = NodeParser::new(64, 8).unwrap();
        let text = sample_text(500);
        assert_eq!(parser.split_text(&text), parser.split_text(&text));
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let parser = NodeParser::new(4, 1).unwrap();
        let spans = parser.split_text("ñandú€día");
        let texts: Vec<_> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, ["ñand", "dú€d", "día"]);
    }

    #[test]
    fn blank_documents_produce_no_nodes() {
        let parser = NodeParser::default();
        assert!(parser.get_nodes_from_documents(&[document("  \n\t ")]).is_empty());
    }

    #[test]
    fn nodes_reference_their_document_in_order() {
        let parser = NodeParser::new(100, 10).unwrap();
        let nodes = parser.get_nodes_from_documents(&[document(&sample_text(250))]);
        assert_eq!(nodes.len(), 3);
        for (i, node) in nodes.iter().enumerate() {
            assert_eq!(node.index, i);
            assert_eq!(node.ref_doc_id, "doc-1");
            assert_eq!(node.metadata["file_name"], "doc.txt");
        }
        let meta = nodes[1].storage_metadata();
        assert_eq!(meta["chunk_index"], 1);
        assert_eq!(meta["start_char_idx"], 90);
    }
}

//! Vector store persistente en disco, organizado en colecciones con nombre.
//!
//! API pública:
//!   - `PersistentClient::open(path)` (crea el directorio y la base de datos)
//!   - `PersistentClient::open_existing(path)` (sólo lectura, nunca crea nada)
//!   - `PersistentClient::get_or_create_collection(name)` (idempotente)
//!   - `Collection::add(records)` / `Collection::query(embedding, top_k)`.
//!
//! Todo vive en una base SQLite `<path>/chroma.sqlite3`: una tabla de
//! colecciones y otra de embeddings. Cada `add` es una única transacción.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;

const DB_FILE: &str = "chroma.sqlite3";

/// Registro almacenado: texto del chunk, metadatos y su embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub document: String,
    pub metadata: Map<String, Value>,
    pub embedding: Vec<f32>,
    pub content_hash: String,
}

impl StoredRecord {
    pub fn new(
        id: impl Into<String>,
        document: impl Into<String>,
        metadata: Map<String, Value>,
        embedding: Vec<f32>,
    ) -> Self {
        let document = document.into();
        Self {
            id: id.into(),
            content_hash: content_hash(&document),
            document,
            metadata,
            embedding,
        }
    }
}

/// SHA-256 en hexadecimal del texto de un chunk.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Resultado de una búsqueda por similitud.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    pub document: String,
    pub metadata: Map<String, Value>,
    pub score: f32,
}

/// Cliente de un vector store en disco.
#[derive(Debug, Clone)]
pub struct PersistentClient {
    root: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

/// Colección abierta junto con si ya existía antes de abrirla.
#[derive(Debug)]
pub struct OpenedCollection {
    pub collection: Collection,
    pub existed: bool,
}

impl PersistentClient {
    /// Abre (creando si hace falta) el directorio y la base de datos del vector store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = path.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;

        let conn = Connection::open(root.join(DB_FILE))?;
        migrate(&conn)?;

        Ok(Self {
            root,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Abre en sólo lectura un vector store ya creado. `Ok(None)` si no hay
    /// base de datos en `path`; no toca el disco.
    pub fn open_existing(path: impl Into<PathBuf>) -> Result<Option<Self>, StoreError> {
        let root = path.into();
        let db = root.join(DB_FILE);
        if !db.is_file() {
            return Ok(None);
        }

        let conn = Connection::open_with_flags(&db, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Some(Self {
            root,
            conn: Arc::new(Mutex::new(conn)),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Devuelve la colección si existe; si no, la crea vacía.
    /// Llamarla dos veces con el mismo nombre no es un error.
    pub fn get_or_create_collection(&self, name: &str) -> Result<OpenedCollection, StoreError> {
        if let Some(collection) = self.get_collection(name)? {
            info!("Colección '{name}' ya existe ({} registros).", collection.count());
            return Ok(OpenedCollection {
                collection,
                existed: true,
            });
        }

        let id = Uuid::new_v4().to_string();
        self.conn.lock().execute(
            "INSERT INTO collections (id, name, created_at, dimension) VALUES (?1, ?2, ?3, NULL)",
            params![id, name, Utc::now().to_rfc3339()],
        )?;
        info!("Colección '{name}' creada.");

        Ok(OpenedCollection {
            collection: Collection {
                conn: Arc::clone(&self.conn),
                id,
                name: name.to_string(),
                dimension: None,
                count: 0,
            },
            existed: false,
        })
    }

    /// Abre una colección existente sin crearla.
    pub fn get_collection(&self, name: &str) -> Result<Option<Collection>, StoreError> {
        validate_collection_name(name)?;
        let conn = self.conn.lock();

        let row = conn
            .query_row(
                "SELECT id, dimension FROM collections WHERE name = ?1",
                params![name],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?)),
            )
            .optional()?;
        let Some((id, dimension)) = row else {
            return Ok(None);
        };

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM embeddings WHERE collection_id = ?1",
            params![id],
            |row| row.get(0),
        )?;

        Ok(Some(Collection {
            conn: Arc::clone(&self.conn),
            id,
            name: name.to_string(),
            dimension: dimension.map(|d| d as usize),
            count: count as usize,
        }))
    }

    /// Nombres de las colecciones existentes, ordenados.
    pub fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS collections (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            dimension INTEGER
        );

        CREATE TABLE IF NOT EXISTS embeddings (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL,
            collection_id TEXT NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
            document TEXT NOT NULL,
            metadata TEXT NOT NULL,
            embedding BLOB NOT NULL,
            content_hash TEXT NOT NULL,
            UNIQUE(collection_id, id)
        );

        CREATE INDEX IF NOT EXISTS idx_embeddings_collection ON embeddings(collection_id);
        CREATE INDEX IF NOT EXISTS idx_embeddings_hash ON embeddings(collection_id, content_hash);
        "#,
    )?;
    Ok(())
}

/// Reglas de nombre: 3-63 caracteres `[A-Za-z0-9._-]`, empieza y termina en
/// alfanumérico y sin `..`.
pub fn validate_collection_name(name: &str) -> Result<(), StoreError> {
    let invalid = |reason: &str| StoreError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if !(3..=63).contains(&name.len()) {
        return Err(invalid("debe tener entre 3 y 63 caracteres"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid("sólo se permiten letras, dígitos, '.', '_' y '-'"));
    }
    let first_last_ok = name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric());
    if !first_last_ok {
        return Err(invalid("debe empezar y terminar con un carácter alfanumérico"));
    }
    if name.contains("..") {
        return Err(invalid("no puede contener '..'"));
    }
    Ok(())
}

/// Colección abierta. `count` y `dimension` reflejan lo confirmado en disco.
#[derive(Debug, Clone)]
pub struct Collection {
    conn: Arc<Mutex<Connection>>,
    id: String,
    name: String,
    dimension: Option<usize>,
    count: usize,
}

impl Collection {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Todos los registros en orden de inserción.
    pub fn records(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, document, metadata, embedding, content_hash
             FROM embeddings WHERE collection_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt
            .query_map(params![self.id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, document, metadata, blob, content_hash)| {
                let metadata = serde_json::from_str(&metadata).map_err(|e| StoreError::Corrupt {
                    record: id.clone(),
                    reason: e.to_string(),
                })?;
                let embedding = decode_embedding(&id, &blob)?;
                Ok(StoredRecord {
                    id,
                    document,
                    metadata,
                    embedding,
                    content_hash,
                })
            })
            .collect()
    }

    /// Hashes de contenido de los registros ya guardados.
    pub fn content_hashes(&self) -> Result<HashSet<String>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT content_hash FROM embeddings WHERE collection_id = ?1")?;
        let hashes = stmt
            .query_map(params![self.id], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(hashes)
    }

    /// Añade registros en una transacción. Todos deben tener la dimensión de
    /// la colección (la primera inserción la fija). Si falla, ni la base de
    /// datos ni este handle cambian.
    pub fn add(&mut self, records: Vec<StoredRecord>) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let expected = self.dimension.unwrap_or(records[0].embedding.len());
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != expected) {
            return Err(StoreError::DimensionMismatch {
                expected,
                found: bad.embedding.len(),
            });
        }

        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            if self.dimension.is_none() {
                tx.execute(
                    "UPDATE collections SET dimension = ?1 WHERE id = ?2",
                    params![expected as i64, self.id],
                )?;
            }
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO embeddings (id, collection_id, document, metadata, embedding, content_hash)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for record in &records {
                    stmt.execute(params![
                        record.id,
                        self.id,
                        record.document,
                        serde_json::to_string(&record.metadata)?,
                        encode_embedding(&record.embedding),
                        record.content_hash,
                    ])?;
                }
            }
            tx.commit()?;
        }

        let added = records.len();
        self.dimension = Some(expected);
        self.count += added;
        debug!("{added} registros añadidos a '{}' (total {}).", self.name, self.count);
        Ok(added)
    }

    /// Los `top_k` registros más parecidos por similitud coseno, de mayor a menor.
    pub fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, StoreError> {
        if top_k == 0 || self.count == 0 {
            return Ok(Vec::new());
        }
        if let Some(expected) = self.dimension {
            if embedding.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    found: embedding.len(),
                });
            }
        }

        let mut matches: Vec<QueryMatch> = self
            .records()?
            .into_iter()
            .map(|r| QueryMatch {
                score: cosine_similarity(embedding, &r.embedding),
                id: r.id,
                document: r.document,
                metadata: r.metadata,
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(id: &str, blob: &[u8]) -> Result<Vec<f32>, StoreError> {
    if blob.len() % 4 != 0 {
        return Err(StoreError::Corrupt {
            record: id.to_string(),
            reason: format!("embedding de {} bytes", blob.len()),
        });
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

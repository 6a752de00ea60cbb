//! Document and chunk queries

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::parse_datetime;
use crate::embedding::{decode_vector, encode_vector};
use crate::error::Result;
use crate::types::{ChunkRecord, DocumentRecord};

fn document_from_row(row: &Row) -> rusqlite::Result<DocumentRecord> {
    let uploaded_at: String = row.get("uploaded_at")?;
    let tags: String = row.get("tags")?;

    Ok(DocumentRecord {
        document_id: row.get("document_id")?,
        tenant_id: row.get("tenant_id")?,
        filename: row.get("filename")?,
        original_name: row.get("original_name")?,
        file_path: row.get("file_path")?,
        file_size: row.get("file_size")?,
        file_type: row.get("file_type")?,
        file_hash: row.get("file_hash")?,
        uploaded_at: parse_datetime(&uploaded_at),
        user_id: row.get("user_id")?,
        chunk_count: row.get("chunk_count")?,
        indexed: row.get::<_, i64>("indexed")? != 0,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
    })
}

fn chunk_from_row(row: &Row) -> rusqlite::Result<ChunkRecord> {
    Ok(ChunkRecord {
        chunk_id: row.get("chunk_id")?,
        tenant_id: row.get("tenant_id")?,
        document_id: row.get("document_id")?,
        chunk_index: row.get("chunk_index")?,
        chunk_count: row.get("chunk_count")?,
        content: row.get("content")?,
        source: row.get("source")?,
        file_type: row.get("file_type")?,
        file_hash: row.get("file_hash")?,
    })
}

pub fn insert_document(conn: &Connection, doc: &DocumentRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO documents (document_id, tenant_id, filename, original_name, file_path,
                                file_size, file_type, file_hash, uploaded_at, user_id,
                                chunk_count, indexed, tags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            doc.document_id,
            doc.tenant_id,
            doc.filename,
            doc.original_name,
            doc.file_path,
            doc.file_size,
            doc.file_type,
            doc.file_hash,
            doc.uploaded_at.to_rfc3339(),
            doc.user_id,
            doc.chunk_count,
            doc.indexed as i64,
            serde_json::to_string(&doc.tags)?,
        ],
    )?;
    Ok(())
}

/// Fetch a document scoped to its tenant
pub fn get_document(
    conn: &Connection,
    tenant_id: &str,
    document_id: &str,
) -> Result<Option<DocumentRecord>> {
    let doc = conn
        .query_row(
            "SELECT * FROM documents WHERE tenant_id = ?1 AND document_id = ?2",
            params![tenant_id, document_id],
            document_from_row,
        )
        .optional()?;
    Ok(doc)
}

/// Existing document of the tenant with identical file bytes
pub fn find_by_hash(
    conn: &Connection,
    tenant_id: &str,
    file_hash: &str,
) -> Result<Option<DocumentRecord>> {
    let doc = conn
        .query_row(
            "SELECT * FROM documents WHERE tenant_id = ?1 AND file_hash = ?2
             ORDER BY uploaded_at LIMIT 1",
            params![tenant_id, file_hash],
            document_from_row,
        )
        .optional()?;
    Ok(doc)
}

/// Documents of a tenant, newest first
pub fn list_documents(conn: &Connection, tenant_id: &str) -> Result<Vec<DocumentRecord>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM documents WHERE tenant_id = ?1 ORDER BY uploaded_at DESC, document_id",
    )?;
    let docs = stmt
        .query_map(params![tenant_id], document_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(docs)
}

/// Count documents, optionally for one tenant
pub fn count_documents(conn: &Connection, tenant_id: Option<&str>) -> Result<i64> {
    let count = match tenant_id {
        Some(tenant_id) => conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE tenant_id = ?1",
            params![tenant_id],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?,
    };
    Ok(count)
}

/// Delete a document and its chunks
pub fn delete_document(conn: &Connection, tenant_id: &str, document_id: &str) -> Result<bool> {
    delete_chunks_for_document(conn, tenant_id, document_id)?;
    let changed = conn.execute(
        "DELETE FROM documents WHERE tenant_id = ?1 AND document_id = ?2",
        params![tenant_id, document_id],
    )?;
    Ok(changed > 0)
}

/// Delete every document and chunk of a tenant
pub fn delete_all_documents(conn: &Connection, tenant_id: &str) -> Result<usize> {
    delete_chunks_for_tenant(conn, tenant_id)?;
    let changed = conn.execute(
        "DELETE FROM documents WHERE tenant_id = ?1",
        params![tenant_id],
    )?;
    Ok(changed)
}

pub fn insert_chunk(
    conn: &Connection,
    chunk: &ChunkRecord,
    embedding: &[f32],
    model: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO chunks (chunk_id, tenant_id, document_id, chunk_index, chunk_count,
                             content, source, file_type, file_hash, embedding, model, dimensions)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            chunk.chunk_id,
            chunk.tenant_id,
            chunk.document_id,
            chunk.chunk_index,
            chunk.chunk_count,
            chunk.content,
            chunk.source,
            chunk.file_type,
            chunk.file_hash,
            encode_vector(embedding),
            model,
            embedding.len() as i64,
        ],
    )?;
    Ok(())
}

/// Replace the stored embedding of a chunk
pub fn update_chunk_embedding(
    conn: &Connection,
    chunk_id: &str,
    embedding: &[f32],
    model: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE chunks SET embedding = ?2, model = ?3, dimensions = ?4 WHERE chunk_id = ?1",
        params![chunk_id, encode_vector(embedding), model, embedding.len() as i64],
    )?;
    Ok(())
}

/// Every chunk of a tenant together with its embedding
pub fn load_tenant_vectors(
    conn: &Connection,
    tenant_id: &str,
) -> Result<Vec<(ChunkRecord, Vec<f32>)>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM chunks WHERE tenant_id = ?1 ORDER BY document_id, chunk_index",
    )?;
    let rows = stmt
        .query_map(params![tenant_id], |row| {
            let chunk = chunk_from_row(row)?;
            let blob: Vec<u8> = row.get("embedding")?;
            Ok((chunk, decode_vector(&blob)))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Chunks of a tenant without embeddings, in document order
pub fn list_chunks(conn: &Connection, tenant_id: &str) -> Result<Vec<ChunkRecord>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM chunks WHERE tenant_id = ?1 ORDER BY document_id, chunk_index",
    )?;
    let chunks = stmt
        .query_map(params![tenant_id], chunk_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(chunks)
}

pub fn delete_chunks_for_document(
    conn: &Connection,
    tenant_id: &str,
    document_id: &str,
) -> Result<usize> {
    let changed = conn.execute(
        "DELETE FROM chunks WHERE tenant_id = ?1 AND document_id = ?2",
        params![tenant_id, document_id],
    )?;
    Ok(changed)
}

pub fn delete_chunks_for_tenant(conn: &Connection, tenant_id: &str) -> Result<usize> {
    let changed = conn.execute("DELETE FROM chunks WHERE tenant_id = ?1", params![tenant_id])?;
    Ok(changed)
}

pub fn count_chunks(conn: &Connection, tenant_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM chunks WHERE tenant_id = ?1",
        params![tenant_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// (source, file_type, chunk count) per source document of a tenant
pub fn chunk_sources(conn: &Connection, tenant_id: &str) -> Result<Vec<(String, String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT source, file_type, COUNT(*) FROM chunks WHERE tenant_id = ?1
         GROUP BY document_id, source, file_type ORDER BY MIN(rowid)",
    )?;
    let rows = stmt
        .query_map(params![tenant_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

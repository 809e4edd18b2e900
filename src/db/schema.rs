/// Schema for the local document catalog.
pub const SCHEMA: &str = r#"
-- Document metadata mirrored from the service.
-- Timestamps are RFC 3339 in UTC, so text comparison orders them.
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    file_size TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    url TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (updated_at >= created_at)
);

CREATE INDEX IF NOT EXISTS idx_documents_updated ON documents(updated_at);

-- One row per cached listing (search text)
CREATE TABLE IF NOT EXISTS listings (
    query_hash TEXT PRIMARY KEY,
    search TEXT NOT NULL,
    cached_at TEXT NOT NULL,
    result_count INTEGER NOT NULL
);

-- Listing to document mapping, one row per position (a document may repeat)
CREATE TABLE IF NOT EXISTS listing_results (
    query_hash TEXT NOT NULL,
    document_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (query_hash, position),
    FOREIGN KEY (query_hash) REFERENCES listings(query_hash) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_listing_results_document ON listing_results(document_id);
"#;

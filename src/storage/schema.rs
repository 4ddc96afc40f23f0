//! Database schema definitions
//!
//! Table and column names are shared with the crawler and extraction
//! pipeline and must not be renamed.

/// SQL to create the URL dedup table
pub const CREATE_DOWNLOADED_URLS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS downloaded_urls (
    url TEXT PRIMARY KEY,
    timestamp TEXT NOT NULL
)
"#;

/// SQL to create the documents table
pub const CREATE_DOCUMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    url TEXT PRIMARY KEY,
    titulo TEXT,
    causas TEXT,
    sintomas TEXT,
    primeros_auxilios TEXT,
    no_se_debe TEXT,
    nombres_alternativos TEXT,
    ejemplo_consulta TEXT,
    timestamp TEXT NOT NULL
)
"#;

/// Column list shared by document reads and writes, in bind order
pub const DOCUMENT_COLUMNS: &str = "url, titulo, causas, sintomas, primeros_auxilios, \
     no_se_debe, nombres_alternativos, ejemplo_consulta, timestamp";

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![CREATE_DOWNLOADED_URLS_TABLE, CREATE_DOCUMENTS_TABLE]
}

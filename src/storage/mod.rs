//! Storage Layer - SQLite-backed persistence
//!
//! One database file with two tables:
//! - downloaded_urls(url, timestamp)
//! - documents(url, titulo, causas, sintomas, primeros_auxilios, no_se_debe,
//!   nombres_alternativos, ejemplo_consulta, timestamp)

pub mod schema;
mod session;
pub mod sqlite;

pub use sqlite::{DocumentStore, StoreStats};

//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - Definisce `ConvertError` enum per categorizzare tutti gli errori possibili
//! - Distingue errori per singolo task (decode, encode, write) da errori fatali per il run
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `Io`: conversione automatica da `std::io::Error`
//! - `Decode` / `Encode` / `Write`: fallimenti di un singolo task, diventano un outcome di errore
//! - `WorkerCrashed`: l'unità di esecuzione è terminata in modo anomalo (panic)
//! - `SourceUnreadable`: la directory sorgente non esiste o non è leggibile (fatale per il run)
//! - `InvalidSettings`: parametri fuori range (fatale per il run)
//! - `ConfigNotFound` / `ConfigParse`: risoluzione configurazioni nominate
//!
//! ## Esempio:
//! ```rust,ignore
//! if !source_dir.is_dir() {
//!     return Err(ConvertError::SourceUnreadable(source_dir.display().to_string()));
//! }
//! ```

/// Custom error types for batch conversion
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Write error: {0}")]
    Write(String),

    #[error("Worker crashed: {0}")]
    WorkerCrashed(String),

    #[error("Source directory unreadable: {0}")]
    SourceUnreadable(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Config not found: {0}")]
    ConfigNotFound(String),

    #[error("Config parse error: {0}")]
    ConfigParse(String),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

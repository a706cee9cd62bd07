//! # Batch Image Converter Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per i test di integrazione
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazioni nominate, preset e validazione parametri
//! - `error`: Tipo di errore della libreria
//! - `encoder`: Capability di encoding (JPEG) e decode delle sorgenti
//! - `quality_search`: Ricerca binaria della qualità per una dimensione target
//! - `resize`: Ridimensionamento "fit inside" prima dell'encoding
//! - `file_manager`: Discovery dei file e layout dell'output
//! - `task`: Task e outcome immutabili
//! - `worker`: Esecuzione di un singolo task
//! - `scheduler`: Finestra scorrevole con al massimo N task in esecuzione
//! - `aggregator`: Totali correnti e riepilogo finale
//! - `progress` / `json_output`: Reporting leggibile o JSON
//! - `converter`: Orchestratore di un run
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use batch_image_converter::{BatchConverter, OutputMode, RunConfig};
//!
//! # async fn demo() -> batch_image_converter::Result<()> {
//! let config = RunConfig::preset("thumbnail").unwrap_or_default();
//! let summary = BatchConverter::new(config, OutputMode::Human)?.run().await?;
//! println!("{}", summary.format_summary());
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod config;
pub mod converter;
pub mod encoder;
pub mod error;
pub mod file_manager;
pub mod json_output;
pub mod progress;
pub mod quality_search;
pub mod resize;
pub mod scheduler;
pub mod task;
pub mod worker;

pub use aggregator::{RunningTotals, Summary};
pub use config::{ConfigStore, RunConfig, SearchPolicy, Settings};
pub use converter::BatchConverter;
pub use encoder::{Encoder, JpegEncoder};
pub use error::{ConvertError, Result};
pub use progress::OutputMode;
pub use scheduler::TaskScheduler;
pub use task::{ConvertTask, EncodeOutcome};

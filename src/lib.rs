//! Keystroke Flux - keystroke-dynamics feature extraction
//!
//! Flux turns binary keystroke-timing logs into per-session grapheme features
//! through a deterministic pipeline: binary decoding → sliding-window
//! combinations → grapheme maps → master dictionary → CSV.
//!
//! ## Modules
//!
//! - **Reader / Writer**: the recorder's little-endian log layout
//! - **Combinations**: character and numeric n-gram windows
//! - **Grapheme**: per-session digraph/trigraph timing tables
//! - **Dictionary**: cross-session aggregation and CSV export
//! - **Pipeline**: batch orchestration with per-file error isolation

pub mod combinations;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod grapheme;
pub mod pipeline;
pub mod reader;
pub mod timing;
pub mod types;
pub mod writer;

pub use combinations::{combinations, CombinationKind, Combinations, Content};
pub use config::FluxConfig;
pub use dictionary::{FeatureTable, MasterDictionary};
pub use error::{FluxError, Result};
pub use grapheme::{build_grapheme_map, GraphemeMap, GraphemeMapBuilder, SessionRecord};
pub use pipeline::{log_to_csv, BatchProcessor, BatchSummary, FileReport};
pub use reader::{decode_log, KeystrokeLog, LogReader};
pub use types::{KeystrokeEvent, Session, StatisticKind, UserInfo};
pub use writer::encode_log;

/// Flux version
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "keystroke-flux";

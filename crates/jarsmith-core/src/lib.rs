//! Jarsmith - deterministic jar and uberjar assembly
//!
//! This library packages a compiled output tree into a jar, and flattens
//! that tree together with its library jars into a single uberjar with
//! explicit collision handling.

pub mod archive;
pub mod config;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod utils;

pub use error::{Error, Result};

// Re-export commonly used types
pub use archive::{
    assemble_jar, assemble_uber, ArchivePath, Compression, ConflictNotice, JarOptions,
    JarSummary, JarWriter, MergePolicy, Tree, UberOptions, UberReport,
};
pub use config::Config;
pub use manifest::Manifest;
pub use pipeline::{CommandCompiler, CompileRequest, Compiler, Pipeline};

//! Activity-stream processing pipeline.
//!
//! A raw stream set can dwarf any model's context window. The processor
//! turns one into a representation that fits: a raw markdown table
//! (optionally paginated), lap-partitioned derived statistics, or a
//! secondary-model summary — with a size gate choosing automatically when
//! the caller asks for `auto`.

pub mod derived;
pub mod gate;
pub mod laps;
pub mod paginate;
pub mod processor;
pub mod stats;
pub mod summary;

pub use processor::{ProcessRequest, ProcessingMode, StreamProcessor};

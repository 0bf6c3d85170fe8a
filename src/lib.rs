#![deny(clippy::all)]

//! Source Map Scopes Codec
//!
//! Encodes and decodes the `scopes` extension field of version 3 source
//! maps: a base64-VLQ side channel describing the authored source's
//! lexical scope tree and the generated-code ranges derived from it,
//! including inlined call sites and per-variable binding expressions.
//!
//! The typical flow is [`SafeScopeInfoBuilder`] -> [`ScopeInfo`] ->
//! [`encode`] -> source map JSON -> [`decode`] -> [`ScopeInfo`].

// Leaf components
pub mod error;
pub mod position;
pub mod source_map;
pub mod vlq;

// Data model
pub mod scope_info;

// Assembly
pub mod builder;
pub mod safe_builder;

// Codec
pub mod decoder;
pub mod encoder;
mod grammar;

// Re-exports
pub use builder::{RangeOptions, ScopeInfoBuilder, ScopeOptions};
pub use decoder::{decode, DecodeMode, DecodeOptions};
pub use encoder::encode;
pub use error::{Error, Result};
pub use position::{compare_positions, OriginalPosition, Position};
pub use safe_builder::SafeScopeInfoBuilder;
pub use scope_info::{
    Binding, GeneratedRange, OriginalScope, RangeId, ScopeId, ScopeInfo, SubRangeBinding,
};
pub use source_map::{SourceMapJson, SourceMapSection};

//! Codec Errors
//!
//! Every failure the codec can report, across the VLQ layer, the safe
//! builder, the encoder and the strict decoder.

use std::fmt;

use crate::position::Position;

pub type Result<T> = std::result::Result<T, Error>;

/// An error raised while building, encoding or decoding scope information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A VLQ had its continuation bit set at the end of the input.
    UnexpectedEndOfInput,
    /// A character outside the base64 alphabet appeared inside a VLQ.
    UnexpectedCharacter(char),
    /// A VLQ decoded to a value that does not fit in 32 bits.
    VlqOutOfRange,

    /// The scope info and the source map disagree about the number of sources.
    SourcesScopesLengthMismatch { sources: usize, scopes: usize },

    /// A scope operation was attempted while generated ranges are open.
    RangesOpen(&'static str),
    /// A range operation was attempted while original scopes are open.
    ScopesOpen(&'static str),
    /// A scope mutation was attempted with no scope on the stack.
    NoOpenScope(&'static str),
    /// A range mutation was attempted with no range on the stack.
    NoOpenRange(&'static str),
    /// A start or end position moved backwards.
    PositionOutOfOrder {
        op: &'static str,
        previous: Position,
        next: Position,
    },
    /// A `ScopeId` handle does not resolve within this builder.
    UnresolvedScopeHandle,
    /// A scope key was referenced but never registered.
    UnknownScopeKey(String),
    /// `build` was called while scopes or ranges are still open.
    UnclosedAtBuild,

    /// A range carries binding values but no definition scope.
    ValuesWithoutScope,
    /// A range's binding values do not match its definition scope's variables.
    ValuesCountMismatch { values: usize, variables: usize },
    /// A call site was set on a range without a definition scope.
    CallSiteWithoutScope,
    /// A call site was set on a range that is flagged as a stack frame.
    CallSiteOnStackFrame,
    /// A sub-range binding list does not tile its enclosing range.
    SubRangesNotTiling {
        variable: usize,
        reason: &'static str,
    },

    /// A range references an `OriginalScope` unknown to this encoding.
    UnknownDefinitionScope,

    /// An original scope end item had no matching start.
    UnmatchedScopeEnd,
    /// A generated range end item had no matching start.
    UnmatchedRangeEnd,
    /// An item appeared outside the scope or range it belongs to.
    OrphanItem(&'static str),
    /// A name, kind, variable or binding index fell outside the `names` array.
    NamesIndexOutOfBounds { index: i64, len: usize },
    /// A definition scope index does not reference a decoded scope.
    UnknownDefinitionScopeIndex { index: i64 },
    /// A sub-range binding addressed a variable slot the range does not have.
    VariableIndexOutOfBounds { index: usize, len: usize },
    /// A sub-range binding for a variable failed to advance past its predecessor.
    DuplicateSubRangeBinding { variable: usize },
    /// The encoded input ended with scopes or ranges still open.
    UnclosedAtEndOfInput,
    /// A decoded call site position underflowed below zero.
    NegativePosition,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnexpectedEndOfInput => {
                write!(f, "unexpected end of input while decoding a VLQ")
            }
            Error::UnexpectedCharacter(c) => {
                write!(f, "unexpected character {c:?} in VLQ")
            }
            Error::VlqOutOfRange => write!(f, "VLQ value does not fit in 32 bits"),
            Error::SourcesScopesLengthMismatch { sources, scopes } => write!(
                f,
                "scope info has {scopes} top-level entries but the source map has {sources} sources"
            ),
            Error::RangesOpen(op) => {
                write!(f, "{op} is not allowed while a generated range is open")
            }
            Error::ScopesOpen(op) => {
                write!(f, "{op} is not allowed while an original scope is open")
            }
            Error::NoOpenScope(op) => write!(f, "{op} requires an open original scope"),
            Error::NoOpenRange(op) => write!(f, "{op} requires an open generated range"),
            Error::PositionOutOfOrder { op, previous, next } => {
                write!(f, "{op}: position {next} precedes {previous}")
            }
            Error::UnresolvedScopeHandle => {
                write!(f, "scope handle does not belong to this builder")
            }
            Error::UnknownScopeKey(key) => {
                write!(f, "no scope was registered under key {key:?}")
            }
            Error::UnclosedAtBuild => {
                write!(f, "build called while scopes or ranges are still open")
            }
            Error::ValuesWithoutScope => {
                write!(f, "range has binding values but no definition scope")
            }
            Error::ValuesCountMismatch { values, variables } => write!(
                f,
                "range has {values} binding values but its definition scope declares {variables} variables"
            ),
            Error::CallSiteWithoutScope => {
                write!(f, "a call site requires a definition scope")
            }
            Error::CallSiteOnStackFrame => {
                write!(f, "an inlined range (call site set) cannot itself be a stack frame")
            }
            Error::SubRangesNotTiling { variable, reason } => write!(
                f,
                "sub-range bindings for variable {variable} do not tile the range: {reason}"
            ),
            Error::UnknownDefinitionScope => {
                write!(f, "unknown OriginalScope for definition")
            }
            Error::UnmatchedScopeEnd => {
                write!(f, "original scope end item without a matching start")
            }
            Error::UnmatchedRangeEnd => {
                write!(f, "generated range end item without a matching start")
            }
            Error::OrphanItem(kind) => write!(f, "orphan {kind} item"),
            Error::NamesIndexOutOfBounds { index, len } => write!(
                f,
                "index {index} is outside the bounds of the \"names\" array (length {len})"
            ),
            Error::UnknownDefinitionScopeIndex { index } => write!(
                f,
                "definition scope index {index} does not reference a decoded scope"
            ),
            Error::VariableIndexOutOfBounds { index, len } => write!(
                f,
                "variable index {index} is outside the range's {len} binding values"
            ),
            Error::DuplicateSubRangeBinding { variable } => {
                write!(f, "duplicate sub-range binding for variable {variable}")
            }
            Error::UnclosedAtEndOfInput => {
                write!(f, "encoded scopes end with unclosed scope or range items")
            }
            Error::NegativePosition => {
                write!(f, "call site position underflowed below zero")
            }
        }
    }
}

impl std::error::Error for Error {}

//! Scope Info
//!
//! In-memory model of the scopes side channel: a forest of authored
//! `OriginalScope`s, a forest of `GeneratedRange`s, and the per-variable
//! `Binding`s connecting the two. Both forests live in arenas owned by
//! the `ScopeInfo`; nodes refer to each other through copyable ids, which
//! sidesteps cyclic ownership for the parent back-references.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::position::{compare_positions, OriginalPosition, Position};

/// Handle to an [`OriginalScope`] inside a [`ScopeInfo`].
///
/// Scopes are created in pre-order, so the id doubles as the scope's
/// position in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    pub(crate) fn new(index: usize) -> Self {
        ScopeId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a [`GeneratedRange`] inside a [`ScopeInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeId(u32);

impl RangeId {
    pub(crate) fn new(index: usize) -> Self {
        RangeId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A lexical scope in the authored source.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginalScope {
    pub start: Position,
    pub end: Position,
    /// Function or class name, if any.
    pub name: Option<String>,
    /// Conventionally one of "Global", "Class", "Function" or "Block".
    /// The codec does not interpret it.
    pub kind: Option<String>,
    /// Whether invocations of this scope produce a stack frame.
    pub is_stack_frame: bool,
    /// Names declared in this scope, in declaration order.
    pub variables: Vec<String>,
    pub children: Vec<ScopeId>,
    pub parent: Option<ScopeId>,
}

/// A contiguous span of generated code.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedRange {
    pub start: Position,
    pub end: Position,
    /// The authored scope whose code this range was generated from.
    pub original_scope: Option<ScopeId>,
    pub is_stack_frame: bool,
    /// Suppress this range from stack traces even though `original_scope`
    /// may be set.
    pub is_hidden: bool,
    /// Where the inlined call originated. Present iff this range is the
    /// result of inlining.
    pub call_site: Option<OriginalPosition>,
    /// One binding per variable of `original_scope`, or empty.
    pub values: Vec<Binding>,
    pub children: Vec<RangeId>,
    pub parent: Option<RangeId>,
}

/// The value of one authored variable within one generated range.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// The variable has no recoverable value in this range.
    Unavailable,
    /// One expression, valid throughout the range.
    Expression(String),
    /// The expression differs across parts of the range. The pieces tile
    /// the range exactly: the first starts at the range's start, the last
    /// ends at its end, and each piece begins where its predecessor ends.
    SubRanges(Vec<SubRangeBinding>),
}

impl Binding {
    pub fn expression(value: impl Into<String>) -> Self {
        Binding::Expression(value.into())
    }
}

/// One piece of a [`Binding::SubRanges`] list.
#[derive(Debug, Clone, PartialEq)]
pub struct SubRangeBinding {
    /// The expression, or `None` when the value is unavailable here.
    pub value: Option<String>,
    pub from: Position,
    pub to: Position,
}

/// Check that `pieces` covers `[start, end)` without gaps or overlaps.
pub(crate) fn check_sub_range_tiling(
    variable: usize,
    pieces: &[SubRangeBinding],
    start: Position,
    end: Position,
) -> Result<()> {
    let tiling = |reason| Error::SubRangesNotTiling { variable, reason };
    let Some(first) = pieces.first() else {
        return Err(tiling("the piece list is empty"));
    };
    if first.from != start {
        return Err(tiling("it does not start at the range start"));
    }
    for piece in pieces {
        if compare_positions(&piece.from, &piece.to) != Ordering::Less {
            return Err(tiling("it has an empty or inverted piece"));
        }
    }
    for window in pieces.windows(2) {
        if window[0].to != window[1].from {
            return Err(tiling("its pieces are not contiguous"));
        }
    }
    if pieces.last().map(|piece| piece.to) != Some(end) {
        return Err(tiling("it does not end at the range end"));
    }
    Ok(())
}

/// The decoded (or built) scopes side channel of one source map.
///
/// `scopes` holds one entry per source; `None` marks a source without
/// scope information. `ranges` holds the top-level generated ranges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeInfo {
    pub(crate) scope_nodes: Vec<OriginalScope>,
    pub(crate) range_nodes: Vec<GeneratedRange>,
    pub(crate) scopes: Vec<Option<ScopeId>>,
    pub(crate) ranges: Vec<RangeId>,
}

impl ScopeInfo {
    /// Top-level scope entries, one per source.
    pub fn scopes(&self) -> &[Option<ScopeId>] {
        &self.scopes
    }

    /// Top-level generated ranges.
    pub fn ranges(&self) -> &[RangeId] {
        &self.ranges
    }

    pub fn scope(&self, id: ScopeId) -> &OriginalScope {
        &self.scope_nodes[id.index()]
    }

    pub fn range(&self, id: RangeId) -> &GeneratedRange {
        &self.range_nodes[id.index()]
    }

    /// Resolve a handle that may come from a foreign builder.
    pub fn try_scope(&self, id: ScopeId) -> Option<&OriginalScope> {
        self.scope_nodes.get(id.index())
    }

    pub(crate) fn scope_mut(&mut self, id: ScopeId) -> &mut OriginalScope {
        &mut self.scope_nodes[id.index()]
    }

    pub(crate) fn range_mut(&mut self, id: RangeId) -> &mut GeneratedRange {
        &mut self.range_nodes[id.index()]
    }

    pub(crate) fn scope_count(&self) -> usize {
        self.scope_nodes.len()
    }

    pub(crate) fn add_scope(&mut self, scope: OriginalScope) -> ScopeId {
        let id = ScopeId::new(self.scope_nodes.len());
        self.scope_nodes.push(scope);
        id
    }

    pub(crate) fn add_range(&mut self, range: GeneratedRange) -> RangeId {
        let id = RangeId::new(self.range_nodes.len());
        self.range_nodes.push(range);
        id
    }

    /// Append another info's forests, rebasing every id. Used when the
    /// sections of an index map are concatenated.
    pub(crate) fn append(&mut self, other: ScopeInfo) {
        let scope_base = self.scope_nodes.len() as u32;
        let range_base = self.range_nodes.len() as u32;

        for mut node in other.scope_nodes {
            node.parent = node.parent.map(|p| ScopeId(p.0 + scope_base));
            for child in &mut node.children {
                child.0 += scope_base;
            }
            self.scope_nodes.push(node);
        }
        for mut node in other.range_nodes {
            node.parent = node.parent.map(|p| RangeId(p.0 + range_base));
            for child in &mut node.children {
                child.0 += range_base;
            }
            node.original_scope = node.original_scope.map(|s| ScopeId(s.0 + scope_base));
            self.range_nodes.push(node);
        }
        self.scopes.extend(
            other
                .scopes
                .into_iter()
                .map(|entry| entry.map(|id| ScopeId(id.0 + scope_base))),
        );
        self.ranges
            .extend(other.ranges.into_iter().map(|id| RangeId(id.0 + range_base)));
    }
}

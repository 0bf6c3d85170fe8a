//! Scope Info Builder
//!
//! Fluent assembly of a [`ScopeInfo`]. This builder is permissive: a call
//! made at the wrong time is silently ignored rather than rejected, and
//! cross-references are taken at face value. Wrap it in
//! [`SafeScopeInfoBuilder`](crate::safe_builder::SafeScopeInfoBuilder)
//! when validation is wanted.

use std::collections::HashMap;

use crate::position::{OriginalPosition, Position};
use crate::scope_info::{Binding, GeneratedRange, OriginalScope, RangeId, ScopeId, ScopeInfo};

/// Options accepted by [`ScopeInfoBuilder::start_scope`].
#[derive(Debug, Clone, Default)]
pub struct ScopeOptions {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub is_stack_frame: bool,
    pub variables: Vec<String>,
    /// Registers the scope under a caller-chosen key, for later reference
    /// from [`RangeOptions::scope_key`].
    pub key: Option<String>,
}

/// Options accepted by [`ScopeInfoBuilder::start_range`].
#[derive(Debug, Clone, Default)]
pub struct RangeOptions {
    /// The definition scope, as a handle from this builder. Takes
    /// precedence over `scope_key`.
    pub scope: Option<ScopeId>,
    /// The definition scope, as a key registered via [`ScopeOptions::key`].
    pub scope_key: Option<String>,
    pub is_stack_frame: bool,
    pub is_hidden: bool,
    pub call_site: Option<OriginalPosition>,
    pub values: Vec<Binding>,
}

/// Builds a [`ScopeInfo`] incrementally.
///
/// Scopes and ranges open with `start_*` and close with `end_*`; a node
/// closed while another is open becomes its child. The arena index of a
/// scope is its monotonically assigned id.
#[derive(Debug, Default)]
pub struct ScopeInfoBuilder {
    pub(crate) info: ScopeInfo,
    pub(crate) scope_stack: Vec<ScopeId>,
    pub(crate) range_stack: Vec<RangeId>,
    pub(crate) keyed_scopes: HashMap<String, ScopeId>,
    pub(crate) last_scope: Option<ScopeId>,
}

impl ScopeInfoBuilder {
    pub fn new() -> Self {
        ScopeInfoBuilder::default()
    }

    /// Append a `None` placeholder for a source without scope information.
    pub fn add_null_scope(&mut self) -> &mut Self {
        self.info.scopes.push(None);
        self
    }

    pub fn start_scope(&mut self, line: u32, column: u32, options: ScopeOptions) -> &mut Self {
        let position = Position::new(line, column);
        let parent = self.scope_stack.last().copied();
        let id = self.info.add_scope(OriginalScope {
            start: position,
            end: position,
            name: options.name,
            kind: options.kind,
            is_stack_frame: options.is_stack_frame,
            variables: options.variables,
            children: Vec::new(),
            parent,
        });
        if let Some(key) = options.key {
            self.keyed_scopes.insert(key, id);
        }
        self.scope_stack.push(id);
        self
    }

    pub fn set_scope_name(&mut self, name: impl Into<String>) -> &mut Self {
        if let Some(&id) = self.scope_stack.last() {
            self.info.scope_mut(id).name = Some(name.into());
        }
        self
    }

    pub fn set_scope_kind(&mut self, kind: impl Into<String>) -> &mut Self {
        if let Some(&id) = self.scope_stack.last() {
            self.info.scope_mut(id).kind = Some(kind.into());
        }
        self
    }

    pub fn set_scope_stack_frame(&mut self, is_stack_frame: bool) -> &mut Self {
        if let Some(&id) = self.scope_stack.last() {
            self.info.scope_mut(id).is_stack_frame = is_stack_frame;
        }
        self
    }

    pub fn set_scope_variables(&mut self, variables: Vec<String>) -> &mut Self {
        if let Some(&id) = self.scope_stack.last() {
            self.info.scope_mut(id).variables = variables;
        }
        self
    }

    pub fn end_scope(&mut self, line: u32, column: u32) -> &mut Self {
        let Some(id) = self.scope_stack.pop() else {
            return self;
        };
        self.info.scope_mut(id).end = Position::new(line, column);
        match self.scope_stack.last().copied() {
            Some(parent) => self.info.scope_mut(parent).children.push(id),
            None => self.info.scopes.push(Some(id)),
        }
        self.last_scope = Some(id);
        self
    }

    /// The scope currently open, if any.
    pub fn current_scope(&self) -> Option<ScopeId> {
        self.scope_stack.last().copied()
    }

    /// The scope most recently closed by `end_scope`.
    pub fn last_scope(&self) -> Option<ScopeId> {
        self.last_scope
    }

    pub fn start_range(&mut self, line: u32, column: u32, options: RangeOptions) -> &mut Self {
        let position = Position::new(line, column);
        let original_scope = options.scope.or_else(|| {
            options
                .scope_key
                .as_deref()
                .and_then(|key| self.keyed_scopes.get(key).copied())
        });
        let parent = self.range_stack.last().copied();
        let id = self.info.add_range(GeneratedRange {
            start: position,
            end: position,
            original_scope,
            is_stack_frame: options.is_stack_frame,
            is_hidden: options.is_hidden,
            call_site: options.call_site,
            values: options.values,
            children: Vec::new(),
            parent,
        });
        self.range_stack.push(id);
        self
    }

    pub fn set_range_definition_scope(&mut self, scope: ScopeId) -> &mut Self {
        if let Some(&id) = self.range_stack.last() {
            self.info.range_mut(id).original_scope = Some(scope);
        }
        self
    }

    pub fn set_range_definition_scope_key(&mut self, key: &str) -> &mut Self {
        if let Some(scope) = self.keyed_scopes.get(key).copied() {
            if let Some(&id) = self.range_stack.last() {
                self.info.range_mut(id).original_scope = Some(scope);
            }
        }
        self
    }

    pub fn set_range_stack_frame(&mut self, is_stack_frame: bool) -> &mut Self {
        if let Some(&id) = self.range_stack.last() {
            self.info.range_mut(id).is_stack_frame = is_stack_frame;
        }
        self
    }

    pub fn set_range_hidden(&mut self, is_hidden: bool) -> &mut Self {
        if let Some(&id) = self.range_stack.last() {
            self.info.range_mut(id).is_hidden = is_hidden;
        }
        self
    }

    pub fn set_range_values(&mut self, values: Vec<Binding>) -> &mut Self {
        if let Some(&id) = self.range_stack.last() {
            self.info.range_mut(id).values = values;
        }
        self
    }

    pub fn set_range_call_site(&mut self, call_site: OriginalPosition) -> &mut Self {
        if let Some(&id) = self.range_stack.last() {
            self.info.range_mut(id).call_site = Some(call_site);
        }
        self
    }

    pub fn end_range(&mut self, line: u32, column: u32) -> &mut Self {
        let Some(id) = self.range_stack.pop() else {
            return self;
        };
        self.info.range_mut(id).end = Position::new(line, column);
        match self.range_stack.last().copied() {
            Some(parent) => self.info.range_mut(parent).children.push(id),
            None => self.info.ranges.push(id),
        }
        self
    }

    /// Return the assembled info and reset the builder for reuse.
    ///
    /// Nodes still open are left unattached; the encoder reports ranges
    /// referencing them as unknown definition scopes.
    pub fn build(&mut self) -> ScopeInfo {
        let info = std::mem::take(&mut self.info);
        self.scope_stack.clear();
        self.range_stack.clear();
        self.keyed_scopes.clear();
        self.last_scope = None;
        info
    }
}

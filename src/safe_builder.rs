//! Safe Scope Info Builder
//!
//! A validating wrapper around [`ScopeInfoBuilder`]. Every operation
//! checks its preconditions and returns a descriptive error instead of
//! silently ignoring a misuse, so an info assembled through this builder
//! always encodes cleanly.

use std::cmp::Ordering;

use crate::builder::{RangeOptions, ScopeInfoBuilder, ScopeOptions};
use crate::error::{Error, Result};
use crate::position::{compare_positions, OriginalPosition, Position};
use crate::scope_info::{check_sub_range_tiling, Binding, RangeId, ScopeId, ScopeInfo};

/// Validating variant of [`ScopeInfoBuilder`] with the same surface.
#[derive(Debug, Default)]
pub struct SafeScopeInfoBuilder {
    builder: ScopeInfoBuilder,
}

impl SafeScopeInfoBuilder {
    pub fn new() -> Self {
        SafeScopeInfoBuilder::default()
    }

    pub fn add_null_scope(&mut self) -> Result<&mut Self> {
        self.ensure_no_open_ranges("add_null_scope")?;
        self.builder.add_null_scope();
        Ok(self)
    }

    pub fn start_scope(
        &mut self,
        line: u32,
        column: u32,
        options: ScopeOptions,
    ) -> Result<&mut Self> {
        self.ensure_no_open_ranges("start_scope")?;
        let position = Position::new(line, column);
        match self.builder.scope_stack.last().copied() {
            Some(parent) => {
                let parent_scope = self.builder.info.scope(parent);
                self.ensure_not_before("start_scope", parent_scope.start, position)?;
                if let Some(&sibling) = parent_scope.children.last() {
                    let sibling_end = self.builder.info.scope(sibling).end;
                    self.ensure_not_before("start_scope", sibling_end, position)?;
                }
            }
            None => {
                if let Some(&previous) = self
                    .builder
                    .info
                    .scopes
                    .iter()
                    .rev()
                    .find_map(|entry| entry.as_ref())
                {
                    let previous_end = self.builder.info.scope(previous).end;
                    self.ensure_not_before("start_scope", previous_end, position)?;
                }
            }
        }
        self.builder.start_scope(line, column, options);
        Ok(self)
    }

    pub fn set_scope_name(&mut self, name: impl Into<String>) -> Result<&mut Self> {
        self.ensure_open_scope("set_scope_name")?;
        self.builder.set_scope_name(name);
        Ok(self)
    }

    pub fn set_scope_kind(&mut self, kind: impl Into<String>) -> Result<&mut Self> {
        self.ensure_open_scope("set_scope_kind")?;
        self.builder.set_scope_kind(kind);
        Ok(self)
    }

    pub fn set_scope_stack_frame(&mut self, is_stack_frame: bool) -> Result<&mut Self> {
        self.ensure_open_scope("set_scope_stack_frame")?;
        self.builder.set_scope_stack_frame(is_stack_frame);
        Ok(self)
    }

    pub fn set_scope_variables(&mut self, variables: Vec<String>) -> Result<&mut Self> {
        self.ensure_open_scope("set_scope_variables")?;
        self.builder.set_scope_variables(variables);
        Ok(self)
    }

    pub fn end_scope(&mut self, line: u32, column: u32) -> Result<&mut Self> {
        let Some(&open) = self.builder.scope_stack.last() else {
            return Err(Error::NoOpenScope("end_scope"));
        };
        let position = Position::new(line, column);
        let scope = self.builder.info.scope(open);
        self.ensure_not_before("end_scope", scope.start, position)?;
        if let Some(&child) = scope.children.last() {
            let child_end = self.builder.info.scope(child).end;
            self.ensure_not_before("end_scope", child_end, position)?;
        }
        self.builder.end_scope(line, column);
        Ok(self)
    }

    pub fn current_scope(&self) -> Option<ScopeId> {
        self.builder.current_scope()
    }

    pub fn last_scope(&self) -> Option<ScopeId> {
        self.builder.last_scope()
    }

    pub fn start_range(
        &mut self,
        line: u32,
        column: u32,
        options: RangeOptions,
    ) -> Result<&mut Self> {
        if !self.builder.scope_stack.is_empty() {
            return Err(Error::ScopesOpen("start_range"));
        }
        let position = Position::new(line, column);
        match self.builder.range_stack.last().copied() {
            Some(parent) => {
                let parent_range = self.builder.info.range(parent);
                self.ensure_not_before("start_range", parent_range.start, position)?;
                if let Some(&sibling) = parent_range.children.last() {
                    let sibling_end = self.builder.info.range(sibling).end;
                    self.ensure_not_before("start_range", sibling_end, position)?;
                }
            }
            None => {
                if let Some(&previous) = self.builder.info.ranges.last() {
                    let previous_end = self.builder.info.range(previous).end;
                    self.ensure_not_before("start_range", previous_end, position)?;
                }
            }
        }

        let scope = self.resolve_scope(&options)?;
        if !options.values.is_empty() {
            self.check_values(scope, options.values.len())?;
        }
        if options.call_site.is_some() {
            self.check_call_site(scope, options.is_stack_frame)?;
        }
        self.builder.start_range(line, column, options);
        Ok(self)
    }

    pub fn set_range_definition_scope(&mut self, scope: ScopeId) -> Result<&mut Self> {
        self.ensure_open_range("set_range_definition_scope")?;
        self.ensure_known_scope(scope)?;
        self.builder.set_range_definition_scope(scope);
        Ok(self)
    }

    pub fn set_range_definition_scope_key(&mut self, key: &str) -> Result<&mut Self> {
        self.ensure_open_range("set_range_definition_scope_key")?;
        if !self.builder.keyed_scopes.contains_key(key) {
            return Err(Error::UnknownScopeKey(key.to_string()));
        }
        self.builder.set_range_definition_scope_key(key);
        Ok(self)
    }

    pub fn set_range_stack_frame(&mut self, is_stack_frame: bool) -> Result<&mut Self> {
        let open = self.ensure_open_range("set_range_stack_frame")?;
        if is_stack_frame && self.builder.info.range(open).call_site.is_some() {
            return Err(Error::CallSiteOnStackFrame);
        }
        self.builder.set_range_stack_frame(is_stack_frame);
        Ok(self)
    }

    pub fn set_range_hidden(&mut self, is_hidden: bool) -> Result<&mut Self> {
        self.ensure_open_range("set_range_hidden")?;
        self.builder.set_range_hidden(is_hidden);
        Ok(self)
    }

    pub fn set_range_values(&mut self, values: Vec<Binding>) -> Result<&mut Self> {
        let open = self.ensure_open_range("set_range_values")?;
        let scope = self.builder.info.range(open).original_scope;
        if !values.is_empty() {
            self.check_values(scope, values.len())?;
        }
        self.builder.set_range_values(values);
        Ok(self)
    }

    pub fn set_range_call_site(&mut self, call_site: OriginalPosition) -> Result<&mut Self> {
        let open = self.ensure_open_range("set_range_call_site")?;
        let range = self.builder.info.range(open);
        self.check_call_site(range.original_scope, range.is_stack_frame)?;
        self.builder.set_range_call_site(call_site);
        Ok(self)
    }

    pub fn end_range(&mut self, line: u32, column: u32) -> Result<&mut Self> {
        let Some(&open) = self.builder.range_stack.last() else {
            return Err(Error::NoOpenRange("end_range"));
        };
        let position = Position::new(line, column);
        let range = self.builder.info.range(open);
        self.ensure_not_before("end_range", range.start, position)?;
        if let Some(&child) = range.children.last() {
            let child_end = self.builder.info.range(child).end;
            self.ensure_not_before("end_range", child_end, position)?;
        }
        for (variable, binding) in range.values.iter().enumerate() {
            if let Binding::SubRanges(pieces) = binding {
                check_sub_range_tiling(variable, pieces, range.start, position)?;
            }
        }
        self.builder.end_range(line, column);
        Ok(self)
    }

    pub fn build(&mut self) -> Result<ScopeInfo> {
        if !self.builder.scope_stack.is_empty() || !self.builder.range_stack.is_empty() {
            return Err(Error::UnclosedAtBuild);
        }
        Ok(self.builder.build())
    }

    fn ensure_no_open_ranges(&self, op: &'static str) -> Result<()> {
        if self.builder.range_stack.is_empty() {
            Ok(())
        } else {
            Err(Error::RangesOpen(op))
        }
    }

    fn ensure_open_scope(&self, op: &'static str) -> Result<ScopeId> {
        self.builder
            .scope_stack
            .last()
            .copied()
            .ok_or(Error::NoOpenScope(op))
    }

    fn ensure_open_range(&self, op: &'static str) -> Result<RangeId> {
        self.builder
            .range_stack
            .last()
            .copied()
            .ok_or(Error::NoOpenRange(op))
    }

    fn ensure_not_before(
        &self,
        op: &'static str,
        previous: Position,
        next: Position,
    ) -> Result<()> {
        if compare_positions(&next, &previous) == Ordering::Less {
            Err(Error::PositionOutOfOrder { op, previous, next })
        } else {
            Ok(())
        }
    }

    fn ensure_known_scope(&self, scope: ScopeId) -> Result<()> {
        if self.builder.info.try_scope(scope).is_some() {
            Ok(())
        } else {
            Err(Error::UnresolvedScopeHandle)
        }
    }

    /// Resolve the definition scope named by the options, if any.
    fn resolve_scope(&self, options: &RangeOptions) -> Result<Option<ScopeId>> {
        if let Some(scope) = options.scope {
            self.ensure_known_scope(scope)?;
            return Ok(Some(scope));
        }
        if let Some(key) = options.scope_key.as_deref() {
            return match self.builder.keyed_scopes.get(key) {
                Some(&scope) => Ok(Some(scope)),
                None => Err(Error::UnknownScopeKey(key.to_string())),
            };
        }
        Ok(None)
    }

    fn check_values(&self, scope: Option<ScopeId>, values: usize) -> Result<()> {
        let Some(scope) = scope else {
            return Err(Error::ValuesWithoutScope);
        };
        let variables = self.builder.info.scope(scope).variables.len();
        if values != variables {
            return Err(Error::ValuesCountMismatch { values, variables });
        }
        Ok(())
    }

    fn check_call_site(&self, scope: Option<ScopeId>, is_stack_frame: bool) -> Result<()> {
        if scope.is_none() {
            return Err(Error::CallSiteWithoutScope);
        }
        if is_stack_frame {
            return Err(Error::CallSiteOnStackFrame);
        }
        Ok(())
    }
}

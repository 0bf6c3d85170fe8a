//! Decoder
//!
//! Streaming parser for the `scopes` item stream. Reconstructs the scope
//! and range forests, resolving numeric definition-scope references
//! against the scopes decoded so far. Two modes: `Strict` fails on
//! structural and reference problems, `Lax` (the default) recovers by
//! dropping items or substituting defaults. Unknown tags and trailing
//! VLQs on known tags are skipped for forward compatibility; malformed
//! VLQs fail in both modes.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::grammar::{self, range_flags, scope_flags};
use crate::position::{compare_positions, OriginalPosition, Position};
use crate::scope_info::{
    Binding, GeneratedRange, OriginalScope, RangeId, ScopeId, ScopeInfo, SubRangeBinding,
};
use crate::source_map::SourceMapJson;
use crate::vlq::TokenIterator;

/// How the decoder reacts to structural and reference problems.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeMode {
    /// Fail on unmatched items, orphans, out-of-bounds indices and
    /// unclosed trees.
    Strict,
    /// Recover: drop orphans, substitute defaults for bad indices,
    /// discard unclosed trees.
    #[default]
    Lax,
}

/// Options accepted by [`decode`].
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    pub mode: DecodeMode,
    /// Offset added to decoded generated-range positions. Ignored for
    /// index maps, which carry per-section offsets instead.
    pub generated_offset: Option<Position>,
}

/// Decode the scopes side channel of `map`.
///
/// An index map is decoded section by section, each section's ranges
/// shifted by its offset, and the results concatenated. A map with
/// neither `scopes` nor `sections` yields an empty info.
pub fn decode(map: &SourceMapJson, options: &DecodeOptions) -> Result<ScopeInfo> {
    if let Some(sections) = &map.sections {
        let mut combined = ScopeInfo::default();
        let inner_options = DecodeOptions {
            mode: options.mode,
            generated_offset: None,
        };
        for section in sections {
            let mut info = decode(&section.map, &inner_options)?;
            apply_generated_offset(&mut info, section.offset);
            combined.append(info);
        }
        return Ok(combined);
    }

    let Some(scopes) = &map.scopes else {
        return Ok(ScopeInfo::default());
    };
    let names = map.names.as_deref().unwrap_or(&[]);
    let mut info = Decoder::new(names, options.mode).decode(scopes)?;
    if let Some(offset) = options.generated_offset {
        apply_generated_offset(&mut info, offset);
    }
    Ok(info)
}

/// Shift every generated-range position: positions on line zero gain the
/// offset's column, all positions gain its line. Call sites are authored
/// coordinates and stay untouched.
fn apply_generated_offset(info: &mut ScopeInfo, offset: Position) {
    let shift = |position: &mut Position| {
        if position.line == 0 {
            position.column = position.column.saturating_add(offset.column);
        }
        position.line = position.line.saturating_add(offset.line);
    };
    for range in &mut info.range_nodes {
        shift(&mut range.start);
        shift(&mut range.end);
        for binding in &mut range.values {
            if let Binding::SubRanges(pieces) = binding {
                for piece in pieces {
                    shift(&mut piece.from);
                    shift(&mut piece.to);
                }
            }
        }
    }
}

/// Differential state while decoding one top-level scope tree.
#[derive(Default)]
struct ScopeState {
    line: u32,
    name: i64,
    kind: i64,
    variable: i64,
}

/// Differential state while decoding one top-level range tree.
#[derive(Default)]
struct RangeState {
    line: u32,
    column: u32,
    def_scope: i64,
    call_site_source: i64,
    call_site_line: i64,
    call_site_column: i64,
}

struct Decoder<'a> {
    mode: DecodeMode,
    names: &'a [String],
    info: ScopeInfo,
    scope_stack: Vec<ScopeId>,
    range_stack: Vec<RangeId>,
    scope_state: ScopeState,
    range_state: RangeState,
}

impl<'a> Decoder<'a> {
    fn new(names: &'a [String], mode: DecodeMode) -> Self {
        Decoder {
            mode,
            names,
            info: ScopeInfo::default(),
            scope_stack: Vec::new(),
            range_stack: Vec::new(),
            scope_state: ScopeState::default(),
            range_state: RangeState::default(),
        }
    }

    fn decode(mut self, encoded: &str) -> Result<ScopeInfo> {
        let mut iter = TokenIterator::new(encoded);
        // An empty item appends a null placeholder; `expect_item` is true
        // whenever the cursor sits at the start of a (possibly empty) item.
        let mut expect_item = true;
        while iter.has_next() {
            if iter.peek() == Some(',') {
                iter.next_char();
                if expect_item {
                    self.info.scopes.push(None);
                }
                expect_item = true;
                continue;
            }
            self.decode_item(&mut iter)?;
            expect_item = false;
        }
        if expect_item {
            self.info.scopes.push(None);
        }
        if !self.scope_stack.is_empty() || !self.range_stack.is_empty() {
            // Lax: the unclosed nodes were never attached, so dropping the
            // stacks discards the incomplete trees.
            self.recover(Error::UnclosedAtEndOfInput)?;
        }
        Ok(self.info)
    }

    fn decode_item(&mut self, iter: &mut TokenIterator) -> Result<()> {
        let tag = iter.next_unsigned_vlq()?;
        match tag {
            grammar::ORIGINAL_SCOPE_START => self.scope_start(iter)?,
            grammar::ORIGINAL_SCOPE_END => self.scope_end(iter)?,
            grammar::ORIGINAL_SCOPE_VARIABLES => self.scope_variables(iter)?,
            grammar::GENERATED_RANGE_START => self.range_start(iter)?,
            grammar::GENERATED_RANGE_END => self.range_end(iter)?,
            grammar::GENERATED_RANGE_BINDINGS => self.range_bindings(iter)?,
            grammar::GENERATED_RANGE_SUBRANGE_BINDING => self.sub_range_binding(iter)?,
            grammar::GENERATED_RANGE_CALL_SITE => self.call_site(iter)?,
            unknown => {
                tracing::trace!(tag = unknown, "skipping item with unknown tag");
            }
        }
        // Forward compatibility: whatever the item still carries is
        // discarded, but it must consist of well-formed VLQs.
        while iter.has_next() && iter.peek() != Some(',') {
            iter.next_unsigned_vlq()?;
        }
        Ok(())
    }

    /// Report `error` in strict mode, log and continue in lax mode.
    fn recover(&self, error: Error) -> Result<()> {
        match self.mode {
            DecodeMode::Strict => Err(error),
            DecodeMode::Lax => {
                tracing::debug!(%error, "recovered from malformed scopes item");
                Ok(())
            }
        }
    }

    /// Resolve a `names` index, substituting the empty string in lax mode.
    fn resolve_name(&self, index: i64) -> Result<String> {
        match usize::try_from(index).ok().and_then(|i| self.names.get(i)) {
            Some(name) => Ok(name.clone()),
            None => {
                self.recover(Error::NamesIndexOutOfBounds {
                    index,
                    len: self.names.len(),
                })?;
                Ok(String::new())
            }
        }
    }

    fn scope_start(&mut self, iter: &mut TokenIterator) -> Result<()> {
        let flags = iter.next_unsigned_vlq()?;
        let delta_line = iter.next_unsigned_vlq()?;
        let column = iter.next_unsigned_vlq()?;
        self.scope_state.line = self.scope_state.line.saturating_add(delta_line);

        let mut name = None;
        if flags & scope_flags::HAS_NAME != 0 {
            self.scope_state.name += i64::from(iter.next_signed_vlq()?);
            name = Some(self.resolve_name(self.scope_state.name)?);
        }
        let mut kind = None;
        if flags & scope_flags::HAS_KIND != 0 {
            self.scope_state.kind += i64::from(iter.next_signed_vlq()?);
            kind = Some(self.resolve_name(self.scope_state.kind)?);
        }

        let position = Position::new(self.scope_state.line, column);
        let parent = self.scope_stack.last().copied();
        let id = self.info.add_scope(OriginalScope {
            start: position,
            end: position,
            name,
            kind,
            is_stack_frame: flags & scope_flags::IS_STACK_FRAME != 0,
            variables: Vec::new(),
            children: Vec::new(),
            parent,
        });
        self.scope_stack.push(id);
        Ok(())
    }

    fn scope_end(&mut self, iter: &mut TokenIterator) -> Result<()> {
        let delta_line = iter.next_unsigned_vlq()?;
        let column = iter.next_unsigned_vlq()?;
        self.scope_state.line = self.scope_state.line.saturating_add(delta_line);
        let position = Position::new(self.scope_state.line, column);

        let Some(id) = self.scope_stack.pop() else {
            return self.recover(Error::UnmatchedScopeEnd);
        };
        self.info.scope_mut(id).end = position;
        match self.scope_stack.last().copied() {
            Some(parent) => self.info.scope_mut(parent).children.push(id),
            None => {
                self.info.scopes.push(Some(id));
                self.scope_state = ScopeState::default();
            }
        }
        Ok(())
    }

    fn scope_variables(&mut self, iter: &mut TokenIterator) -> Result<()> {
        let Some(&top) = self.scope_stack.last() else {
            return self.recover(Error::OrphanItem("variables"));
        };
        let mut variables = Vec::new();
        while iter.has_next() && iter.peek() != Some(',') {
            self.scope_state.variable += i64::from(iter.next_signed_vlq()?);
            variables.push(self.resolve_name(self.scope_state.variable)?);
        }
        self.info.scope_mut(top).variables.extend(variables);
        Ok(())
    }

    fn range_start(&mut self, iter: &mut TokenIterator) -> Result<()> {
        let flags = iter.next_unsigned_vlq()?;
        if flags & range_flags::HAS_LINE != 0 {
            let delta_line = iter.next_unsigned_vlq()?;
            self.range_state.line = self.range_state.line.saturating_add(delta_line);
            self.range_state.column = iter.next_unsigned_vlq()?;
        } else {
            let delta_column = iter.next_unsigned_vlq()?;
            self.range_state.column = self.range_state.column.saturating_add(delta_column);
        }

        let mut original_scope = None;
        if flags & range_flags::HAS_DEFINITION != 0 {
            self.range_state.def_scope += i64::from(iter.next_signed_vlq()?);
            let index = self.range_state.def_scope;
            match usize::try_from(index)
                .ok()
                .filter(|&i| i < self.info.scope_count())
            {
                Some(i) => original_scope = Some(ScopeId::new(i)),
                None => self.recover(Error::UnknownDefinitionScopeIndex { index })?,
            }
        }

        let position = Position::new(self.range_state.line, self.range_state.column);
        let parent = self.range_stack.last().copied();
        let id = self.info.add_range(GeneratedRange {
            start: position,
            end: position,
            original_scope,
            is_stack_frame: flags & range_flags::IS_STACK_FRAME != 0,
            is_hidden: flags & range_flags::IS_HIDDEN != 0,
            call_site: None,
            values: Vec::new(),
            children: Vec::new(),
            parent,
        });
        self.range_stack.push(id);
        Ok(())
    }

    fn range_end(&mut self, iter: &mut TokenIterator) -> Result<()> {
        // Compressed form: a single VLQ is a column delta, two VLQs are a
        // line delta followed by an absolute column.
        let first = iter.next_unsigned_vlq()?;
        if iter.has_next() && iter.peek() != Some(',') {
            self.range_state.line = self.range_state.line.saturating_add(first);
            self.range_state.column = iter.next_unsigned_vlq()?;
        } else {
            self.range_state.column = self.range_state.column.saturating_add(first);
        }
        let position = Position::new(self.range_state.line, self.range_state.column);

        let Some(id) = self.range_stack.pop() else {
            return self.recover(Error::UnmatchedRangeEnd);
        };
        let range = self.info.range_mut(id);
        range.end = position;
        // Close the final piece of every sub-range binding list.
        for binding in &mut range.values {
            if let Binding::SubRanges(pieces) = binding {
                if let Some(last) = pieces.last_mut() {
                    last.to = position;
                }
            }
        }
        match self.range_stack.last().copied() {
            Some(parent) => self.info.range_mut(parent).children.push(id),
            None => {
                self.info.ranges.push(id);
                self.range_state = RangeState::default();
            }
        }
        Ok(())
    }

    fn range_bindings(&mut self, iter: &mut TokenIterator) -> Result<()> {
        let Some(&top) = self.range_stack.last() else {
            return self.recover(Error::OrphanItem("bindings"));
        };
        let mut values = Vec::new();
        while iter.has_next() && iter.peek() != Some(',') {
            let index = iter.next_signed_vlq()?;
            if index == -1 {
                values.push(Binding::Unavailable);
            } else {
                values.push(Binding::Expression(self.resolve_name(i64::from(index))?));
            }
        }
        self.info.range_mut(top).values.extend(values);
        if self.mode == DecodeMode::Strict {
            let variables = match self.info.range(top).original_scope {
                None => return Err(Error::ValuesWithoutScope),
                Some(scope) => self.info.scope(scope).variables.len(),
            };
            let values = self.info.range(top).values.len();
            if values != variables {
                return Err(Error::ValuesCountMismatch { values, variables });
            }
        }
        Ok(())
    }

    fn sub_range_binding(&mut self, iter: &mut TokenIterator) -> Result<()> {
        let variable = iter.next_unsigned_vlq()? as usize;
        let value_index = iter.next_signed_vlq()?;
        let value = if value_index == -1 {
            None
        } else {
            Some(self.resolve_name(i64::from(value_index))?)
        };
        let first = iter.next_unsigned_vlq()?;
        let second = if iter.has_next() && iter.peek() != Some(',') {
            Some(iter.next_unsigned_vlq()?)
        } else {
            None
        };

        let Some(&top) = self.range_stack.last() else {
            return self.recover(Error::OrphanItem("sub-range binding"));
        };
        let values_len = self.info.range(top).values.len();
        if variable >= values_len {
            return self.recover(Error::VariableIndexOutOfBounds {
                index: variable,
                len: values_len,
            });
        }

        // The position is relative to the previous piece's start, or to
        // the range start when this is the variable's first sub-range.
        let range_start = self.info.range(top).start;
        let base = match &self.info.range(top).values[variable] {
            Binding::SubRanges(pieces) => pieces.last().map(|piece| piece.from).unwrap_or(range_start),
            _ => range_start,
        };
        let from = match second {
            Some(column) => Position::new(base.line.saturating_add(first), column),
            None => Position::new(base.line, base.column.saturating_add(first)),
        };
        if compare_positions(&from, &base) != Ordering::Greater {
            self.recover(Error::DuplicateSubRangeBinding { variable })?;
        }

        // `to` of the new piece is patched by the next piece or at range
        // end; until then it mirrors `from`.
        match &mut self.info.range_mut(top).values[variable] {
            Binding::SubRanges(pieces) => {
                if let Some(last) = pieces.last_mut() {
                    last.to = from;
                }
                pieces.push(SubRangeBinding { value, from, to: from });
            }
            binding => {
                let head_value = match binding {
                    Binding::Expression(expression) => Some(std::mem::take(expression)),
                    _ => None,
                };
                *binding = Binding::SubRanges(vec![
                    SubRangeBinding {
                        value: head_value,
                        from: range_start,
                        to: from,
                    },
                    SubRangeBinding { value, from, to: from },
                ]);
            }
        }
        Ok(())
    }

    fn call_site(&mut self, iter: &mut TokenIterator) -> Result<()> {
        let delta_source = i64::from(iter.next_signed_vlq()?);
        let second = i64::from(iter.next_signed_vlq()?);
        let third = i64::from(iter.next_signed_vlq()?);

        let Some(&top) = self.range_stack.last() else {
            return self.recover(Error::OrphanItem("call site"));
        };

        // The cascade mirrors the encoder: a nonzero source delta makes
        // line and column absolute, a nonzero line delta makes column
        // absolute.
        let source = self.range_state.call_site_source + delta_source;
        let (line, column) = if delta_source != 0 {
            (second, third)
        } else if second != 0 {
            (self.range_state.call_site_line + second, third)
        } else {
            (
                self.range_state.call_site_line,
                self.range_state.call_site_column + third,
            )
        };
        if source < 0 || line < 0 || column < 0 {
            return self.recover(Error::NegativePosition);
        }
        self.range_state.call_site_source = source;
        self.range_state.call_site_line = line;
        self.range_state.call_site_column = column;
        self.info.range_mut(top).call_site = Some(OriginalPosition::new(
            source as u32,
            line as u32,
            column as u32,
        ));
        Ok(())
    }
}

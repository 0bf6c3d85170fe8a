//! Encoder
//!
//! Serializes a [`ScopeInfo`] into the comma-separated tagged item stream
//! stored in a source map's `scopes` field. Strings are interned into the
//! map's `names` table, positions and table indices are emitted as deltas
//! against two small state records, and scopes are numbered in pre-order
//! so ranges can reference them by integer. Encoder instances are
//! one-shot.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::grammar::{self, range_flags, scope_flags};
use crate::position::{compare_positions, OriginalPosition, Position};
use crate::scope_info::{check_sub_range_tiling, Binding, RangeId, ScopeId, ScopeInfo};
use crate::source_map::SourceMapJson;
use crate::vlq;

/// Encode `info` into a source map.
///
/// With `input_map` given, its `names` table is extended in place and the
/// encoded string written into `scopes`; without one, a minimal v3 map
/// with unnamed sources is synthesized. Fails when the map's source count
/// does not match `info.scopes()`.
pub fn encode(info: &ScopeInfo, input_map: Option<SourceMapJson>) -> Result<SourceMapJson> {
    let mut map =
        input_map.unwrap_or_else(|| SourceMapJson::with_source_count(info.scopes().len()));
    if map.sources.len() != info.scopes().len() {
        return Err(Error::SourcesScopesLengthMismatch {
            sources: map.sources.len(),
            scopes: info.scopes().len(),
        });
    }
    let names = map.names.take().unwrap_or_default();
    let (scopes, names) = Encoder::new(info, names).encode()?;
    map.names = Some(names);
    map.scopes = Some(scopes);
    Ok(map)
}

/// Append-if-absent interner over the map's `names` table.
///
/// Existing entries keep their indices; duplicates already present in the
/// table resolve to their first occurrence.
struct NamesInterner {
    names: Vec<String>,
    cache: HashMap<String, u32>,
}

impl NamesInterner {
    fn new(existing: Vec<String>) -> Self {
        let mut cache = HashMap::with_capacity(existing.len());
        for (index, name) in existing.iter().enumerate() {
            cache.entry(name.clone()).or_insert(index as u32);
        }
        NamesInterner {
            names: existing,
            cache,
        }
    }

    fn intern(&mut self, value: &str) -> u32 {
        if let Some(&index) = self.cache.get(value) {
            return index;
        }
        let index = self.names.len() as u32;
        self.names.push(value.to_string());
        self.cache.insert(value.to_string(), index);
        index
    }
}

/// Differential state while emitting one top-level scope tree.
#[derive(Default)]
struct ScopeState {
    line: u32,
    /// Tracked for ordering checks; columns are emitted absolute.
    column: u32,
    name: i64,
    kind: i64,
    variable: i64,
}

/// Differential state while emitting one top-level range tree.
#[derive(Default)]
struct RangeState {
    line: u32,
    column: u32,
    def_scope: i64,
    call_site_source: i64,
    call_site_line: i64,
    call_site_column: i64,
}

struct Encoder<'a> {
    info: &'a ScopeInfo,
    names: NamesInterner,
    items: Vec<String>,
    scope_state: ScopeState,
    range_state: RangeState,
    /// Pre-order number of each arena scope, assigned during emission.
    scope_numbers: Vec<Option<u32>>,
    next_scope_number: u32,
}

impl<'a> Encoder<'a> {
    fn new(info: &'a ScopeInfo, names: Vec<String>) -> Self {
        Encoder {
            info,
            names: NamesInterner::new(names),
            items: Vec::new(),
            scope_state: ScopeState::default(),
            range_state: RangeState::default(),
            scope_numbers: vec![None; info.scope_count()],
            next_scope_number: 0,
        }
    }

    fn encode(mut self) -> Result<(String, Vec<String>)> {
        for entry in self.info.scopes() {
            match entry {
                None => self.items.push(String::new()),
                Some(scope) => {
                    self.scope_state = ScopeState::default();
                    self.encode_scope(*scope)?;
                }
            }
        }
        for &range in self.info.ranges() {
            self.range_state = RangeState::default();
            self.encode_range(range)?;
        }
        tracing::debug!(
            items = self.items.len(),
            names = self.names.names.len(),
            "encoded scope info"
        );
        Ok((self.items.join(","), self.names.names))
    }

    fn encode_scope(&mut self, id: ScopeId) -> Result<()> {
        let info = self.info;
        let scope = info.scope(id);
        self.scope_numbers[id.index()] = Some(self.next_scope_number);
        self.next_scope_number += 1;

        self.check_scope_order("scope start", scope.start)?;
        let mut flags = 0;
        if scope.name.is_some() {
            flags |= scope_flags::HAS_NAME;
        }
        if scope.kind.is_some() {
            flags |= scope_flags::HAS_KIND;
        }
        if scope.is_stack_frame {
            flags |= scope_flags::IS_STACK_FRAME;
        }
        // Kind is interned ahead of name; the payload still carries name first.
        let kind_index = scope.kind.as_ref().map(|kind| i64::from(self.names.intern(kind)));
        let name_index = scope.name.as_ref().map(|name| i64::from(self.names.intern(name)));

        let mut item = String::new();
        vlq::encode_unsigned(grammar::ORIGINAL_SCOPE_START, &mut item);
        vlq::encode_unsigned(flags, &mut item);
        vlq::encode_unsigned(scope.start.line - self.scope_state.line, &mut item);
        vlq::encode_unsigned(scope.start.column, &mut item);
        if let Some(index) = name_index {
            vlq::encode_signed((index - self.scope_state.name) as i32, &mut item);
            self.scope_state.name = index;
        }
        if let Some(index) = kind_index {
            vlq::encode_signed((index - self.scope_state.kind) as i32, &mut item);
            self.scope_state.kind = index;
        }
        self.scope_state.line = scope.start.line;
        self.scope_state.column = scope.start.column;
        self.items.push(item);

        if !scope.variables.is_empty() {
            let mut item = String::new();
            vlq::encode_unsigned(grammar::ORIGINAL_SCOPE_VARIABLES, &mut item);
            for variable in &scope.variables {
                let index = i64::from(self.names.intern(variable));
                vlq::encode_signed((index - self.scope_state.variable) as i32, &mut item);
                self.scope_state.variable = index;
            }
            self.items.push(item);
        }

        for &child in &scope.children {
            self.encode_scope(child)?;
        }

        self.check_scope_order("scope end", scope.end)?;
        let mut item = String::new();
        vlq::encode_unsigned(grammar::ORIGINAL_SCOPE_END, &mut item);
        vlq::encode_unsigned(scope.end.line - self.scope_state.line, &mut item);
        vlq::encode_unsigned(scope.end.column, &mut item);
        self.scope_state.line = scope.end.line;
        self.scope_state.column = scope.end.column;
        self.items.push(item);
        Ok(())
    }

    fn encode_range(&mut self, id: RangeId) -> Result<()> {
        let info = self.info;
        let range = info.range(id);

        self.check_range_order("range start", range.start)?;
        let has_line = range.start.line != self.range_state.line;
        let mut flags = 0;
        if has_line {
            flags |= range_flags::HAS_LINE;
        }
        if range.original_scope.is_some() {
            flags |= range_flags::HAS_DEFINITION;
        }
        if range.is_stack_frame {
            flags |= range_flags::IS_STACK_FRAME;
        }
        if range.is_hidden {
            flags |= range_flags::IS_HIDDEN;
        }
        let mut item = String::new();
        vlq::encode_unsigned(grammar::GENERATED_RANGE_START, &mut item);
        vlq::encode_unsigned(flags, &mut item);
        if has_line {
            vlq::encode_unsigned(range.start.line - self.range_state.line, &mut item);
            vlq::encode_unsigned(range.start.column, &mut item);
        } else {
            vlq::encode_unsigned(range.start.column - self.range_state.column, &mut item);
        }
        if let Some(scope) = range.original_scope {
            let number = self
                .scope_numbers
                .get(scope.index())
                .copied()
                .flatten()
                .ok_or(Error::UnknownDefinitionScope)?;
            let number = i64::from(number);
            vlq::encode_signed((number - self.range_state.def_scope) as i32, &mut item);
            self.range_state.def_scope = number;
        }
        self.range_state.line = range.start.line;
        self.range_state.column = range.start.column;
        self.items.push(item);

        if !range.values.is_empty() {
            self.encode_bindings(id)?;
        }
        if let Some(call_site) = range.call_site {
            self.encode_call_site(call_site);
        }

        for &child in &range.children {
            self.encode_range(child)?;
        }

        self.check_range_order("range end", range.end)?;
        let mut item = String::new();
        vlq::encode_unsigned(grammar::GENERATED_RANGE_END, &mut item);
        if range.end.line != self.range_state.line {
            vlq::encode_unsigned(range.end.line - self.range_state.line, &mut item);
            vlq::encode_unsigned(range.end.column, &mut item);
        } else {
            vlq::encode_unsigned(range.end.column - self.range_state.column, &mut item);
        }
        self.range_state.line = range.end.line;
        self.range_state.column = range.end.column;
        self.items.push(item);
        Ok(())
    }

    /// Emit the bindings item and, for sub-range bindings, one follow-up
    /// item per piece after the first. A piece's `from` is encoded
    /// relative to its predecessor's `from` (the first piece sits at the
    /// range start); `to` positions are implied by contiguity.
    fn encode_bindings(&mut self, id: RangeId) -> Result<()> {
        let info = self.info;
        let range = info.range(id);
        let Some(scope) = range.original_scope else {
            return Err(Error::ValuesWithoutScope);
        };
        let variables = info.scope(scope).variables.len();
        if range.values.len() != variables {
            return Err(Error::ValuesCountMismatch {
                values: range.values.len(),
                variables,
            });
        }
        for (variable, binding) in range.values.iter().enumerate() {
            if let Binding::SubRanges(pieces) = binding {
                check_sub_range_tiling(variable, pieces, range.start, range.end)?;
            }
        }

        let mut item = String::new();
        vlq::encode_unsigned(grammar::GENERATED_RANGE_BINDINGS, &mut item);
        for binding in &range.values {
            let value = match binding {
                Binding::Unavailable => None,
                Binding::Expression(expression) => Some(expression.as_str()),
                Binding::SubRanges(pieces) => pieces[0].value.as_deref(),
            };
            self.encode_name_or_absent(value, &mut item);
        }
        self.items.push(item);

        for (variable, binding) in range.values.iter().enumerate() {
            if let Binding::SubRanges(pieces) = binding {
                let mut base = pieces[0].from;
                for piece in &pieces[1..] {
                    let mut item = String::new();
                    vlq::encode_unsigned(grammar::GENERATED_RANGE_SUBRANGE_BINDING, &mut item);
                    vlq::encode_unsigned(variable as u32, &mut item);
                    self.encode_name_or_absent(piece.value.as_deref(), &mut item);
                    if piece.from.line == base.line {
                        vlq::encode_unsigned(piece.from.column - base.column, &mut item);
                    } else {
                        vlq::encode_unsigned(piece.from.line - base.line, &mut item);
                        vlq::encode_unsigned(piece.from.column, &mut item);
                    }
                    base = piece.from;
                    self.items.push(item);
                }
            }
        }
        Ok(())
    }

    fn encode_name_or_absent(&mut self, value: Option<&str>, item: &mut String) {
        match value {
            None => vlq::encode_signed(-1, item),
            Some(value) => {
                let index = self.names.intern(value);
                vlq::encode_signed(index as i32, item);
            }
        }
    }

    /// The three call site VLQs cascade: a nonzero source delta makes line
    /// and column absolute, a nonzero line delta makes column absolute,
    /// and only with both zero is column a delta.
    fn encode_call_site(&mut self, call_site: OriginalPosition) {
        let source = i64::from(call_site.source_index);
        let line = i64::from(call_site.line);
        let column = i64::from(call_site.column);

        let mut item = String::new();
        vlq::encode_unsigned(grammar::GENERATED_RANGE_CALL_SITE, &mut item);
        let delta_source = source - self.range_state.call_site_source;
        vlq::encode_signed(delta_source as i32, &mut item);
        if delta_source != 0 {
            vlq::encode_signed(line as i32, &mut item);
            vlq::encode_signed(column as i32, &mut item);
        } else {
            let delta_line = line - self.range_state.call_site_line;
            vlq::encode_signed(delta_line as i32, &mut item);
            if delta_line != 0 {
                vlq::encode_signed(column as i32, &mut item);
            } else {
                vlq::encode_signed((column - self.range_state.call_site_column) as i32, &mut item);
            }
        }
        self.range_state.call_site_source = source;
        self.range_state.call_site_line = line;
        self.range_state.call_site_column = column;
        self.items.push(item);
    }

    fn check_scope_order(&self, op: &'static str, position: Position) -> Result<()> {
        let previous = Position::new(self.scope_state.line, self.scope_state.column);
        check_monotonic(op, previous, position)
    }

    fn check_range_order(&self, op: &'static str, position: Position) -> Result<()> {
        let previous = Position::new(self.range_state.line, self.range_state.column);
        check_monotonic(op, previous, position)
    }
}

fn check_monotonic(op: &'static str, previous: Position, next: Position) -> Result<()> {
    if compare_positions(&next, &previous) == std::cmp::Ordering::Less {
        Err(Error::PositionOutOfOrder { op, previous, next })
    } else {
        Ok(())
    }
}

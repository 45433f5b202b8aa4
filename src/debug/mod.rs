// This module is the debug-info bridge. While a routine is traced with debug info enabled,
// every emitted instruction and every new traced value asks the builder to synchronise its
// scope stack with the host call stack of the tracing code. Frames shared with the
// previous capture keep their scope; frames that disappeared close their scope after
// committing its pending variable; a frame whose line moved backwards reopens a lexical
// scope so loop iterations shadow each other; new inner frames open function scopes.
// Variables are named from the source line that produced them and held as pending until a
// definition on a different line shows up in the same scope, so only the last definition
// per line is committed. Committing inserts, at the saved point right after the
// definition, a stack slot and a store for values that are not already addresses; return
// lines get an extra nop one line later so the value can be inspected before the scope
// ends. Each instruction is tagged with a location id, which the backend's line table maps
// back to code offsets once the routine is compiled.

//! Debug-info bridge.
//!
//! - `backtrace`: host stack capture and frame filtering
//! - `scope`: the scope tree and committed variables
//! - `tokens`: source line tokens that name variables

pub mod backtrace;
pub mod scope;
pub mod tokens;

pub use backtrace::{parse_backtrace, BacktraceSource, Frame, HostBacktrace, ScriptedBacktrace};
pub use scope::{DebugCounters, DebugVariable, Scope, ScopeId, ScopeKind, ScopeTree};
pub use tokens::{LineTokens, Token, TokenCache};

use crate::core::{Backend, CodeRange, InsertPoint, MemoryAccess, Type, Value};
use hashbrown::HashMap;

/// A source position inside a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub scope: ScopeId,
}

/// A range of machine code attributed to one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    pub start: u32,
    pub end: u32,
    pub file: String,
    pub line: u32,
    pub scope: ScopeId,
}

#[derive(Debug, Clone)]
struct Pending {
    name: String,
    frame: Frame,
    value: Value,
    ty: Type,
    is_address: bool,
    point: InsertPoint,
    nop_on_next_line: bool,
}

#[derive(Debug)]
struct StackEntry {
    frame: Frame,
    scope: ScopeId,
    pending: Option<Pending>,
}

/// Builds the debug info of one routine while it is traced.
pub struct DebugInfoBuilder {
    source: Box<dyn BacktraceSource>,
    tokens: TokenCache,
    tree: ScopeTree,
    stack: Vec<StackEntry>,
    locations: Vec<SourceLocation>,
    location_ids: HashMap<(String, u32, ScopeId), u32>,
    current_location: Option<u32>,
    counters: DebugCounters,
}

impl DebugInfoBuilder {
    pub fn new(source: Box<dyn BacktraceSource>) -> Self {
        Self {
            source,
            tokens: TokenCache::new(),
            tree: ScopeTree::default(),
            stack: Vec::new(),
            locations: Vec::new(),
            location_ids: HashMap::new(),
            current_location: None,
            counters: DebugCounters::default(),
        }
    }

    /// Use `tokens` for `file` instead of reading it.
    pub fn with_tokens(mut self, file: &str, tokens: LineTokens) -> Self {
        self.tokens.insert(file, tokens);
        self
    }

    pub fn counters(&self) -> DebugCounters {
        self.counters
    }

    /// Current scope stack depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Sync scopes with the host stack and tag the next instruction with its location.
    pub fn emit_location(&mut self, backend: &mut dyn Backend) {
        let frames = self.source.capture();
        self.sync_scope(&frames, backend);
        let location = match (frames.last(), self.stack.last()) {
            (Some(frame), Some(entry)) => Some(self.location_id(frame, entry.scope)),
            _ => None,
        };
        self.current_location = location;
        backend.set_debug_location(location);
    }

    /// Offer `value` as a local named by the host source line that produced it.
    pub fn emit_variable(&mut self, backend: &mut dyn Backend, value: Value, ty: Type, is_address: bool) {
        let frames = self.source.capture();
        self.sync_scope(&frames, backend);

        for (depth, frame) in frames.iter().enumerate().rev() {
            let Some(token) = self.tokens.lookup(&frame.file, frame.line).cloned() else {
                break;
            };
            let (name, is_return) = match token {
                Token::Identifier(name) => (name, false),
                Token::Return => ("return_value".to_string(), true),
            };

            if self.stack[depth].pending.as_ref().is_some_and(|pending| pending.frame != *frame) {
                self.emit_pending(depth, backend);
            }

            let pending = Pending {
                name,
                frame: frame.clone(),
                value,
                ty,
                is_address,
                point: backend.insertion_point(),
                nop_on_next_line: is_return,
            };
            if self.stack[depth].pending.replace(pending).is_some() {
                self.counters.variables_superseded += 1;
            }

            // A returned value also names the caller's binding.
            if !is_return {
                break;
            }
        }
    }

    /// Commit the pending variable of the innermost scope.
    pub fn flush(&mut self, backend: &mut dyn Backend) {
        if let Some(depth) = self.stack.len().checked_sub(1) {
            self.emit_pending(depth, backend);
        }
    }

    /// Close every scope and hand out the finished debug info.
    pub fn finalize(mut self, backend: &mut dyn Backend) -> DebugInfo {
        self.shrink(0, backend);
        backend.set_debug_location(None);
        log::debug!(
            "Debug info: {} scopes, {} variables, {} locations",
            self.tree.len(),
            self.counters.variables_committed,
            self.locations.len()
        );
        DebugInfo {
            scopes: self.tree,
            locations: self.locations,
            counters: self.counters,
            line_table: Vec::new(),
        }
    }

    fn sync_scope(&mut self, frames: &[Frame], backend: &mut dyn Backend) {
        if frames.len() < self.stack.len() {
            self.shrink(frames.len(), backend);
        }

        for (depth, frame) in frames.iter().enumerate().take(self.stack.len()) {
            let old = &self.stack[depth].frame;
            if !old.same_function(frame) {
                log::trace!("scope {}: function changed {} -> {}", depth, old.function, frame.function);
                self.shrink(depth, backend);
                break;
            }

            if old.line > frame.line {
                log::trace!("scope {}: jumped backwards {} -> {}", depth, old.line, frame.line);
                self.emit_pending(depth, backend);
                let parent = self.stack[depth].scope;
                let scope = self.tree.open(Some(parent), ScopeKind::Lexical, frame.clone(), depth);
                self.counters.scopes_opened += 1;
                self.counters.scopes_closed += 1;
                self.counters.loop_scopes += 1;
                self.stack[depth] = StackEntry {
                    frame: frame.clone(),
                    scope,
                    pending: None,
                };
                self.shrink(depth + 1, backend);
                break;
            }

            self.stack[depth].frame = frame.clone();
        }

        while frames.len() > self.stack.len() {
            let depth = self.stack.len();
            let parent = self.stack.last().map(|entry| entry.scope);
            let frame = frames[depth].clone();
            let scope = self.tree.open(parent, ScopeKind::Function, frame.clone(), depth);
            self.counters.scopes_opened += 1;
            log::trace!("+ scope {} at {}", depth, frame);
            self.stack.push(StackEntry {
                frame,
                scope,
                pending: None,
            });
        }
    }

    fn shrink(&mut self, len: usize, backend: &mut dyn Backend) {
        while self.stack.len() > len {
            let depth = self.stack.len() - 1;
            self.emit_pending(depth, backend);
            if let Some(entry) = self.stack.pop() {
                log::trace!("- scope {} at {}", depth, entry.frame);
            }
            self.counters.scopes_closed += 1;
        }
    }

    fn emit_pending(&mut self, depth: usize, backend: &mut dyn Backend) {
        let Some(pending) = self.stack[depth].pending.take() else {
            return;
        };
        let scope_id = self.stack[depth].scope;
        if !self.tree.get_mut(scope_id).symbols.insert(pending.name.clone()) {
            self.counters.variables_duplicate += 1;
            return;
        }

        backend.set_insertion_point(Some(pending.point));
        let location = self.location_id(&pending.frame, scope_id);
        backend.set_debug_location(Some(location));

        let (address, promoted) = if pending.is_address {
            (pending.value, false)
        } else {
            let slot = backend.allocate_stack_variable(pending.ty, 0);
            backend.create_store(pending.value, slot, pending.ty, MemoryAccess::default());
            (slot, true)
        };

        if pending.nop_on_next_line {
            let next = Frame {
                line: pending.frame.line + 1,
                ..pending.frame.clone()
            };
            let location = self.location_id(&next, scope_id);
            backend.set_debug_location(Some(location));
            backend.create_nop();
        }

        backend.set_insertion_point(None);
        backend.set_debug_location(self.current_location);

        log::trace!("commit {} ({}) in {}", pending.name, pending.ty, scope_id);
        self.tree.get_mut(scope_id).variables.push(DebugVariable {
            name: pending.name,
            file: pending.frame.file,
            line: pending.frame.line,
            ty: pending.ty,
            address,
            promoted,
        });
        self.counters.variables_committed += 1;
    }

    fn location_id(&mut self, frame: &Frame, scope: ScopeId) -> u32 {
        let key = (frame.file.clone(), frame.line, scope);
        if let Some(&id) = self.location_ids.get(&key) {
            return id;
        }
        self.locations.push(SourceLocation {
            file: frame.file.clone(),
            line: frame.line,
            scope,
        });
        let id = self.locations.len() as u32;
        self.location_ids.insert(key, id);
        self.counters.locations += 1;
        id
    }
}

/// Debug info of a finished routine.
#[derive(Debug, Clone)]
pub struct DebugInfo {
    scopes: ScopeTree,
    locations: Vec<SourceLocation>,
    counters: DebugCounters,
    line_table: Vec<LineEntry>,
}

impl DebugInfo {
    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn counters(&self) -> DebugCounters {
        self.counters
    }

    pub fn locations(&self) -> &[SourceLocation] {
        &self.locations
    }

    /// Location with the id instructions were tagged with.
    pub fn location(&self, id: u32) -> Option<&SourceLocation> {
        id.checked_sub(1).and_then(|index| self.locations.get(index as usize))
    }

    pub fn variables(&self) -> impl Iterator<Item = &DebugVariable> {
        self.scopes.variables().map(|(_, variable)| variable)
    }

    /// First committed variable called `name`.
    pub fn variable(&self, name: &str) -> Option<&DebugVariable> {
        self.variables().find(|variable| variable.name == name)
    }

    pub fn line_table(&self) -> &[LineEntry] {
        &self.line_table
    }

    /// Source line of the code at `offset` from the routine entry.
    pub fn line_for_offset(&self, offset: u32) -> Option<&LineEntry> {
        self.line_table
            .iter()
            .find(|entry| entry.start <= offset && offset < entry.end)
    }

    /// Resolve the backend's code ranges into source lines.
    pub(crate) fn attach_line_table(&mut self, ranges: &[CodeRange]) {
        self.line_table = ranges
            .iter()
            .filter_map(|range| {
                let location = self.location(range.location)?;
                Some(LineEntry {
                    start: range.start,
                    end: range.end,
                    file: location.file.clone(),
                    line: location.line,
                    scope: location.scope,
                })
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_table_resolution() {
        let mut info = DebugInfo {
            scopes: ScopeTree::default(),
            locations: Vec::new(),
            counters: DebugCounters::default(),
            line_table: Vec::new(),
        };
        let scope = info.scopes.open(None, ScopeKind::Function, Frame::new("main", "a.rs", 1), 0);
        info.locations.push(SourceLocation {
            file: "a.rs".into(),
            line: 4,
            scope,
        });

        info.attach_line_table(&[
            CodeRange { start: 0, end: 8, location: 1 },
            CodeRange { start: 8, end: 12, location: 7 },
        ]);

        assert_eq!(info.line_table().len(), 1);
        assert_eq!(info.line_for_offset(3).map(|entry| entry.line), Some(4));
        assert!(info.line_for_offset(9).is_none());
        assert!(info.location(0).is_none());
    }
}

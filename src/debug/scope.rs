// The scope tree built while tracing. Every host frame that traces code opens a function
// scope; a frame whose line moves backwards (the host is running a loop) opens a lexical
// scope under it so each iteration's locals shadow the previous ones. Scopes are never
// removed: closing one only records the event, so the finished tree covers every scope the
// routine ever had. Variables committed to a scope carry the stack slot a debugger reads.

use super::backtrace::Frame;
use crate::core::{Type, Value};
use hashbrown::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// A host function frame.
    Function,
    /// A loop iteration inside the parent function scope.
    Lexical,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    /// Frame at the time the scope opened.
    pub opened_at: Frame,
    pub depth: usize,
    pub variables: Vec<DebugVariable>,
    pub(crate) symbols: HashSet<String>,
}

impl Scope {
    /// Display name, `jit!` followed by the host function.
    pub fn name(&self) -> String {
        format!("jit!{}", self.opened_at.function)
    }
}

/// A named local a debugger can inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugVariable {
    pub name: String,
    pub file: String,
    pub line: u32,
    pub ty: Type,
    /// Stack slot holding the value.
    pub address: Value,
    /// The value was computed and copied into a fresh slot.
    pub promoted: bool,
}

/// Scope and variable event counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugCounters {
    pub scopes_opened: usize,
    pub scopes_closed: usize,
    pub loop_scopes: usize,
    pub variables_committed: usize,
    /// Pending definitions overridden by a later definition on the same line.
    pub variables_superseded: usize,
    /// Commits skipped because the scope already had that name.
    pub variables_duplicate: usize,
    pub locations: usize,
}

impl fmt::Display for DebugCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Debug Info:")?;
        writeln!(
            f,
            "  Scopes: {} opened, {} closed, {} loop",
            self.scopes_opened, self.scopes_closed, self.loop_scopes
        )?;
        writeln!(
            f,
            "  Variables: {} committed, {} superseded, {} duplicate",
            self.variables_committed, self.variables_superseded, self.variables_duplicate
        )?;
        writeln!(f, "  Locations: {}", self.locations)
    }
}

/// All scopes ever opened, by id.
#[derive(Debug, Clone, Default)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub(crate) fn open(&mut self, parent: Option<ScopeId>, kind: ScopeKind, frame: Frame, depth: usize) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            id,
            parent,
            kind,
            opened_at: frame,
            depth,
            variables: Vec::new(),
            symbols: HashSet::new(),
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    pub fn roots(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter().filter(|scope| scope.parent.is_none())
    }

    pub fn children(&self, id: ScopeId) -> impl Iterator<Item = &Scope> {
        self.scopes.iter().filter(move |scope| scope.parent == Some(id))
    }

    /// Every variable of every scope, in scope order.
    pub fn variables(&self) -> impl Iterator<Item = (&Scope, &DebugVariable)> {
        self.scopes
            .iter()
            .flat_map(|scope| scope.variables.iter().map(move |variable| (scope, variable)))
    }
}

// Host call stack capture for the debug-info bridge. A BacktraceSource yields the frames of
// the code that is tracing a routine, outermost first, with every frame that belongs to
// Reactor itself, the standard library or the test harness filtered out. HostBacktrace
// reads std::backtrace and parses its textual form, which carries the demangled function
// path and the file:line:column of every resolved frame. ScriptedBacktrace replays stacks
// set by the caller, for deterministic tests and tools.

use regex::Regex;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::OnceLock;

/// One host frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    pub function: String,
    pub file: String,
    pub line: u32,
}

impl Frame {
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            function: function.into(),
            file: file.into(),
            line,
        }
    }

    /// Same function in the same file, at any line.
    pub fn same_function(&self, other: &Frame) -> bool {
        self.function == other.function && self.file == other.file
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.function, self.file, self.line)
    }
}

/// Supplies the current host call stack.
pub trait BacktraceSource {
    /// Frames of the tracing code, outermost first.
    fn capture(&mut self) -> Vec<Frame>;
}

/// Frames that belong to Reactor, the runtime or the harness.
const SKIPPED_PREFIXES: &[&str] = &[
    "reactor::",
    "<reactor::",
    "std::",
    "<std::",
    "core::",
    "<core::",
    "alloc::",
    "<alloc::",
    "test::",
    "<test::",
    "__rust",
    "rust_begin_unwind",
];

fn frame_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*\d+:\s+(.+?)\s*$").unwrap_or_else(|e| panic!("frame pattern: {e}")))
}

fn location_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*at\s+(.+):(\d+):\d+\s*$").unwrap_or_else(|e| panic!("location pattern: {e}"))
    })
}

fn hash_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"::h[0-9a-f]{16}$").unwrap_or_else(|e| panic!("hash pattern: {e}")))
}

fn is_skipped(function: &str, file: &str) -> bool {
    SKIPPED_PREFIXES.iter().any(|prefix| function.starts_with(prefix)) || file.starts_with("/rustc/")
}

/// Parse the `Display` form of a `std::backtrace::Backtrace`.
///
/// Returns the kept frames outermost first. Frames without a source location
/// are dropped.
pub fn parse_backtrace(text: &str) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut function: Option<String> = None;

    for line in text.lines() {
        if let Some(captures) = frame_pattern().captures(line) {
            function = Some(hash_suffix().replace(&captures[1], "").into_owned());
        } else if let Some(captures) = location_pattern().captures(line) {
            // Inlined frames share one location line; the first one wins.
            let Some(name) = function.take() else {
                continue;
            };
            let file = captures[1].to_string();
            let line = captures[2].parse().unwrap_or(0);
            if !is_skipped(&name, &file) {
                frames.push(Frame::new(name, file, line));
            }
        }
    }

    frames.reverse();
    frames
}

/// Captures the real host stack on every call.
#[derive(Debug, Default)]
pub struct HostBacktrace {
    captures: usize,
}

impl HostBacktrace {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BacktraceSource for HostBacktrace {
    fn capture(&mut self) -> Vec<Frame> {
        self.captures += 1;
        let frames = parse_backtrace(&Backtrace::force_capture().to_string());
        if frames.is_empty() && self.captures == 1 {
            log::warn!("host backtrace has no resolvable frames; debug info will be empty");
        }
        frames
    }
}

/// Replays the stack most recently set through its handle.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBacktrace {
    frames: Rc<RefCell<Vec<Frame>>>,
}

impl ScriptedBacktrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stack reported by every clone of this source.
    pub fn set(&self, frames: Vec<Frame>) {
        *self.frames.borrow_mut() = frames;
    }
}

impl BacktraceSource for ScriptedBacktrace {
    fn capture(&mut self) -> Vec<Frame> {
        self.frames.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "   0: std::backtrace::Backtrace::force_capture
             at /rustc/abc/library/std/src/backtrace.rs:312:9
   1: reactor::debug::backtrace::HostBacktrace::capture
             at ./src/debug/backtrace.rs:120:22
   2: shaders::blend::h0123456789abcdef
             at ./tests/shaders.rs:40:13
   3: shaders::main
             at ./tests/shaders.rs:12:5
   4: core::ops::function::FnOnce::call_once
             at /rustc/abc/library/core/src/ops/function.rs:250:5";

    #[test]
    fn test_parse_filters_and_orders() {
        let frames = parse_backtrace(SAMPLE);
        assert_eq!(
            frames,
            vec![
                Frame::new("shaders::main", "./tests/shaders.rs", 12),
                Frame::new("shaders::blend", "./tests/shaders.rs", 40),
            ]
        );
    }

    #[test]
    fn test_scripted_source_shares_stack() {
        let script = ScriptedBacktrace::new();
        let mut source = script.clone();
        script.set(vec![Frame::new("f", "a.rs", 3)]);
        assert_eq!(source.capture(), vec![Frame::new("f", "a.rs", 3)]);
    }
}

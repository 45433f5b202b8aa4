//! Test the debug-info bridge.
//!
//! Most tests drive the builder with a scripted host stack so scope and
//! variable bookkeeping is deterministic; one test runs the real host
//! backtrace against this very file.

#![cfg(feature = "debug-info")]

use reactor::debug::tokens::parse_tokens;
use reactor::debug::{
    parse_backtrace, BacktraceSource, DebugInfoBuilder, Frame, HostBacktrace, LineTokens, ScopeKind,
    ScriptedBacktrace, Token,
};
use reactor::{Config, Function, Int, OptimizationLevel};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const FILE: &str = "shader.rs";

fn main_at(line: u32) -> Frame {
    Frame::new("shader::main", FILE, line)
}

fn helper_at(line: u32) -> Frame {
    Frame::new("shader::helper", FILE, line)
}

fn shader_tokens() -> LineTokens {
    let mut tokens = LineTokens::new();
    tokens.insert(10, Token::Identifier("x".into()));
    tokens.insert(11, Token::Identifier("y".into()));
    tokens.insert(12, Token::Identifier("z".into()));
    tokens.insert(13, Token::Identifier("w".into()));
    tokens.insert(21, Token::Return);
    tokens
}

#[test]
fn test_scripted_scopes_and_variables() {
    init_logging();
    let script = ScriptedBacktrace::new();
    let f = Function::<unsafe extern "C" fn(i32) -> i32>::with_config(
        Config::default().with_optimization(OptimizationLevel::None),
    )
    .unwrap();
    f.install_debug_info(DebugInfoBuilder::new(Box::new(script.clone())).with_tokens(FILE, shader_tokens()));

    script.set(vec![main_at(10)]);
    let x = f.arg::<Int>(0).rvalue();
    script.set(vec![main_at(11)]);
    let y = x + 1;
    script.set(vec![main_at(12), helper_at(21)]);
    let z = y * 2;
    script.set(vec![main_at(13)]);
    let w = z - 3;
    // Back to line 12: a second iteration of the same source line.
    script.set(vec![main_at(12)]);
    let z2 = w + z;
    script.set(vec![main_at(14)]);
    f.ret(z2);
    let routine = f.finalize("scripted").unwrap();

    assert_eq!(unsafe { routine.function()(5) }, 21);

    let info = routine.debug_info().unwrap();
    let counters = info.counters();
    assert_eq!(counters.scopes_opened, 3);
    assert_eq!(counters.scopes_closed, counters.scopes_opened);
    assert_eq!(counters.loop_scopes, 1);
    assert_eq!(counters.variables_committed, 6);

    for name in ["x", "y", "w", "return_value"] {
        assert!(info.variable(name).is_some(), "variable {name}");
    }
    assert_eq!(info.variables().filter(|v| v.name == "z").count(), 2);
    assert!(info.variable("x").unwrap().promoted);
    assert_eq!(info.variable("return_value").unwrap().line, 21);

    let helper = info.scopes().iter().find(|s| s.name() == "jit!helper").unwrap();
    assert_eq!(helper.kind, ScopeKind::Function);
    assert_eq!(helper.depth, 1);
    let lexical: Vec<_> = info.scopes().iter().filter(|s| s.kind == ScopeKind::Lexical).collect();
    assert_eq!(lexical.len(), 1);
    assert_eq!(lexical[0].opened_at.line, 12);
    assert_eq!(lexical[0].variables.len(), 1);

    // The return nop sits one line below the return.
    assert!(info.locations().iter().any(|l| l.line == 22));
    assert!(!info.line_table().is_empty());
    assert!(info.line_table().iter().all(|entry| entry.file == FILE));
}

#[test]
fn test_same_line_keeps_last_definition() {
    init_logging();
    let script = ScriptedBacktrace::new();
    let f = Function::<unsafe extern "C" fn(i32) -> i32>::with_config(Config::default()).unwrap();
    f.install_debug_info(DebugInfoBuilder::new(Box::new(script.clone())).with_tokens(FILE, shader_tokens()));

    script.set(vec![main_at(11)]);
    let x = f.arg::<Int>(0).rvalue();
    let y = (x + 1) * (x - 1);
    script.set(vec![main_at(14)]);
    f.ret(y);
    let routine = f.finalize("same_line").unwrap();

    assert_eq!(unsafe { routine.function()(4) }, 15);
    let info = routine.debug_info().unwrap();
    assert_eq!(info.variables().count(), 1);
    assert!(info.counters().variables_superseded >= 3);
}

#[test]
fn test_no_debug_info_without_builder() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(i32) -> i32>::with_config(Config::default().with_debug_info(false)).unwrap();
    let x = f.arg::<Int>(0).rvalue();
    f.ret(x);
    let routine = f.finalize("plain").unwrap();
    assert!(routine.debug_info().is_none());
}

#[test]
fn test_host_backtrace_sees_caller() {
    init_logging();
    let frames = HostBacktrace::new().capture();
    assert!(frames.iter().all(|frame| !frame.function.starts_with("reactor::")));
    assert!(
        frames.iter().any(|frame| frame.function.contains("test_host_backtrace_sees_caller")),
        "{frames:?}"
    );
}

#[test]
fn test_tokens_from_source() {
    let source = "fn shade(f: &Function) {\n    let color = f.arg::<Float>(0).rvalue();\n    let mut acc: Float = color;\n    f.ret(acc);\n    let _ = 1;\n}\n";
    let tokens = parse_tokens(source);
    assert_eq!(tokens.get(&2), Some(&Token::Identifier("color".into())));
    assert_eq!(tokens.get(&3), Some(&Token::Identifier("acc".into())));
    assert_eq!(tokens.get(&4), Some(&Token::Return));
    assert_eq!(tokens.get(&5), None);
    assert_eq!(tokens.len(), 3);
}

#[test]
fn test_parse_backtrace_strips_hashes() {
    let text = "   0: app::render::h00112233aabbccdd\n             at src/render.rs:7:3\n   1: app::main\n             at src/main.rs:2:1\n";
    assert_eq!(
        parse_backtrace(text),
        vec![Frame::new("app::main", "src/main.rs", 2), Frame::new("app::render", "src/render.rs", 7)]
    );
}

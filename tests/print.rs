//! Test run-time printing from generated routines.
//!
//! Output is collected with `print::capture`, which redirects everything the
//! routines print on the calling thread.

#![cfg(feature = "print")]

use reactor::print::{capture, printv};
use reactor::{rr_log, rr_watch, Byte, Config, Float, Float4, Function, Half, Int, Int4, Pointer, Short, UInt};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_scalars() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(i32, u32, f32)>::with_config(Config::default()).unwrap();
    let i = f.arg::<Int>(0).rvalue();
    let u = f.arg::<UInt>(1).rvalue();
    let x = f.arg::<Float>(2).rvalue();
    printv(&f, "i={0} u={1} x={2} short={3} byte={4}\n", &[&i, &u, &x, &i.cast::<Short>(), &u.cast::<Byte>()]);
    f.ret_void();
    let routine = f.finalize("scalars").unwrap();

    let ((), out) = capture(|| unsafe { routine.function()(-42, 3_000_000_000, 0.25) });
    assert_eq!(out, "i=-42 u=3000000000 x=0.250000 short=-42 byte=0\n");
}

#[test]
fn test_vectors_and_literals() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*const i32, *const f32)>::with_config(Config::default()).unwrap();
    let v = f.arg::<Pointer<Int4>>(0).rvalue().load();
    let w = f.arg::<Pointer<Float4>>(1).rvalue().load();
    printv(&f, "{} {} {} {{literal}} 100%\n", &[&v, &w, &7i32]);
    f.ret_void();
    let routine = f.finalize("vectors").unwrap();

    let ints = [1, -2, 3, -4];
    let floats = [0.5f32, 1.0, -1.5, 2.25];
    let ((), out) = capture(|| unsafe { routine.function()(ints.as_ptr(), floats.as_ptr()) });
    assert_eq!(
        out,
        "[1, -2, 3, -4] [0.500000, 1.000000, -1.500000, 2.250000] 7 {literal} 100%\n"
    );
}

#[test]
fn test_half_prints_as_float() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(f32)>::with_config(Config::default()).unwrap();
    let h: reactor::RValue<'_, Half> = f.arg::<Float>(0).rvalue().to_half();
    printv(&f, "{0}\n", &[&h]);
    f.ret_void();
    let routine = f.finalize("half").unwrap();

    let ((), out) = capture(|| unsafe { routine.function()(1.5) });
    assert_eq!(out, "1.500000\n");
}

#[test]
fn test_log_and_watch() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(i32)>::with_config(Config::default()).unwrap();
    let count = f.arg::<Int>(0).rvalue();
    let line = line!() + 1;
    rr_log!(&f, "count is {0}", count);
    rr_watch!(&f, count, count * 2);
    f.ret_void();
    let routine = f.finalize("log").unwrap();

    let ((), out) = capture(|| unsafe { routine.function()(21) });
    let expected = format!("{}:{} print: count is 21\ncount: 21, count * 2: 42\n", file!(), line);
    assert_eq!(out, expected);
}

#[test]
fn test_prints_inside_loop() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(i32)>::with_config(Config::default()).unwrap();
    let n = f.arg::<Int>(0).rvalue();
    let i = f.var::<Int>();
    f.for_loop(
        || i.store(0),
        || i.load().lt(n),
        || i.update(|i| i + 1),
        || printv(&f, "{0};", &[&i]),
    );
    f.ret_void();
    let routine = f.finalize("loop").unwrap();

    let ((), out) = capture(|| unsafe { routine.function()(4) });
    assert_eq!(out, "0;1;2;3;");
}

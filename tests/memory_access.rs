//! Test plain and volatile memory access under the optimizing pipeline.
//!
//! Volatile loads must reach memory every time they are traced, even when
//! the optimizer could prove nothing in between wrote to the address.

use reactor::{Config, Float, Function, Int, OptimizationLevel, Pointer, Type};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn speed() -> Config {
    Config::default().with_optimization(OptimizationLevel::Speed)
}

extern "C" fn bump(cell: *mut i32) {
    unsafe { *cell += 1 };
}

#[test]
fn test_volatile_loads_see_host_store() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut i32, *mut i32)>::with_config(speed()).unwrap();
    let cell = f.arg::<Pointer<Int>>(0).rvalue();
    let out = f.arg::<Pointer<Int>>(1).rvalue();
    let before = cell.deref().load_volatile();
    let helper: extern "C" fn(*mut i32) = bump;
    unsafe { f.call_host(helper as usize, &[Type::PTR], None, &[cell.value()]) };
    let after = cell.deref().load_volatile();
    out.element(0).store(before);
    out.element(1).store(after);
    f.ret_void();
    let routine = f.finalize("volatile_callback").unwrap();

    let mut cell = 41i32;
    let mut out = [0i32; 2];
    unsafe { routine.function()(&mut cell, out.as_mut_ptr()) };
    assert_eq!(out, [41, 42]);
    assert_eq!(cell, 42);
}

#[test]
fn test_volatile_load_after_store_reads_memory() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut f32, f32) -> f32>::with_config(speed()).unwrap();
    let cell = f.arg::<Pointer<Float>>(0).rvalue();
    let x = f.arg::<Float>(1).rvalue();
    cell.store(x);
    let first = cell.deref().load_volatile();
    let second = cell.deref().load_volatile();
    f.ret(first + second);
    let routine = f.finalize("volatile_float").unwrap();

    let mut cell = 0f32;
    assert_eq!(unsafe { routine.function()(&mut cell, 1.25) }, 2.5);
    assert_eq!(cell, 1.25);
}

#[test]
fn test_misaligned_scalar_access() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut u8, i32) -> i32>::with_config(speed()).unwrap();
    let bytes = f.arg::<Pointer<Int>>(0).rvalue();
    let x = f.arg::<Int>(1).rvalue();
    let odd = (bytes + 1).deref_aligned(1);
    odd.store(x);
    f.ret(odd.load_volatile() + odd.load());
    let routine = f.finalize("misaligned").unwrap();

    let mut bytes = [0u8; 8];
    assert_eq!(unsafe { routine.function()(bytes.as_mut_ptr(), 0x0102_0304) }, 0x0204_0608);
    assert_eq!(&bytes[1..5], &0x0102_0304i32.to_ne_bytes());
}

/// Non-stack memory operands in the disassembly of `fn(*const i32) -> i32`.
#[cfg(target_arch = "x86_64")]
fn memory_reads(volatile: bool) -> usize {
    let f = Function::<unsafe extern "C" fn(*const i32) -> i32>::with_config(speed()).unwrap();
    let cell = f.arg::<Pointer<Int>>(0).rvalue().deref();
    let (a, b) = if volatile {
        (cell.load_volatile(), cell.load_volatile())
    } else {
        (cell.load(), cell.load())
    };
    f.ret(a + b);
    let routine = f.finalize("two_loads").unwrap();

    let cell = 21i32;
    assert_eq!(unsafe { routine.function()(&cell) }, 42);
    let instructions = routine.disassemble().unwrap();
    instructions
        .iter()
        .filter(|i| i.text.contains('[') && !i.text.contains("rsp") && !i.text.contains("rbp"))
        .count()
}

#[cfg(target_arch = "x86_64")]
#[test]
fn test_volatile_loads_are_not_merged() {
    init_logging();
    assert_eq!(memory_reads(true), 2);
    assert!(memory_reads(false) >= 1);
}

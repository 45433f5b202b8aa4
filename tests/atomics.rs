//! Test atomic read-modify-write, compare-exchange, fences and masked access.
//!
//! The counter routines are called from several host threads at once; the
//! final count only adds up if the backend really emitted atomic updates.

use reactor::{Config, Function, Int, Int4, MemoryOrder, Pointer, UInt};
use std::thread;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const THREADS: usize = 4;
const ITERATIONS: i32 = 2000;

#[test]
fn test_atomic_add_from_threads() {
    init_logging();
    for order in MemoryOrder::ALL {
        let f = Function::<unsafe extern "C" fn(*mut i32, i32)>::with_config(Config::default()).unwrap();
        let counter = f.arg::<Pointer<Int>>(0).rvalue();
        let n = f.arg::<Int>(1).rvalue();
        let i = f.var::<Int>();
        f.for_loop(
            || i.store(0),
            || i.load().lt(n),
            || i.update(|i| i + 1),
            || {
                counter.atomic_add(1, order);
            },
        );
        f.fence(order);
        f.ret_void();
        let routine = f.finalize("counter").unwrap();

        let mut count = 0i32;
        let shared = &mut count as *mut i32 as usize;
        let function = routine.function();
        thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(move || unsafe { function(shared as *mut i32, ITERATIONS) });
            }
        });
        assert_eq!(count, THREADS as i32 * ITERATIONS, "{order:?}");
    }
}

#[test]
fn test_rmw_returns_previous_value() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut i32, *mut i32)>::with_config(Config::default()).unwrap();
    let cell = f.arg::<Pointer<Int>>(0).rvalue();
    let out = f.arg::<Pointer<Int>>(1).rvalue();
    let order = MemoryOrder::SequentiallyConsistent;
    out.element(0).store(cell.atomic_add(5, order));
    out.element(1).store(cell.atomic_sub(2, order));
    out.element(2).store(cell.atomic_or(0x10, order));
    out.element(3).store(cell.atomic_and(0x1c, order));
    out.element(4).store(cell.atomic_xor(0xff, order));
    out.element(5).store(cell.atomic_exchange(-7, order));
    f.ret_void();
    let routine = f.finalize("rmw").unwrap();

    let mut cell = 10i32;
    let mut out = [0i32; 6];
    unsafe { routine.function()(&mut cell, out.as_mut_ptr()) };
    assert_eq!(out, [10, 15, 13, 0x1d, 0x1c, 0xe3]);
    assert_eq!(cell, -7);
}

#[test]
fn test_min_max_follow_signedness() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut i32, *mut u32)>::with_config(Config::default()).unwrap();
    let signed = f.arg::<Pointer<Int>>(0).rvalue();
    let unsigned = f.arg::<Pointer<UInt>>(1).rvalue();
    let order = MemoryOrder::Relaxed;
    signed.element(0).address().atomic_min(-1, order);
    signed.element(1).address().atomic_max(-1, order);
    unsigned.element(0).address().atomic_min(u32::MAX, order);
    unsigned.element(1).address().atomic_max(u32::MAX, order);
    f.ret_void();
    let routine = f.finalize("min_max").unwrap();

    let mut signed = [3i32, 3];
    let mut unsigned = [3u32, 3];
    unsafe { routine.function()(signed.as_mut_ptr(), unsigned.as_mut_ptr()) };
    assert_eq!(signed, [-1, 3]);
    assert_eq!(unsigned, [3, u32::MAX]);
}

#[test]
fn test_compare_exchange() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut i32, i32, i32) -> i32>::with_config(Config::default()).unwrap();
    let cell = f.arg::<Pointer<Int>>(0).rvalue();
    let expected = f.arg::<Int>(1).rvalue();
    let desired = f.arg::<Int>(2).rvalue();
    f.ret(cell.compare_exchange(desired, expected, MemoryOrder::AcquireRelease, MemoryOrder::Acquire));
    let routine = f.finalize("cmpxchg").unwrap();

    let mut cell = 4i32;
    unsafe {
        assert_eq!(routine.function()(&mut cell, 3, 9), 4);
        assert_eq!(cell, 4, "mismatch leaves the cell alone");
        assert_eq!(routine.function()(&mut cell, 4, 9), 4);
        assert_eq!(cell, 9);
    }
}

#[test]
fn test_masked_load_and_store() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut i32, *mut i32, *const i32, *const i32)>::with_config(Config::default())
        .unwrap();
    let loaded = f.arg::<Pointer<Int4>>(0).rvalue();
    let target = f.arg::<Pointer<Int4>>(1).rvalue();
    let source = f.arg::<Pointer<Int4>>(2).rvalue();
    let mask = f.arg::<Pointer<Int4>>(3).rvalue().load();
    loaded.store(source.masked_load(mask, 4, true));
    target.masked_store(source.load() * 10, mask, 4);
    f.ret_void();
    let routine = f.finalize("masked").unwrap();

    let source = [1, 2, 3, 4];
    let mask = [-1, 0, -1, 0];
    let mut loaded = [99i32; 4];
    let mut target = [-5i32; 4];
    unsafe { routine.function()(loaded.as_mut_ptr(), target.as_mut_ptr(), source.as_ptr(), mask.as_ptr()) };
    assert_eq!(loaded, [1, 0, 3, 0]);
    assert_eq!(target, [10, -5, 30, -5]);
}

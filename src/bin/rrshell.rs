//! Reactor sample shell.
//!
//! Traces one of a few sample routines, runs it on fixed inputs and
//! optionally shows statistics, disassembly or writes an ELF object.
//!
//! Usage: `rrshell <sample> [--stats] [--disasm] [--object FILE]`

use clap::{Parser, ValueEnum};
use reactor::{
    Config, Float, Function, Half, Int, Int4, OptimizationLevel, Pointer, ReactorResult, Routine,
};
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Sample {
    /// Lane-wise sum of two Int4 vectors
    VectorAdd,
    /// Absolute value through if/else
    Abs,
    /// Sum of 0..n through a for loop
    Sum,
    /// Float to half and back
    Half,
    /// Run-time printing of traced values
    Print,
}

#[derive(Parser, Debug)]
#[command(name = "rrshell")]
#[command(about = "Trace, compile and run Reactor sample routines")]
struct Args {
    /// Routine to build
    #[arg(value_enum)]
    sample: Sample,

    /// Backend optimization level (none, speed, speed_and_size)
    #[arg(long = "opt-level", default_value = "speed")]
    opt_level: OptimizationLevel,

    /// Allocate variable storage at declaration
    #[arg(long)]
    eager: bool,

    /// Record debug scopes while tracing
    #[arg(long = "debug-info")]
    debug_info: bool,

    /// Print trace statistics
    #[arg(long)]
    stats: bool,

    /// Print the routine's disassembly
    #[arg(long)]
    disasm: bool,

    /// Write the routine as an ELF object
    #[arg(long = "object")]
    object: Option<PathBuf>,
}

fn vector_add(config: Config) -> ReactorResult<Arc<Routine>> {
    let f = Function::<unsafe extern "C" fn(*mut i32, *const i32, *const i32)>::with_config(config)?;
    let out = f.arg::<Pointer<Int4>>(0).rvalue();
    let a = f.arg::<Pointer<Int4>>(1).rvalue().load();
    let b = f.arg::<Pointer<Int4>>(2).rvalue().load();
    out.store(a + b);
    f.ret_void();

    let routine = f.finalize("vector_add")?;
    let lhs = [1, 2, 3, 4];
    let rhs = [10, 20, 30, 40];
    let mut sum = [0i32; 4];
    unsafe { routine.function()(sum.as_mut_ptr(), lhs.as_ptr(), rhs.as_ptr()) };
    println!("{:?} + {:?} = {:?}", lhs, rhs, sum);
    Ok(Arc::clone(routine.routine()))
}

fn abs(config: Config) -> ReactorResult<Arc<Routine>> {
    let f = Function::<unsafe extern "C" fn(i32) -> i32>::with_config(config)?;
    let x = f.arg::<Int>(0).rvalue();
    let result = f.var::<Int>();
    f.if_then(x.lt(0), || result.store(-x))
        .otherwise(|| result.store(x));
    f.ret(&result);

    let routine = f.finalize("abs")?;
    for input in [-5, 7, 0] {
        println!("abs({}) = {}", input, unsafe { routine.function()(input) });
    }
    Ok(Arc::clone(routine.routine()))
}

fn sum(config: Config) -> ReactorResult<Arc<Routine>> {
    let f = Function::<unsafe extern "C" fn(i32) -> i32>::with_config(config)?;
    let n = f.arg::<Int>(0).rvalue();
    let total = f.var_init::<Int>(0);
    let i = f.var::<Int>();
    f.for_loop(
        || i.store(0),
        || i.load().lt(n),
        || i.update(|i| i + 1),
        || total.update(|t| t + i.load()),
    );
    f.ret(&total);

    let routine = f.finalize("sum")?;
    for input in [0, 1, 10] {
        println!("sum(0..{}) = {}", input, unsafe { routine.function()(input) });
    }
    Ok(Arc::clone(routine.routine()))
}

fn half(config: Config) -> ReactorResult<Arc<Routine>> {
    let f = Function::<unsafe extern "C" fn(f32) -> f32>::with_config(config)?;
    let x = f.arg::<Float>(0).rvalue();
    let h: reactor::RValue<'_, Half> = x.to_half();
    f.ret(h.to_float());

    let routine = f.finalize("half_round_trip")?;
    for input in [1.0f32, 0.1, 65504.0, 1.0e-7] {
        println!("half({}) = {}", input, unsafe { routine.function()(input) });
    }
    Ok(Arc::clone(routine.routine()))
}

#[cfg(feature = "print")]
fn print(config: Config) -> ReactorResult<Arc<Routine>> {
    let f = Function::<unsafe extern "C" fn(i32, f32)>::with_config(config)?;
    let i = f.arg::<Int>(0).rvalue();
    let x = f.arg::<Float>(1).rvalue();
    let v = f.splat::<Int4>(i) + f.constant::<Int4>([0, 1, 2, 3]);
    reactor::rr_log!(&f, "i = {0}, x * 2 = {1}, v = {2}", i, x * 2.0, v);
    reactor::rr_watch!(&f, i, x);
    f.ret_void();

    let routine = f.finalize("print")?;
    unsafe { routine.function()(7, 1.5) };
    Ok(Arc::clone(routine.routine()))
}

#[cfg(not(feature = "print"))]
fn print(_config: Config) -> ReactorResult<Arc<Routine>> {
    eprintln!("rrshell was built without the print feature");
    process::exit(2);
}

fn main() {
    env_logger::init();

    let args = Args::parse();
    let config = Config::from_env()
        .with_optimization(args.opt_level)
        .with_materialize_on_definition(args.eager)
        .with_debug_info(args.debug_info);

    let built = match args.sample {
        Sample::VectorAdd => vector_add(config),
        Sample::Abs => abs(config),
        Sample::Sum => sum(config),
        Sample::Half => half(config),
        Sample::Print => print(config),
    };
    let routine = match built {
        Ok(routine) => routine,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if args.stats {
        print!("{}", routine.stats());
        #[cfg(feature = "debug-info")]
        if let Some(info) = routine.debug_info() {
            print!("{}", info.counters());
        }
    }

    if args.disasm {
        match routine.listing() {
            Ok(listing) => print!("{}", listing),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    if let Some(path) = args.object {
        let written = routine.to_object().and_then(|bytes| {
            fs::write(&path, bytes).map_err(|e| reactor::ReactorError::ObjectEmission { reason: e.to_string() })
        });
        match written {
            Ok(()) => println!("Wrote {}", path.display()),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    }
}

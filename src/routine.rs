// This module is the typed front end around a session and the home of finished routines.
// Function<F> is parameterized by the host function pointer type the routine will be
// called through; the HostFunction mapping turns that signature into the parameter and
// return Types declared to the backend, so argument access and returns are checked against
// the real calling signature. A Function derefs to its Session, so tracing code uses the
// whole vocabulary directly on it. Finalizing yields a Routine: the executable code, the
// constant data it addresses, the statistics of the trace that produced it and, with the
// debug-info feature, the recorded scope tree. A Routine is immutable once built and may
// be shared and called from any number of threads.

//! Typed functions and finalized routines.

use crate::core::{Backend, CompiledCode, Config, ReactorResult, Session, SessionStats, Type};
use crate::cranelift::CraneliftBackend;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

/// Host types that can cross the routine ABI.
pub trait HostType: Copy + 'static {
    const TYPE: Type;
}

macro_rules! host_types {
    ($($host:ty => $ty:expr),* $(,)?) => {
        $(impl HostType for $host {
            const TYPE: Type = $ty;
        })*
    };
}

host_types! {
    bool => Type::BOOL,
    i8 => Type::I8,
    u8 => Type::U8,
    i16 => Type::I16,
    u16 => Type::U16,
    i32 => Type::I32,
    u32 => Type::U32,
    i64 => Type::I64,
    u64 => Type::U64,
    f32 => Type::F32,
}

impl<T: 'static> HostType for *const T {
    const TYPE: Type = Type::PTR;
}

impl<T: 'static> HostType for *mut T {
    const TYPE: Type = Type::PTR;
}

/// Return types of routines: a host type or `()`.
pub trait HostReturn {
    const TYPE: Option<Type>;
}

impl HostReturn for () {
    const TYPE: Option<Type> = None;
}

impl<T: HostType> HostReturn for T {
    const TYPE: Option<Type> = Some(<T as HostType>::TYPE);
}

/// A C-ABI function pointer type a routine can be called through.
///
/// # Safety
///
/// `params` and `ret` must describe the pointer type exactly, and
/// `from_entry` must reinterpret a code address as that pointer.
pub unsafe trait HostFunction: Copy + 'static {
    fn params() -> Vec<Type>;
    fn ret() -> Option<Type>;

    /// # Safety
    ///
    /// `entry` must point at code with this signature.
    unsafe fn from_entry(entry: *const u8) -> Self;
}

macro_rules! host_function {
    ($($arg:ident),*) => {
        unsafe impl<R: HostReturn + 'static, $($arg: HostType),*> HostFunction for unsafe extern "C" fn($($arg),*) -> R {
            fn params() -> Vec<Type> {
                vec![$(<$arg as HostType>::TYPE),*]
            }

            fn ret() -> Option<Type> {
                <R as HostReturn>::TYPE
            }

            unsafe fn from_entry(entry: *const u8) -> Self {
                std::mem::transmute_copy::<*const u8, Self>(&entry)
            }
        }
    };
}

host_function!();
host_function!(A);
host_function!(A, B);
host_function!(A, B, C);
host_function!(A, B, C, D);
host_function!(A, B, C, D, E);
host_function!(A, B, C, D, E, G);

/// A routine under construction, callable as `F` once finalized.
pub struct Function<F: HostFunction> {
    session: Session,
    _signature: PhantomData<F>,
}

impl<F: HostFunction> Function<F> {
    /// Trace with the Cranelift backend and [`Config::from_env`].
    pub fn new() -> ReactorResult<Self> {
        Self::with_config(Config::from_env())
    }

    pub fn with_config(config: Config) -> ReactorResult<Self> {
        let backend = CraneliftBackend::boxed(&config)?;
        Ok(Self::with_backend(backend, config))
    }

    pub fn with_backend(backend: Box<dyn Backend>, config: Config) -> Self {
        let session = Session::new(backend, config);
        session.begin_function(&F::params(), F::ret());
        Self {
            session,
            _signature: PhantomData,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Compile the traced function.
    pub fn finalize(&self, name: &str) -> ReactorResult<RoutineT<F>> {
        let routine = self.session.finalize(name)?;
        Ok(RoutineT {
            routine: Arc::new(routine),
            _signature: PhantomData,
        })
    }
}

impl<F: HostFunction> Deref for Function<F> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

/// Executable code produced by finalizing a session.
pub struct Routine {
    name: String,
    code: CompiledCode,
    /// Blobs the code addresses directly.
    _constants: Vec<Box<[u8]>>,
    stats: SessionStats,
    #[cfg(feature = "debug-info")]
    debug_info: Option<crate::debug::DebugInfo>,
}

// SAFETY: the code and constant data are never written after finalization,
// and the executable mapping is only touched again when the routine drops.
unsafe impl Send for Routine {}
unsafe impl Sync for Routine {}

impl Routine {
    pub(crate) fn new(name: &str, code: CompiledCode, constants: Vec<Box<[u8]>>, stats: SessionStats) -> Self {
        Self {
            name: name.to_string(),
            code,
            _constants: constants,
            stats,
            #[cfg(feature = "debug-info")]
            debug_info: None,
        }
    }

    #[cfg(feature = "debug-info")]
    pub(crate) fn with_debug_info(mut self, mut debug_info: Option<crate::debug::DebugInfo>) -> Self {
        if let Some(info) = debug_info.as_mut() {
            info.attach_line_table(&self.code.line_table);
        }
        self.debug_info = debug_info;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address of the first instruction.
    pub fn entry(&self) -> *const u8 {
        self.code.entry
    }

    /// Copy of the machine code.
    pub fn code(&self) -> &[u8] {
        &self.code.bytes
    }

    pub fn line_table(&self) -> &[crate::core::CodeRange] {
        &self.code.line_table
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    #[cfg(feature = "debug-info")]
    pub fn debug_info(&self) -> Option<&crate::debug::DebugInfo> {
        self.debug_info.as_ref()
    }
}

impl fmt::Debug for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Routine")
            .field("name", &self.name)
            .field("entry", &self.code.entry)
            .field("size", &self.code.bytes.len())
            .finish()
    }
}

/// A routine together with its calling signature.
pub struct RoutineT<F> {
    routine: Arc<Routine>,
    _signature: PhantomData<F>,
}

impl<F: HostFunction> RoutineT<F> {
    /// The entry point as a callable function pointer.
    ///
    /// The pointer is valid while this routine (or a clone) is alive.
    pub fn function(&self) -> F {
        // SAFETY: the code was generated for the signature F describes.
        unsafe { F::from_entry(self.routine.entry()) }
    }

    pub fn routine(&self) -> &Arc<Routine> {
        &self.routine
    }
}

impl<F> Clone for RoutineT<F> {
    fn clone(&self) -> Self {
        Self {
            routine: Arc::clone(&self.routine),
            _signature: PhantomData,
        }
    }
}

impl<F> Deref for RoutineT<F> {
    type Target = Routine;

    fn deref(&self) -> &Routine {
        &self.routine
    }
}

// SAFETY: F is a plain function pointer type; sharing it only shares the Arc'd routine.
unsafe impl<F> Send for RoutineT<F> {}
unsafe impl<F> Sync for RoutineT<F> {}

// Type erasure for printing. A PrintValue turns any printable traced thing into a format
// fragment plus the argument slots it consumes: scalars become one slot, vectors and arrays
// become a bracketed list with one slot per element. Signed integers are sign-extended to
// 64 bits and unsigned ones zero-extended, so the runtime can read every integer slot as a
// full word; floats keep their 32-bit pattern in the low half; half-precision values are
// converted to float by a host call so printing never splits the current block.

use crate::core::{MemoryAccess, ScalarKind, Session, Type, Value};
use crate::expr::{Argument, Array, IntoRValue, RValue, ReactorType, Reference, Variable};

/// Format fragment and the slot values it reads.
#[derive(Debug, Clone, Default)]
pub struct PrintArgs {
    pub format: String,
    pub values: Vec<Value>,
}

impl PrintArgs {
    fn scalar(format: &str, value: Value) -> Self {
        Self {
            format: format.to_string(),
            values: vec![value],
        }
    }

    /// `[a, b, ...]` from the given element fragments.
    fn list(items: impl IntoIterator<Item = PrintArgs>) -> Self {
        let mut format = String::from("[");
        let mut values = Vec::new();
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                format.push_str(", ");
            }
            format.push_str(&item.format);
            values.extend(item.values);
        }
        format.push(']');
        Self { format, values }
    }
}

/// A traced value that can be printed from generated code.
pub trait PrintValue<'s> {
    fn print_args(&self, session: &'s Session) -> PrintArgs;
}

/// Lower `value` of type `ty` to print slots.
pub(crate) fn lower(session: &Session, value: Value, ty: Type) -> PrintArgs {
    if ty.is_vector() {
        let element = ty.element();
        return PrintArgs::list((0..ty.lanes()).map(|lane| {
            let scalar = session.instr("extractelement", &[value], |b| b.create_extract_element(value, element, lane));
            lower(session, scalar, element)
        }));
    }

    match ty.kind() {
        ScalarKind::F32 => PrintArgs::scalar("%f", value),
        ScalarKind::F16 => {
            let helper: extern "C" fn(u16) -> f32 = super::runtime::reactor_half_to_float;
            // SAFETY: the helper takes the half bits and returns an f32, as declared.
            let float = unsafe { session.call_host(helper as usize, &[Type::F16], Some(Type::F32), &[value]) };
            match float {
                Some(float) => PrintArgs::scalar("%f", float),
                None => panic!("host call for half conversion produced no value"),
            }
        }
        ScalarKind::Ptr => PrintArgs::scalar("%p", value),
        ScalarKind::I64 | ScalarKind::U64 => {
            PrintArgs::scalar(if ty.is_signed() { "%d" } else { "%u" }, value)
        }
        _ if ty.is_signed() => {
            let wide = session.instr("sext", &[value], |b| b.create_sext(value, Type::I64));
            PrintArgs::scalar("%d", wide)
        }
        _ => {
            let wide = session.instr("zext", &[value], |b| b.create_zext(value, Type::U64));
            PrintArgs::scalar("%u", wide)
        }
    }
}

impl<'s, T: ReactorType> PrintValue<'s> for RValue<'s, T> {
    fn print_args(&self, session: &'s Session) -> PrintArgs {
        lower(session, self.value(), T::TYPE)
    }
}

impl<'s, T: ReactorType> PrintValue<'s> for Variable<'s, T> {
    fn print_args(&self, session: &'s Session) -> PrintArgs {
        self.load().print_args(session)
    }
}

impl<'s, T: ReactorType> PrintValue<'s> for Reference<'s, T> {
    fn print_args(&self, session: &'s Session) -> PrintArgs {
        self.load().print_args(session)
    }
}

impl<'s, T: ReactorType> PrintValue<'s> for Argument<'s, T> {
    fn print_args(&self, session: &'s Session) -> PrintArgs {
        self.rvalue().print_args(session)
    }
}

impl<'s, T: ReactorType> PrintValue<'s> for Array<'s, T> {
    fn print_args(&self, session: &'s Session) -> PrintArgs {
        PrintArgs::list((0..self.len()).map(|i| self.element(i).load().print_args(session)))
    }
}

/// Host literals print through their traced constant.
macro_rules! print_literal {
    ($($host:ty => $kind:ty),* $(,)?) => {
        $(impl<'s> PrintValue<'s> for $host {
            fn print_args(&self, session: &'s Session) -> PrintArgs {
                <$host as IntoRValue<'s, $kind>>::into_rvalue(*self, session).print_args(session)
            }
        })*
    };
}

print_literal! {
    bool => crate::expr::Bool,
    i32 => crate::expr::Int,
    u32 => crate::expr::UInt,
    i64 => crate::expr::Long,
    u64 => crate::expr::ULong,
    f32 => crate::expr::Float,
}

/// Fill a stack buffer with `values` and return its address, or null when empty.
pub(crate) fn spill_slots(session: &Session, values: &[Value]) -> Value {
    if values.is_empty() {
        return session.free_value(|b| b.create_constant_pointer(0));
    }
    let buffer = session.allocate_stack(Type::U64, values.len());
    for (i, &value) in values.iter().enumerate() {
        let index = session.free_value(|b| b.create_constant_int(Type::I32, i as i64));
        let slot = session.instr("gep", &[buffer, index], |b| b.create_gep(buffer, Type::U64, index, true));
        let ty = session.with_backend(|b| b.value_type(value));
        session.instr_void("store", &[value, slot], |b| b.create_store(value, slot, ty, MemoryAccess::default()));
    }
    buffer
}

// This module declares the kind markers of the expression layer. Each marker is an uninhabited
// enum that only exists at the type level: it names the backend Type, the host literal type it
// can be built from, and the capability traits (Arithmetic, Integer, Comparable, VectorKind,
// FloatKind) that the generic operator implementations key on. Scalars cover bool,
// 8/16/32/64-bit signed and unsigned integers, half-precision storage and 32-bit float;
// vectors are the 128-bit packs of 2, 4, 8 and 16 lanes and the 64-bit packs of 2, 4 and 8
// lanes (Byte8, Short4, Int2, Float2 and their unsigned twins). Float literals must be finite;
// infinity has its own constructor because a traced division by zero is not a reliable way to
// spell it.

//! Kind markers and literals.

use super::{IntoRValue, Literal, RValue, ReactorType};
use crate::core::{Session, Type, Value};

/// Kinds supporting `+ - * / %` and negation.
pub trait Arithmetic: ReactorType {}

/// Integer kinds supporting bitwise operators and shifts.
pub trait Integer: ReactorType {}

/// Kinds with ordered comparisons; `Output` is `Bool` or a lane mask.
pub trait Comparable: ReactorType {
    type Output: ReactorType;
}

/// Floating-point kinds.
pub trait FloatKind: ReactorType {}

/// 64-bit and 128-bit vector kinds.
pub trait VectorKind: ReactorType {
    type Element: ReactorType;
    /// Integer vector with the same lane shape, used for masks.
    type Mask: ReactorType;
    const LANES: u32;
}

macro_rules! scalar_kind {
    ($(#[$meta:meta])* $name:ident, $ty:expr, $host:ty, |$session:ident, $value:ident| $make:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub enum $name {}

        impl ReactorType for $name {
            const TYPE: Type = $ty;
        }

        impl Literal for $name {
            type Host = $host;

            fn constant($session: &Session, $value: $host) -> Value {
                $make
            }
        }

        impl<'s> IntoRValue<'s, $name> for $host {
            fn into_rvalue(self, session: &'s Session) -> RValue<'s, $name> {
                session.constant::<$name>(self)
            }
        }
    };
}

macro_rules! int_scalar {
    ($(#[$meta:meta])* $name:ident, $ty:expr, $host:ty) => {
        scalar_kind!($(#[$meta])* $name, $ty, $host, |session, value| {
            session.free_value(|backend| backend.create_constant_int($ty, value as i64))
        });

        impl Arithmetic for $name {}
        impl Integer for $name {}
        impl Comparable for $name {
            type Output = Bool;
        }
    };
}

scalar_kind!(
    /// Boolean, stored as a byte holding 0 or 1.
    Bool, Type::BOOL, bool, |session, value| {
        session.free_value(|backend| backend.create_constant_int(Type::BOOL, value as i64))
    }
);
impl Integer for Bool {}
impl Comparable for Bool {
    type Output = Bool;
}

int_scalar!(Byte, Type::U8, u8);
int_scalar!(SByte, Type::I8, i8);
int_scalar!(Short, Type::I16, i16);
int_scalar!(UShort, Type::U16, u16);
int_scalar!(Int, Type::I32, i32);
int_scalar!(UInt, Type::U32, u32);
int_scalar!(Long, Type::I64, i64);
int_scalar!(ULong, Type::U64, u64);

scalar_kind!(
    /// Single-precision float.
    Float, Type::F32, f32, |session, value| {
        assert!(value.is_finite(), "float literals must be finite, got {value}");
        session.free_value(|backend| backend.create_constant_float(Type::F32, value))
    }
);
impl Arithmetic for Float {}
impl FloatKind for Float {}
impl Comparable for Float {
    type Output = Bool;
}

scalar_kind!(
    /// Half-precision storage; convert to `Float` for arithmetic.
    Half, Type::F16, f32, |session, value| {
        assert!(value.is_finite(), "half literals must be finite, got {value}");
        let bits = super::cast::f32_to_half_bits(value);
        session.free_value(|backend| backend.create_constant_int(Type::F16, bits as i64))
    }
);

macro_rules! int_vector {
    ($(#[$meta:meta])* $name:ident, $ty:expr, $elem:ident, $host:ty, $lanes:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub enum $name {}

        impl ReactorType for $name {
            const TYPE: Type = $ty;
        }

        impl Literal for $name {
            type Host = [$host; $lanes];

            fn constant(session: &Session, value: [$host; $lanes]) -> Value {
                let lanes = value.map(|lane| lane as i64);
                session.free_value(|backend| backend.create_constant_vector($ty, &lanes))
            }
        }

        impl<'s> IntoRValue<'s, $name> for [$host; $lanes] {
            fn into_rvalue(self, session: &'s Session) -> RValue<'s, $name> {
                session.constant::<$name>(self)
            }
        }

        /// Broadcast literal.
        impl<'s> IntoRValue<'s, $name> for $host {
            fn into_rvalue(self, session: &'s Session) -> RValue<'s, $name> {
                session.constant::<$name>([self; $lanes])
            }
        }

        impl VectorKind for $name {
            type Element = $elem;
            type Mask = $name;
            const LANES: u32 = $lanes;
        }

        impl Arithmetic for $name {}
        impl Integer for $name {}
        impl Comparable for $name {
            type Output = $name;
        }
    };
}

int_vector!(Byte16, Type::U8X16, Byte, u8, 16);
int_vector!(SByte16, Type::I8X16, SByte, i8, 16);
int_vector!(Short8, Type::I16X8, Short, i16, 8);
int_vector!(UShort8, Type::U16X8, UShort, u16, 8);
int_vector!(Int4, Type::I32X4, Int, i32, 4);
int_vector!(UInt4, Type::U32X4, UInt, u32, 4);
int_vector!(Long2, Type::I64X2, Long, i64, 2);

int_vector!(ULong2, Type::U64X2, ULong, u64, 2);

int_vector!(Byte8, Type::U8X8, Byte, u8, 8);
int_vector!(SByte8, Type::I8X8, SByte, i8, 8);
int_vector!(Short4, Type::I16X4, Short, i16, 4);
int_vector!(UShort4, Type::U16X4, UShort, u16, 4);
int_vector!(Int2, Type::I32X2, Int, i32, 2);
int_vector!(UInt2, Type::U32X2, UInt, u32, 2);

macro_rules! float_vector {
    ($(#[$meta:meta])* $name:ident, $ty:expr, $mask:ident, $lanes:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub enum $name {}

        impl ReactorType for $name {
            const TYPE: Type = $ty;
        }

        impl Literal for $name {
            type Host = [f32; $lanes];

            fn constant(session: &Session, value: [f32; $lanes]) -> Value {
                for lane in value {
                    assert!(lane.is_finite(), "float literals must be finite, got {lane}");
                }
                session.free_value(|backend| backend.create_constant_float_vector($ty, &value))
            }
        }

        impl<'s> IntoRValue<'s, $name> for [f32; $lanes] {
            fn into_rvalue(self, session: &'s Session) -> RValue<'s, $name> {
                session.constant::<$name>(self)
            }
        }

        impl<'s> IntoRValue<'s, $name> for f32 {
            fn into_rvalue(self, session: &'s Session) -> RValue<'s, $name> {
                session.constant::<$name>([self; $lanes])
            }
        }

        impl VectorKind for $name {
            type Element = Float;
            type Mask = $mask;
            const LANES: u32 = $lanes;
        }

        impl Arithmetic for $name {}
        impl FloatKind for $name {}
        impl Comparable for $name {
            type Output = $mask;
        }

        impl $name {
            /// `+inf` in every lane.
            pub fn positive_infinity(session: &Session) -> RValue<'_, $name> {
                let value = session.free_value(|backend| {
                    backend.create_constant_float_vector($ty, &[f32::INFINITY; $lanes])
                });
                RValue::from_value(session, value)
            }
        }
    };
}

float_vector!(
    /// Four single-precision floats.
    Float4, Type::F32X4, Int4, 4
);
float_vector!(
    /// Two single-precision floats.
    Float2, Type::F32X2, Int2, 2
);

impl Float {
    /// `+inf`, which cannot be written as a literal.
    pub fn positive_infinity(session: &Session) -> RValue<'_, Float> {
        let value = session.free_value(|backend| backend.create_constant_float(Type::F32, f32::INFINITY));
        RValue::from_value(session, value)
    }
}

// This module converts between kinds. cast performs a value conversion: integer widening
// extends by the source signedness, narrowing truncates, int/float conversions round toward
// zero when going to an integer and saturate at the destination range (NaN becomes zero), Bool
// converts to 0/1 and any non-zero value converts to true. Vector casts preserve the lane
// count: integer packs with the float pack of their shape, signed with unsigned packs of the
// same width, and a 64-bit pack widened into the 128-bit pack with twice as wide lanes,
// extended by the source signedness. The CastFrom impls enumerate them. bitcast reinterprets
// the bits of a value as another kind of the same width. Half is a storage kind: to_float and
// to_half trace the IEEE conversion with variables and structured control flow, and
// f32_to_half_bits is the same rounding on the host for building Half literals.

//! Value casts, bit reinterpretation and half-precision conversion.

use super::kinds::*;
use super::{RValue, ReactorType};
use crate::core::{Backend, FloatPredicate, IntPredicate, Type, Value};

/// `Self` can be produced from an `S` by a value conversion.
pub trait CastFrom<S: ReactorType>: ReactorType {}

/// Scalar kinds that convert freely into each other.
pub trait ScalarNumeric: ReactorType {}

macro_rules! scalar_numeric {
    ($($kind:ident),*) => {$(impl ScalarNumeric for $kind {})*};
}

scalar_numeric!(Bool, Byte, SByte, Short, UShort, Int, UInt, Long, ULong, Float);

impl<S: ScalarNumeric, D: ScalarNumeric> CastFrom<S> for D {}

macro_rules! vector_casts {
    ($($from:ident => $to:ident),*) => {$(impl CastFrom<$from> for $to {})*};
}

vector_casts!(
    Int4 => Float4, Float4 => Int4,
    UInt4 => Float4, Float4 => UInt4,
    Int4 => UInt4, UInt4 => Int4,
    Short8 => UShort8, UShort8 => Short8,
    Byte16 => SByte16, SByte16 => Byte16,
    Long2 => ULong2, ULong2 => Long2,
    Int2 => Float2, Float2 => Int2,
    UInt2 => Float2, Float2 => UInt2,
    Int2 => UInt2, UInt2 => Int2,
    Short4 => UShort4, UShort4 => Short4,
    Byte8 => SByte8, SByte8 => Byte8
);

// Widening of 64-bit packs.
vector_casts!(
    Byte8 => UShort8, Byte8 => Short8, SByte8 => Short8,
    Short4 => Int4, UShort4 => UInt4, UShort4 => Int4,
    Int2 => Long2, UInt2 => ULong2, UInt2 => Long2
);

impl<'s, S: ReactorType> RValue<'s, S> {
    /// Convert the value to kind `D`.
    pub fn cast<D: CastFrom<S>>(self) -> RValue<'s, D> {
        let (from, to) = (S::TYPE, D::TYPE);
        let value = self.value();
        let session = self.session();

        if to.is_bool() && !from.is_bool() {
            // Non-zero is true.
            let zero = session.free_value(|b| {
                if from.is_float() {
                    b.create_constant_float(from, 0.0)
                } else {
                    b.create_constant_int(from, 0)
                }
            });
            let result = session.instr("cast", &[value], |b| {
                if from.is_float() {
                    b.create_fcmp(FloatPredicate::Une, value, zero)
                } else {
                    b.create_icmp(IntPredicate::Ne, value, zero)
                }
            });
            return RValue::from_value(session, result);
        }

        let result = session.instr("cast", &[value], |b| convert(b, value, from, to));
        RValue::from_value(session, result)
    }

    /// Reinterpret the bits as kind `D` of the same width.
    pub fn bitcast<D: ReactorType>(self) -> RValue<'s, D> {
        assert_eq!(
            S::TYPE.bits(),
            D::TYPE.bits(),
            "bitcast from {} to {} changes the width",
            S::TYPE,
            D::TYPE
        );
        self.map("bitcast", |b, v| b.create_bitcast(v, D::TYPE))
    }
}

/// Emit the conversion of `value` from `from` to `to`, lane-wise for vectors.
fn convert(backend: &mut dyn Backend, value: Value, from: Type, to: Type) -> Value {
    let (src, dst) = (from.element(), to.element());

    match (src.is_float(), dst.is_float()) {
        (true, true) => backend.create_bitcast(value, to),
        (true, false) if dst.is_signed() => backend.create_fp_to_si(value, to),
        (true, false) => backend.create_fp_to_ui(value, to),
        (false, true) if src.is_signed() => backend.create_si_to_fp(value, to),
        (false, true) => backend.create_ui_to_fp(value, to),
        (false, false) => {
            if dst.bits() < src.bits() {
                backend.create_trunc(value, to)
            } else if dst.bits() == src.bits() {
                backend.create_bitcast(value, to)
            } else if from.is_vector() {
                let wide = backend.create_widen(value, false, src.is_signed());
                backend.create_bitcast(wide, to)
            } else if src.is_signed() {
                backend.create_sext(value, to)
            } else {
                backend.create_zext(value, to)
            }
        }
    }
}

impl<'s> RValue<'s, Float> {
    /// Round to the nearest half, ties to even. Magnitudes beyond the half
    /// range, infinities and NaN all become the all-ones exponent and mantissa.
    pub fn to_half(self) -> RValue<'s, Half> {
        let s = self.session();
        let bits = self.bitcast::<UInt>();
        let abs = s.var_init::<UInt>(bits & 0x7FFF_FFFFu32);
        let half = s.var_init::<UShort>(((bits & 0x8000_0000u32) >> 16u32).cast::<UShort>());

        s.if_then(abs.load().gt(0x47FF_EFFFu32), || {
            half.store(half.load() | 0x7FFFu16);
        })
        .otherwise(|| {
            s.if_then(abs.load().lt(0x3880_0000u32), || {
                // Denormal result.
                let a = abs.load();
                let mantissa = (a & 0x007F_FFFFu32) | 0x0080_0000u32;
                let e = 113u32 - (a >> 23u32);
                let shifted = s.select::<UInt>(e.lt(24u32), mantissa >> e, 0u32);
                let rounded = (shifted + 0x0FFFu32 + ((shifted >> 13u32) & 1u32)) >> 13u32;
                half.store(half.load() | rounded.cast::<UShort>());
            })
            .otherwise(|| {
                let a = abs.load();
                let rounded = (a + 0xC800_0000u32 + 0x0FFFu32 + ((a >> 13u32) & 1u32)) >> 13u32;
                half.store(half.load() | rounded.cast::<UShort>());
            });
        });

        half.load().bitcast::<Half>()
    }
}

impl<'s> RValue<'s, Half> {
    /// Exact widening to single precision.
    pub fn to_float(self) -> RValue<'s, Float> {
        let s = self.session();
        let bits = self.bitcast::<UShort>().cast::<Int>();
        let e = s.var_init::<Int>((bits >> 10) & 0x1F);
        let m = s.var_init::<Int>(bits & 0x3FF);
        let result = s.var_init::<UInt>((((bits >> 15) & 1) << 31).bitcast::<UInt>());

        s.if_then(e.load().eq(0), || {
            s.if_then(m.load().ne(0), || {
                // Normalize the denormal mantissa.
                s.while_loop(
                    || (m.load() & 0x400).eq(0),
                    || {
                        m.store(m.load() << 1);
                        e.store(e.load() - 1);
                    },
                );
                let fields = ((e.load() + (127 - 15 + 1)) << 23) | ((m.load() & !0x400) << 13);
                result.store(result.load() | fields.bitcast::<UInt>());
            });
        })
        .otherwise(|| {
            let fields = ((e.load() + (127 - 15)) << 23) | (m.load() << 13);
            result.store(result.load() | fields.bitcast::<UInt>());
        });

        result.load().bitcast::<Float>()
    }
}

/// Host-side single to half precision conversion with the traced rounding.
pub fn f32_to_half_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let abs = bits & 0x7FFF_FFFF;
    let sign = ((bits & 0x8000_0000) >> 16) as u16;

    let magnitude = if abs > 0x47FF_EFFF {
        0x7FFF
    } else if abs < 0x3880_0000 {
        let mantissa = (abs & 0x007F_FFFF) | 0x0080_0000;
        let e = 113 - (abs >> 23);
        let shifted = if e < 24 { mantissa >> e } else { 0 };
        (shifted + 0x0FFF + ((shifted >> 13) & 1)) >> 13
    } else {
        abs.wrapping_add(0xC800_0000 + 0x0FFF + ((abs >> 13) & 1)) >> 13
    };
    sign | magnitude as u16
}

/// Host-side half to single precision conversion.
pub fn half_bits_to_f32(half: u16) -> f32 {
    let sign = ((half >> 15) & 1) as u32;
    let mut e = ((half >> 10) & 0x1F) as i32;
    let mut m = (half & 0x3FF) as u32;

    let bits = if e == 0 {
        if m == 0 {
            sign << 31
        } else {
            while m & 0x400 == 0 {
                m <<= 1;
                e -= 1;
            }
            (sign << 31) | (((e + 127 - 15 + 1) as u32) << 23) | ((m & !0x400) << 13)
        }
    } else {
        (sign << 31) | (((e + 127 - 15) as u32) << 23) | (m << 13)
    };
    f32::from_bits(bits)
}

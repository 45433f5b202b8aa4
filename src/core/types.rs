// This module defines the immutable type descriptors used throughout Reactor. A Type is a
// scalar kind plus a lane count: lane count one is a plain scalar, anything larger is a
// 64-bit or 128-bit SIMD vector. Scalar kinds carry their own width and signedness so that the
// expression layer can pick signed or unsigned division, shifts and conversions, while
// backends only look at width and the integer/float split. Half-precision values are a
// 16-bit storage kind; arithmetic on them happens after conversion to Float. Pointers are
// opaque addresses with the host pointer width. Type values are Copy constants, created
// once per distinct kind and never mutated.

//! Scalar and vector type descriptors.

use std::fmt;

/// Element kind of a traced value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    /// IEEE binary16, stored as raw bits.
    F16,
    F32,
    Ptr,
}

impl ScalarKind {
    /// Width in bits of a single element.
    pub const fn bits(self) -> u32 {
        match self {
            ScalarKind::Bool | ScalarKind::I8 | ScalarKind::U8 => 8,
            ScalarKind::I16 | ScalarKind::U16 | ScalarKind::F16 => 16,
            ScalarKind::I32 | ScalarKind::U32 | ScalarKind::F32 => 32,
            ScalarKind::I64 | ScalarKind::U64 => 64,
            ScalarKind::Ptr => usize::BITS,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarKind::I8 | ScalarKind::I16 | ScalarKind::I32 | ScalarKind::I64 | ScalarKind::F32
        )
    }

    pub const fn is_float(self) -> bool {
        matches!(self, ScalarKind::F32)
    }

    /// Integer-like kinds, including bool, half storage and pointers.
    pub const fn is_integer(self) -> bool {
        !self.is_float()
    }

    fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::I8 => "i8",
            ScalarKind::U8 => "u8",
            ScalarKind::I16 => "i16",
            ScalarKind::U16 => "u16",
            ScalarKind::I32 => "i32",
            ScalarKind::U32 => "u32",
            ScalarKind::I64 => "i64",
            ScalarKind::U64 => "u64",
            ScalarKind::F16 => "f16",
            ScalarKind::F32 => "f32",
            ScalarKind::Ptr => "ptr",
        }
    }
}

/// Descriptor of a scalar or fixed-lane vector kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type {
    scalar: ScalarKind,
    lanes: u8,
}

impl Type {
    pub const BOOL: Type = Type::scalar(ScalarKind::Bool);
    pub const I8: Type = Type::scalar(ScalarKind::I8);
    pub const U8: Type = Type::scalar(ScalarKind::U8);
    pub const I16: Type = Type::scalar(ScalarKind::I16);
    pub const U16: Type = Type::scalar(ScalarKind::U16);
    pub const I32: Type = Type::scalar(ScalarKind::I32);
    pub const U32: Type = Type::scalar(ScalarKind::U32);
    pub const I64: Type = Type::scalar(ScalarKind::I64);
    pub const U64: Type = Type::scalar(ScalarKind::U64);
    pub const F16: Type = Type::scalar(ScalarKind::F16);
    pub const F32: Type = Type::scalar(ScalarKind::F32);
    pub const PTR: Type = Type::scalar(ScalarKind::Ptr);

    pub const U8X16: Type = Type::vector(ScalarKind::U8, 16);
    pub const I8X16: Type = Type::vector(ScalarKind::I8, 16);
    pub const I16X8: Type = Type::vector(ScalarKind::I16, 8);
    pub const U16X8: Type = Type::vector(ScalarKind::U16, 8);
    pub const I32X4: Type = Type::vector(ScalarKind::I32, 4);
    pub const U32X4: Type = Type::vector(ScalarKind::U32, 4);
    pub const I64X2: Type = Type::vector(ScalarKind::I64, 2);
    pub const U64X2: Type = Type::vector(ScalarKind::U64, 2);
    pub const F32X4: Type = Type::vector(ScalarKind::F32, 4);

    pub const U8X8: Type = Type::vector(ScalarKind::U8, 8);
    pub const I8X8: Type = Type::vector(ScalarKind::I8, 8);
    pub const I16X4: Type = Type::vector(ScalarKind::I16, 4);
    pub const U16X4: Type = Type::vector(ScalarKind::U16, 4);
    pub const I32X2: Type = Type::vector(ScalarKind::I32, 2);
    pub const U32X2: Type = Type::vector(ScalarKind::U32, 2);
    pub const F32X2: Type = Type::vector(ScalarKind::F32, 2);

    pub const fn scalar(kind: ScalarKind) -> Self {
        Self { scalar: kind, lanes: 1 }
    }

    /// A vector of `lanes` elements filling 64 or 128 bits.
    pub const fn vector(kind: ScalarKind, lanes: u8) -> Self {
        let bits = kind.bits() * lanes as u32;
        assert!(lanes > 1 && (bits == 64 || bits == 128), "vector types are 64 or 128 bits wide");
        Self { scalar: kind, lanes }
    }

    pub const fn kind(self) -> ScalarKind {
        self.scalar
    }

    /// The type of a single lane.
    pub const fn element(self) -> Type {
        Type::scalar(self.scalar)
    }

    pub const fn lanes(self) -> u32 {
        self.lanes as u32
    }

    pub const fn is_vector(self) -> bool {
        self.lanes > 1
    }

    /// A 64-bit pack, held in the low half of a 128-bit register.
    pub const fn is_half_vector(self) -> bool {
        self.is_vector() && self.bits() == 64
    }

    /// Same lane count with `kind` elements, if that shape exists.
    pub const fn with_kind(self, kind: ScalarKind) -> Option<Type> {
        let bits = kind.bits() * self.lanes as u32;
        if self.lanes == 1 {
            Some(Type::scalar(kind))
        } else if bits == 64 || bits == 128 {
            Some(Type { scalar: kind, lanes: self.lanes })
        } else {
            None
        }
    }

    /// Total width in bits.
    pub const fn bits(self) -> u32 {
        self.scalar.bits() * self.lanes as u32
    }

    pub const fn bytes(self) -> u32 {
        self.bits() / 8
    }

    pub const fn is_float(self) -> bool {
        self.scalar.is_float()
    }

    pub const fn is_signed(self) -> bool {
        self.scalar.is_signed()
    }

    pub const fn is_pointer(self) -> bool {
        matches!(self.scalar, ScalarKind::Ptr) && self.lanes == 1
    }

    pub const fn is_bool(self) -> bool {
        matches!(self.scalar, ScalarKind::Bool) && self.lanes == 1
    }

    /// Natural alignment in bytes.
    pub const fn alignment(self) -> u32 {
        self.bytes()
    }

    /// Same shape with the signedness stripped; used to compare types at the seam.
    pub fn storage_eq(self, other: Type) -> bool {
        self.lanes == other.lanes
            && self.scalar.bits() == other.scalar.bits()
            && self.scalar.is_float() == other.scalar.is_float()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_vector() {
            write!(f, "{}x{}", self.scalar.name(), self.lanes)
        } else {
            f.write_str(self.scalar.name())
        }
    }
}

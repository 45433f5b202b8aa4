// This module provides lane operations on the vector kinds. Swizzle and shuffle selects use
// Reactor's hexadecimal encoding: one nibble per result lane, most significant nibble first,
// so swizzle(0x0123) is the identity on four lanes and swizzle(0x3210) reverses them. Two-lane
// swizzles read one bit of each nibble, four-lane swizzles read two bits, four-lane shuffles
// read three (indices 4..7 pick from the second operand), eight-lane swizzles take a u32 with
// three bits per nibble and the byte swizzle takes a u64 with four. mask overwrites the lanes
// named in the select with the lanes of the second operand. Packing narrows two vectors into
// one with saturation; unpacking interleaves the low or high halves of two vectors; widening
// extends half of the lanes to twice their width.

//! Lane access, swizzles, packing and masks.

use super::kinds::*;
use super::{IntoRValue, RValue, ReactorType};
use crate::core::Session;

impl<'s, V: VectorKind> RValue<'s, V> {
    /// Lane `index` as a scalar.
    pub fn extract(self, index: u32) -> RValue<'s, V::Element> {
        assert!(index < V::LANES, "lane {index} out of range for {}", V::TYPE);
        let ty = <V::Element as ReactorType>::TYPE;
        self.map("extractelement", |b, v| b.create_extract_element(v, ty, index))
    }

    /// Copy of `self` with lane `index` replaced.
    pub fn insert(self, element: impl IntoRValue<'s, V::Element>, index: u32) -> Self {
        assert!(index < V::LANES, "lane {index} out of range for {}", V::TYPE);
        let element = element.into_rvalue(self.session());
        self.zip(element, "insertelement", |b, v, e| b.create_insert_element(v, e, index))
    }

    /// Lane `i` of the result is lane `indices[i]` of `self ++ rhs`.
    pub fn shuffle_lanes(self, rhs: Self, indices: &[u32]) -> Self {
        assert_eq!(indices.len(), V::LANES as usize, "one index per lane of {}", V::TYPE);
        for &index in indices {
            assert!(index < 2 * V::LANES, "shuffle index {index} out of range for {}", V::TYPE);
        }
        self.zip(rhs, "shufflevector", |b, l, r| b.create_shuffle_vector(l, r, indices))
    }

    /// Interleave the low halves: `[a0, b0, a1, b1, ...]`.
    pub fn unpack_low(self, rhs: Self) -> Self {
        let indices: Vec<u32> = (0..V::LANES / 2).flat_map(|i| [i, i + V::LANES]).collect();
        self.shuffle_lanes(rhs, &indices)
    }

    /// Interleave the high halves.
    pub fn unpack_high(self, rhs: Self) -> Self {
        let half = V::LANES / 2;
        let indices: Vec<u32> = (half..V::LANES).flat_map(|i| [i, i + V::LANES]).collect();
        self.shuffle_lanes(rhs, &indices)
    }

    /// Bit `i` is the sign bit of lane `i`.
    pub fn sign_mask(self) -> RValue<'s, Int> {
        self.map("signmask", |b, v| b.create_sign_mask(v))
    }
}

impl<'s, V: VectorKind + Integer> RValue<'s, V> {
    /// True if any lane of the mask is set.
    pub fn any_true(self) -> RValue<'s, Bool> {
        self.sign_mask().ne(0)
    }

    /// True if every lane of the mask is set.
    pub fn all_true(self) -> RValue<'s, Bool> {
        let all = ((1u64 << V::LANES) - 1) as i32;
        self.sign_mask().eq(all)
    }
}

/// Four-lane select nibbles, most significant first.
fn nibbles4(select: u16, bits: u16) -> [u32; 4] {
    let mask = (1 << bits) - 1;
    [12, 8, 4, 0].map(|shift| ((select >> shift) & mask) as u32)
}

macro_rules! four_lane_ops {
    ($($kind:ident),*) => {$(
        impl<'s> RValue<'s, $kind> {
            /// Permute lanes; `0x0123` is the identity.
            pub fn swizzle(self, select: u16) -> Self {
                self.shuffle_lanes(self, &nibbles4(select, 2))
            }

            /// Pick lanes from `self` (0..3) and `rhs` (4..7).
            pub fn shuffle(self, rhs: Self, select: u16) -> Self {
                self.shuffle_lanes(rhs, &nibbles4(select, 3))
            }

            /// Replace the lanes named in `select` with the lanes of `rhs`.
            pub fn mask(self, rhs: Self, select: u16) -> Self {
                let mut from_rhs = [false; 4];
                for lane in nibbles4(select, 2) {
                    from_rhs[lane as usize] = true;
                }
                let indices: Vec<u32> = (0..4u32)
                    .map(|i| if from_rhs[i as usize] { i + 4 } else { i })
                    .collect();
                self.shuffle_lanes(rhs, &indices)
            }

            pub fn x(self) -> RValue<'s, <$kind as VectorKind>::Element> {
                self.extract(0)
            }

            pub fn y(self) -> RValue<'s, <$kind as VectorKind>::Element> {
                self.extract(1)
            }

            pub fn z(self) -> RValue<'s, <$kind as VectorKind>::Element> {
                self.extract(2)
            }

            pub fn w(self) -> RValue<'s, <$kind as VectorKind>::Element> {
                self.extract(3)
            }
        }
    )*};
}

four_lane_ops!(Int4, UInt4, Float4, Short4, UShort4);

macro_rules! two_lane_ops {
    ($($kind:ident),*) => {$(
        impl<'s> RValue<'s, $kind> {
            /// Permute lanes; `0x01` is the identity and `0x10` swaps.
            pub fn swizzle(self, select: u8) -> Self {
                self.shuffle_lanes(self, &[u32::from(select >> 4) & 1, u32::from(select) & 1])
            }

            pub fn x(self) -> RValue<'s, <$kind as VectorKind>::Element> {
                self.extract(0)
            }

            pub fn y(self) -> RValue<'s, <$kind as VectorKind>::Element> {
                self.extract(1)
            }
        }
    )*};
}

two_lane_ops!(Int2, UInt2, Float2, Long2, ULong2);

macro_rules! eight_lane_ops {
    ($($kind:ident),*) => {$(
        impl<'s> RValue<'s, $kind> {
            /// Permute lanes with one 3-bit index per nibble; `0x0123_4567` is the identity.
            pub fn swizzle(self, select: u32) -> Self {
                let indices: Vec<u32> = (0..8).map(|i| (select >> (28 - 4 * i)) & 0x7).collect();
                self.shuffle_lanes(self, &indices)
            }
        }
    )*};
}

eight_lane_ops!(Short8, UShort8, Byte8, SByte8);

macro_rules! sixteen_lane_ops {
    ($($kind:ident),*) => {$(
        impl<'s> RValue<'s, $kind> {
            /// Permute bytes with one index per nibble; `0x0123_4567_89AB_CDEF` is the identity.
            pub fn swizzle(self, select: u64) -> Self {
                let indices: Vec<u32> = (0..16).map(|i| ((select >> (60 - 4 * i)) & 0xF) as u32).collect();
                self.shuffle_lanes(self, &indices)
            }
        }
    )*};
}

sixteen_lane_ops!(Byte16, SByte16);

/// Vector kinds whose lanes widen to the next kind.
pub trait Widen: VectorKind {
    type Wide: VectorKind;
}

impl Widen for Byte16 {
    type Wide = UShort8;
}

impl Widen for SByte16 {
    type Wide = Short8;
}

impl Widen for Short8 {
    type Wide = Int4;
}

impl Widen for UShort8 {
    type Wide = UInt4;
}

impl Widen for Int4 {
    type Wide = Long2;
}

impl Widen for UInt4 {
    type Wide = ULong2;
}

impl<'s, V: Widen> RValue<'s, V> {
    /// Extend the low half of the lanes, by the signedness of `V`.
    pub fn widen_low(self) -> RValue<'s, V::Wide> {
        let signed = V::TYPE.is_signed();
        self.map("widen", |b, v| b.create_widen(v, false, signed))
    }

    pub fn widen_high(self) -> RValue<'s, V::Wide> {
        let signed = V::TYPE.is_signed();
        self.map("widen", |b, v| b.create_widen(v, true, signed))
    }
}

impl<'s> RValue<'s, Short8> {
    /// Saturate both operands to signed bytes, `self` in the low lanes.
    pub fn pack_signed(self, rhs: Self) -> RValue<'s, SByte16> {
        self.zip(rhs, "narrow", |b, l, r| b.create_narrow(l, r, true))
    }

    /// Saturate both operands to unsigned bytes.
    pub fn pack_unsigned(self, rhs: Self) -> RValue<'s, Byte16> {
        self.zip(rhs, "narrow", |b, l, r| b.create_narrow(l, r, false))
    }
}

impl<'s> RValue<'s, Int4> {
    pub fn pack_signed(self, rhs: Self) -> RValue<'s, Short8> {
        self.zip(rhs, "narrow", |b, l, r| b.create_narrow(l, r, true))
    }

    pub fn pack_unsigned(self, rhs: Self) -> RValue<'s, UShort8> {
        self.zip(rhs, "narrow", |b, l, r| b.create_narrow(l, r, false))
    }
}

impl Session {
    /// Broadcast a scalar to every lane.
    pub fn splat<'s, V: VectorKind>(&'s self, scalar: impl IntoRValue<'s, V::Element>) -> RValue<'s, V> {
        scalar
            .into_rvalue(self)
            .map("splat", |b, v| b.create_splat(V::TYPE, v))
    }

    /// Per-lane `mask ? if_true : if_false`.
    pub fn mask_select<'s, V: VectorKind>(
        &'s self,
        mask: impl IntoRValue<'s, V::Mask>,
        if_true: impl IntoRValue<'s, V>,
        if_false: impl IntoRValue<'s, V>,
    ) -> RValue<'s, V> {
        let mask = mask.into_rvalue(self).value();
        let a = if_true.into_rvalue(self).value();
        let b = if_false.into_rvalue(self).value();
        let result = self.instr("maskselect", &[mask, a, b], |backend| {
            backend.create_mask_select(mask, a, b)
        });
        RValue::from_value(self, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibble_decoding() {
        assert_eq!(nibbles4(0x0123, 2), [0, 1, 2, 3]);
        assert_eq!(nibbles4(0x0033, 2), [0, 0, 3, 3]);
        assert_eq!(nibbles4(0x4012, 3), [4, 0, 1, 2]);
        // Ignored high bits of each nibble.
        assert_eq!(nibbles4(0xFFFF, 2), [3, 3, 3, 3]);
        assert_eq!(nibbles4(0xFFFF, 3), [7, 7, 7, 7]);
    }
}

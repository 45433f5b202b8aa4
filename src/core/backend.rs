// This module defines the backend seam: the fixed catalogue of instruction-creation
// operations that every machine-code generator must provide. Everything above this layer
// (the session, variables, the typed expression vocabulary, structured control flow) only
// ever talks to a Box<dyn Backend>. Values and basic blocks are opaque dense handles that
// the backend hands out; the session never looks inside them. Besides plain arithmetic the
// catalogue covers indexed address computation, masked vector memory access, atomics and
// fences parameterized by memory ordering, lane shuffles, saturating and widening SIMD
// primitives, host calls and the positioning hooks the debug-info bridge needs to insert
// instructions at an earlier point of a block. acquire_routine turns the accumulated
// function into executable code and reports the code range to source-location mapping.

//! The abstract backend seam.
//!
//! A backend receives one call per instruction in program order. The layers
//! above it guarantee that:
//! - operands of an instruction were produced earlier, in the same block,
//!   unless they are constants, arguments or stack variable addresses;
//! - every block the session switches away from is terminated by a branch
//!   or return, except blocks left open after a return, which the backend
//!   closes in [`Backend::acquire_routine`].

use super::error::ReactorResult;
use super::types::Type;
use std::any::Any;
use std::fmt;

/// Opaque handle to a single backend definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(u32);

impl Value {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Opaque handle to a basic block of the function under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BasicBlock(u32);

impl BasicBlock {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A saved position inside a block. Interpreted by the backend that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertPoint {
    pub block: u32,
    /// Backend instruction after which new instructions go; `None` is the top of the block.
    pub after: Option<u32>,
}

/// Memory ordering strength of an atomic operation or fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryOrder {
    Relaxed,
    Acquire,
    Release,
    AcquireRelease,
    #[default]
    SequentiallyConsistent,
}

impl MemoryOrder {
    pub const ALL: [MemoryOrder; 5] = [
        MemoryOrder::Relaxed,
        MemoryOrder::Acquire,
        MemoryOrder::Release,
        MemoryOrder::AcquireRelease,
        MemoryOrder::SequentiallyConsistent,
    ];
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

/// Float comparison predicates. `O*` are false on NaN, `U*` are true on NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Uno,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
}

/// Float rounding used by [`Backend::create_round`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundingMode {
    Nearest,
    Floor,
    Ceil,
    Trunc,
}

/// Transcendental functions of one float operand, see [`Backend::create_math`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathFunction {
    Exp2,
    Log2,
    Sin,
    Cos,
}

/// Load/store attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryAccess {
    pub volatile: bool,
    /// Byte alignment; zero means natural alignment of the accessed type.
    pub alignment: u32,
    /// Some for atomic accesses.
    pub order: Option<MemoryOrder>,
}

impl MemoryAccess {
    pub fn atomic(order: MemoryOrder) -> Self {
        Self { order: Some(order), ..Self::default() }
    }
}

/// Code range to debug location id, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeRange {
    pub start: u32,
    pub end: u32,
    pub location: u32,
}

/// Machine code produced by [`Backend::acquire_routine`].
pub struct CompiledCode {
    pub entry: *const u8,
    /// Copy of the emitted bytes, for disassembly and object export.
    pub bytes: Vec<u8>,
    pub line_table: Vec<CodeRange>,
    /// Keeps the executable memory mapped; dropped with the routine.
    pub owner: Box<dyn Any>,
}

impl fmt::Debug for CompiledCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledCode")
            .field("entry", &self.entry)
            .field("size", &self.bytes.len())
            .field("line_table", &self.line_table.len())
            .finish()
    }
}

/// Instruction creation catalogue implemented by every code generator.
///
/// Binary operations take operands of identical storage type and produce a
/// value of that type. Vector operations work lane by lane unless noted.
pub trait Backend {
    fn name(&self) -> &'static str;

    /// Start a new function and return its entry block, which becomes the insert block.
    fn create_function(&mut self, params: &[Type], ret: Option<Type>) -> BasicBlock;
    fn argument(&mut self, index: usize) -> Value;
    fn value_type(&self, value: Value) -> Type;

    // Blocks and positioning
    fn create_basic_block(&mut self) -> BasicBlock;
    fn insert_block(&self) -> BasicBlock;
    fn set_insert_block(&mut self, block: BasicBlock);
    fn insertion_point(&self) -> InsertPoint;
    /// Redirect emission to `point`; `None` resumes appending to the insert block.
    fn set_insertion_point(&mut self, point: Option<InsertPoint>);
    fn set_debug_location(&mut self, location: Option<u32>);

    /// Address of a fresh stack slot holding `array_size` elements (zero means one).
    fn allocate_stack_variable(&mut self, ty: Type, array_size: usize) -> Value;

    // Terminators
    fn create_ret_void(&mut self);
    fn create_ret(&mut self, value: Value);
    fn create_br(&mut self, dest: BasicBlock);
    fn create_cond_br(&mut self, cond: Value, if_true: BasicBlock, if_false: BasicBlock);
    fn create_switch(&mut self, control: Value, default: BasicBlock, cases: &[(i64, BasicBlock)]);
    fn create_unreachable(&mut self);

    // Integer arithmetic
    fn create_add(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_sub(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_mul(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_udiv(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_sdiv(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_urem(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_srem(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_mul_high(&mut self, lhs: Value, rhs: Value, signed: bool) -> Value;
    fn create_add_sat(&mut self, lhs: Value, rhs: Value, signed: bool) -> Value;
    fn create_sub_sat(&mut self, lhs: Value, rhs: Value, signed: bool) -> Value;
    /// Unsigned rounding average `(a + b + 1) >> 1`.
    fn create_average(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_min(&mut self, lhs: Value, rhs: Value, signed: bool) -> Value;
    fn create_max(&mut self, lhs: Value, rhs: Value, signed: bool) -> Value;

    // Float arithmetic
    fn create_fadd(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_fsub(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_fmul(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_fdiv(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_frem(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_fmin(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_fmax(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_fabs(&mut self, value: Value) -> Value;
    fn create_sqrt(&mut self, value: Value) -> Value;
    fn create_round(&mut self, value: Value, mode: RoundingMode) -> Value;
    /// Fused `a * b + c` with a single rounding.
    fn create_fma(&mut self, a: Value, b: Value, c: Value) -> Value;
    fn create_math(&mut self, function: MathFunction, value: Value) -> Value;
    fn create_pow(&mut self, lhs: Value, rhs: Value) -> Value;

    // Bitwise
    fn create_shl(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_lshr(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_ashr(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_and(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_or(&mut self, lhs: Value, rhs: Value) -> Value;
    fn create_xor(&mut self, lhs: Value, rhs: Value) -> Value;
    /// Leading zero bits per lane; a zero lane counts its full width.
    fn create_ctlz(&mut self, value: Value) -> Value;
    fn create_cttz(&mut self, value: Value) -> Value;
    fn create_popcount(&mut self, value: Value) -> Value;

    // Unary
    fn create_neg(&mut self, value: Value) -> Value;
    fn create_fneg(&mut self, value: Value) -> Value;
    fn create_not(&mut self, value: Value) -> Value;

    // Memory
    fn create_load(&mut self, ptr: Value, ty: Type, access: MemoryAccess) -> Value;
    fn create_store(&mut self, value: Value, ptr: Value, ty: Type, access: MemoryAccess);
    /// `ptr + index * size_of(ty)`; the index is sign- or zero-extended to pointer width.
    fn create_gep(&mut self, ptr: Value, ty: Type, index: Value, unsigned_index: bool) -> Value;
    fn create_masked_load(&mut self, ptr: Value, ty: Type, mask: Value, alignment: u32, zero_masked: bool) -> Value;
    fn create_masked_store(&mut self, ptr: Value, value: Value, mask: Value, alignment: u32);

    // Atomics
    fn create_fence(&mut self, order: MemoryOrder);
    fn create_atomic_add(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value;
    fn create_atomic_sub(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value;
    fn create_atomic_and(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value;
    fn create_atomic_or(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value;
    fn create_atomic_xor(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value;
    fn create_atomic_min(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value;
    fn create_atomic_max(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value;
    fn create_atomic_umin(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value;
    fn create_atomic_umax(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value;
    fn create_atomic_exchange(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value;
    /// Stores `value` if `*ptr == compare`; returns the previous contents either way.
    fn create_atomic_compare_exchange(
        &mut self,
        ptr: Value,
        value: Value,
        compare: Value,
        order_equal: MemoryOrder,
        order_unequal: MemoryOrder,
    ) -> Value;

    // Casts
    fn create_trunc(&mut self, value: Value, dest: Type) -> Value;
    fn create_zext(&mut self, value: Value, dest: Type) -> Value;
    fn create_sext(&mut self, value: Value, dest: Type) -> Value;
    fn create_fp_to_si(&mut self, value: Value, dest: Type) -> Value;
    fn create_fp_to_ui(&mut self, value: Value, dest: Type) -> Value;
    fn create_si_to_fp(&mut self, value: Value, dest: Type) -> Value;
    fn create_ui_to_fp(&mut self, value: Value, dest: Type) -> Value;
    fn create_bitcast(&mut self, value: Value, dest: Type) -> Value;

    // Comparisons: Bool for scalars, an all-ones/all-zeros integer mask for vectors
    fn create_icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value;
    fn create_fcmp(&mut self, pred: FloatPredicate, lhs: Value, rhs: Value) -> Value;

    // Selection and lanes
    fn create_select(&mut self, cond: Value, if_true: Value, if_false: Value) -> Value;
    /// Per-lane `mask ? if_true : if_false`, with an integer mask of the same shape.
    fn create_mask_select(&mut self, mask: Value, if_true: Value, if_false: Value) -> Value;
    fn create_extract_element(&mut self, vector: Value, ty: Type, index: u32) -> Value;
    fn create_insert_element(&mut self, vector: Value, element: Value, index: u32) -> Value;
    /// Lane `i` of the result is lane `select[i]` of the concatenation `lhs ++ rhs`.
    fn create_shuffle_vector(&mut self, lhs: Value, rhs: Value, select: &[u32]) -> Value;
    fn create_splat(&mut self, ty: Type, scalar: Value) -> Value;
    /// Saturating narrow of two vectors into one with lanes half as wide.
    fn create_narrow(&mut self, lhs: Value, rhs: Value, signed_result: bool) -> Value;
    /// Extend the low or high half of the lanes to twice their width.
    fn create_widen(&mut self, value: Value, high: bool, signed: bool) -> Value;
    /// Bit `i` of the result is the sign bit of lane `i`.
    fn create_sign_mask(&mut self, value: Value) -> Value;

    // Constants
    fn create_constant_int(&mut self, ty: Type, value: i64) -> Value;
    fn create_constant_float(&mut self, ty: Type, value: f32) -> Value;
    fn create_constant_vector(&mut self, ty: Type, lanes: &[i64]) -> Value;
    fn create_constant_float_vector(&mut self, ty: Type, lanes: &[f32]) -> Value;
    fn create_constant_pointer(&mut self, address: usize) -> Value;
    fn create_null_value(&mut self, ty: Type) -> Value;

    // Calls and markers
    /// Call the host function at `address` with the C calling convention.
    fn create_call(&mut self, address: usize, params: &[Type], ret: Option<Type>, args: &[Value]) -> Option<Value>;
    fn create_nop(&mut self);

    /// Finish the function and produce executable code for it.
    fn acquire_routine(&mut self, name: &str) -> ReactorResult<CompiledCode>;
}

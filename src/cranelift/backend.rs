// This module implements the Backend trait on top of cranelift_codegen's IR. Reactor values
// are dense indices into a table that records, for each value, its Reactor type and how it
// is defined: either a Cranelift SSA value local to one block, or a block-free definition
// (integer, float or vector constant, stack slot address) that is rematerialized once per
// block on first use. Emission goes through a FuncCursor positioned either at the bottom of
// the current block or, while the debug-info bridge redirects it, before a saved
// instruction. Blocks left without a terminator are closed with a default return when the
// routine is acquired.

//! `Backend` implementation for Cranelift.

use super::{cl_type, jit, lower, mask_immediate};
use crate::core::{
    Backend, BasicBlock, CompiledCode, Config, FloatPredicate, InsertPoint, IntPredicate, MathFunction,
    MemoryAccess, MemoryOrder, ReactorResult, RoundingMode, ScalarKind, Type, Value,
};
use cranelift_codegen::cursor::{Cursor, CursorPosition, FuncCursor};
use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::immediates::Ieee32;
use cranelift_codegen::ir::{
    self, types, AbiParam, AtomicRmwOp, Block, ConstantData, Function, InstBuilder, MemFlags, Signature,
    SourceLoc, StackSlotData, StackSlotKind, UserFuncName,
};
use cranelift_codegen::isa::OwnedTargetIsa;
use hashbrown::HashMap;

/// How a Reactor value is defined.
#[derive(Debug, Clone, Copy)]
enum Def {
    /// SSA value, usable only where its definition dominates.
    Local(ir::Value),
    Int(i64),
    Float(u32),
    Vector(ir::Constant),
    StackAddress(ir::StackSlot),
}

#[derive(Debug, Clone, Copy)]
struct ValueInfo {
    def: Def,
    ty: Type,
}

/// Reactor backend emitting Cranelift IR and compiling it with cranelift-jit.
pub struct CraneliftBackend {
    isa: OwnedTargetIsa,
    func: Function,
    values: Vec<ValueInfo>,
    blocks: Vec<Block>,
    arguments: Vec<Value>,
    current: Option<BasicBlock>,
    /// Set while emission is redirected to a saved point.
    custom_position: Option<CursorPosition>,
    /// Rematerialized block-free values, per Cranelift block.
    remat: HashMap<(Block, Value), ir::Value>,
    srcloc: SourceLoc,
    ret: Option<Type>,
    /// Target of inactive lanes in masked accesses.
    scratch: Option<ir::StackSlot>,
}

impl CraneliftBackend {
    pub fn new(config: &Config) -> ReactorResult<Self> {
        let isa = jit::host_isa(config)?;
        log::debug!("Cranelift backend for {} ({})", isa.triple(), config.optimization);
        Ok(Self {
            isa,
            func: Function::new(),
            values: Vec::new(),
            blocks: Vec::new(),
            arguments: Vec::new(),
            current: None,
            custom_position: None,
            remat: HashMap::new(),
            srcloc: SourceLoc::default(),
            ret: None,
            scratch: None,
        })
    }

    /// Boxed, ready to hand to a session.
    pub fn boxed(config: &Config) -> ReactorResult<Box<dyn Backend>> {
        Ok(Box::new(Self::new(config)?))
    }

    pub(super) fn pointer_type(&self) -> types::Type {
        self.isa.pointer_type()
    }

    pub(super) fn cl(&self, ty: Type) -> types::Type {
        cl_type(ty, self.pointer_type())
    }

    pub(super) fn ty(&self, value: Value) -> Type {
        self.values[value.index()].ty
    }

    fn push(&mut self, def: Def, ty: Type) -> Value {
        let value = Value::new(self.values.len() as u32);
        self.values.push(ValueInfo { def, ty });
        value
    }

    pub(super) fn local(&mut self, value: ir::Value, ty: Type) -> Value {
        self.push(Def::Local(value), ty)
    }

    /// Same definition, viewed as another type of identical storage.
    fn alias(&mut self, value: Value, ty: Type) -> Value {
        let def = self.values[value.index()].def;
        self.push(def, ty)
    }

    fn current_cl_block(&self) -> Block {
        match self.current {
            Some(block) => self.blocks[block.index()],
            None => panic!("Cranelift backend has no insert block"),
        }
    }

    fn is_terminated(&self, block: Block) -> bool {
        self.func
            .layout
            .last_inst(block)
            .is_some_and(|inst| self.func.dfg.insts[inst].opcode().is_terminator())
    }

    /// A cursor at the current emission point.
    pub(super) fn cursor(&mut self) -> FuncCursor<'_> {
        let position = match self.custom_position {
            Some(position) => position,
            None => {
                let block = self.current_cl_block();
                assert!(!self.is_terminated(block), "emission into {block} after its terminator");
                CursorPosition::After(block)
            }
        };
        let mut cursor = FuncCursor::new(&mut self.func).with_srcloc(self.srcloc);
        cursor.set_position(position);
        cursor
    }

    /// Cranelift value for `value` at the current emission point.
    pub(super) fn get(&mut self, value: Value) -> ir::Value {
        let ValueInfo { def, ty } = self.values[value.index()];
        if let Def::Local(local) = def {
            return local;
        }

        let block = self.current_cl_block();
        let cacheable = self.custom_position.is_none();
        if cacheable {
            if let Some(&local) = self.remat.get(&(block, value)) {
                return local;
            }
        }

        let cl = self.cl(ty);
        let pointer = self.pointer_type();
        let mut cursor = self.cursor();
        let local = match def {
            Def::Int(imm) => cursor.ins().iconst(cl, mask_immediate(imm, cl.bits())),
            Def::Float(bits) => cursor.ins().f32const(Ieee32::with_bits(bits)),
            Def::Vector(constant) => cursor.ins().vconst(cl, constant),
            Def::StackAddress(slot) => cursor.ins().stack_addr(pointer, slot, 0),
            Def::Local(_) => unreachable!("local values are returned above"),
        };

        if cacheable {
            self.remat.insert((block, value), local);
        }
        local
    }

    fn unary(&mut self, value: Value, f: impl FnOnce(&mut FuncCursor<'_>, ir::Value) -> ir::Value) -> Value {
        let ty = self.ty(value);
        let x = self.get(value);
        let result = f(&mut self.cursor(), x);
        self.local(result, ty)
    }

    fn binary(
        &mut self,
        lhs: Value,
        rhs: Value,
        f: impl FnOnce(&mut FuncCursor<'_>, ir::Value, ir::Value) -> ir::Value,
    ) -> Value {
        let ty = self.ty(lhs);
        let (a, b) = (self.get(lhs), self.get(rhs));
        let result = f(&mut self.cursor(), a, b);
        self.local(result, ty)
    }

    /// Binary operation expanded lane by lane for vectors.
    fn lanewise_binary(
        &mut self,
        lhs: Value,
        rhs: Value,
        op: impl Fn(&mut FuncCursor<'_>, ir::Value, ir::Value) -> ir::Value,
    ) -> Value {
        let ty = self.ty(lhs);
        let (a, b) = (self.get(lhs), self.get(rhs));
        let result = if ty.is_vector() {
            lower::lanewise(&mut self.cursor(), ty.lanes(), a, b, op)
        } else {
            op(&mut self.cursor(), a, b)
        };
        self.local(result, ty)
    }

    /// Unary operation expanded lane by lane for vectors.
    fn lanewise_unary(&mut self, value: Value, op: impl Fn(&mut FuncCursor<'_>, ir::Value) -> ir::Value) -> Value {
        let ty = self.ty(value);
        let x = self.get(value);
        let result = if ty.is_vector() {
            lower::lanewise_unary(&mut self.cursor(), ty.lanes(), x, op)
        } else {
            op(&mut self.cursor(), x)
        };
        self.local(result, ty)
    }

    /// Call the `f32 -> f32` host helper at `address` on every lane.
    fn float_helper_unary(&mut self, value: Value, address: usize) -> Value {
        let signature = self.signature(&[Type::F32], Some(Type::F32));
        let signature = self.func.import_signature(signature);
        let pointer = self.pointer_type();
        self.lanewise_unary(value, move |c, x| lower::host_call(c, signature, pointer, address, &[x]))
    }

    fn float_helper_binary(&mut self, lhs: Value, rhs: Value, address: usize) -> Value {
        let signature = self.signature(&[Type::F32, Type::F32], Some(Type::F32));
        let signature = self.func.import_signature(signature);
        let pointer = self.pointer_type();
        self.lanewise_binary(lhs, rhs, move |c, a, b| lower::host_call(c, signature, pointer, address, &[a, b]))
    }

    fn terminate(&mut self, f: impl FnOnce(&mut FuncCursor<'_>)) {
        f(&mut self.cursor());
    }

    fn new_block(&mut self) -> Block {
        let block = self.func.dfg.make_block();
        self.func.layout.append_block(block);
        block
    }

    fn abi_param(&self, ty: Type) -> AbiParam {
        let param = AbiParam::new(self.cl(ty));
        if ty.is_float() || ty.bits() >= 32 {
            param
        } else if ty.is_signed() {
            param.sext()
        } else {
            param.uext()
        }
    }

    fn signature(&self, params: &[Type], ret: Option<Type>) -> Signature {
        let mut signature = Signature::new(self.isa.default_call_conv());
        signature.params.extend(params.iter().map(|&ty| self.abi_param(ty)));
        signature.returns.extend(ret.map(|ty| self.abi_param(ty)));
        signature
    }

    fn scratch_slot(&mut self) -> ir::StackSlot {
        match self.scratch {
            Some(slot) => slot,
            None => {
                let slot = self
                    .func
                    .create_sized_stack_slot(StackSlotData::new(StackSlotKind::ExplicitSlot, 16, 4));
                self.scratch = Some(slot);
                slot
            }
        }
    }

    fn vector_constant(&mut self, ty: Type, mut bytes: Vec<u8>) -> Value {
        bytes.resize(16, 0);
        let constant = self.func.dfg.constants.insert(ConstantData::from(bytes));
        self.push(Def::Vector(constant), ty)
    }

    fn rmw(&mut self, op: AtomicRmwOp, ptr: Value, value: Value, order: MemoryOrder) -> Value {
        trace_upgrade("atomic rmw", order);
        let ty = self.ty(value);
        let cl = self.cl(ty);
        let (p, x) = (self.get(ptr), self.get(value));
        let result = self.cursor().ins().atomic_rmw(cl, MemFlags::new(), op, p, x);
        self.local(result, ty)
    }

    fn cast(&mut self, value: Value, dest: Type, f: impl FnOnce(&mut FuncCursor<'_>, types::Type, ir::Value) -> ir::Value) -> Value {
        let cl = self.cl(dest);
        let x = self.get(value);
        let result = f(&mut self.cursor(), cl, x);
        self.local(result, dest)
    }

    fn comparison_type(ty: Type) -> Type {
        if !ty.is_vector() {
            Type::BOOL
        } else if ty.is_float() {
            Type::vector(ScalarKind::I32, ty.lanes() as u8)
        } else {
            ty
        }
    }
}

/// Cranelift atomics are sequentially consistent; weaker requests are strengthened.
fn is_upgraded(order: MemoryOrder) -> bool {
    order != MemoryOrder::SequentiallyConsistent
}

fn trace_upgrade(op: &str, order: MemoryOrder) {
    if is_upgraded(order) {
        log::trace!("{} with {:?} ordering upgraded to sequentially consistent", op, order);
    }
}

/// Flags of a plain access. Only scalars are marked aligned: vector pointers
/// usually come from host arrays with element alignment.
fn access_flags(ty: Type, access: MemoryAccess) -> MemFlags {
    let mut flags = MemFlags::new();
    if !ty.is_vector() && (access.alignment == 0 || access.alignment >= ty.alignment()) {
        flags.set_aligned();
    }
    flags
}

fn int_cc(pred: IntPredicate) -> IntCC {
    match pred {
        IntPredicate::Eq => IntCC::Equal,
        IntPredicate::Ne => IntCC::NotEqual,
        IntPredicate::Ugt => IntCC::UnsignedGreaterThan,
        IntPredicate::Uge => IntCC::UnsignedGreaterThanOrEqual,
        IntPredicate::Ult => IntCC::UnsignedLessThan,
        IntPredicate::Ule => IntCC::UnsignedLessThanOrEqual,
        IntPredicate::Sgt => IntCC::SignedGreaterThan,
        IntPredicate::Sge => IntCC::SignedGreaterThanOrEqual,
        IntPredicate::Slt => IntCC::SignedLessThan,
        IntPredicate::Sle => IntCC::SignedLessThanOrEqual,
    }
}

impl Backend for CraneliftBackend {
    fn name(&self) -> &'static str {
        "cranelift"
    }

    fn create_function(&mut self, params: &[Type], ret: Option<Type>) -> BasicBlock {
        let signature = self.signature(params, ret);
        self.func = Function::with_name_signature(UserFuncName::user(0, 0), signature);
        self.values.clear();
        self.blocks.clear();
        self.arguments.clear();
        self.remat.clear();
        self.scratch = None;
        self.ret = ret;

        let entry = self.create_basic_block();
        let entry_block = self.blocks[entry.index()];
        for &param in params {
            let cl = self.cl(param);
            let value = self.func.dfg.append_block_param(entry_block, cl);
            let value = self.local(value, param);
            self.arguments.push(value);
        }
        self.current = Some(entry);
        entry
    }

    fn argument(&mut self, index: usize) -> Value {
        self.arguments[index]
    }

    fn value_type(&self, value: Value) -> Type {
        self.ty(value)
    }

    fn create_basic_block(&mut self) -> BasicBlock {
        let block = self.new_block();
        self.blocks.push(block);
        BasicBlock::new(self.blocks.len() as u32 - 1)
    }

    fn insert_block(&self) -> BasicBlock {
        match self.current {
            Some(block) => block,
            None => panic!("Cranelift backend has no insert block"),
        }
    }

    fn set_insert_block(&mut self, block: BasicBlock) {
        self.current = Some(block);
        self.custom_position = None;
    }

    fn insertion_point(&self) -> InsertPoint {
        let block = self.insert_block();
        let cl_block = self.blocks[block.index()];
        let after = match self.custom_position {
            Some(CursorPosition::At(inst)) => self.func.layout.prev_inst(inst),
            Some(CursorPosition::Before(_)) => None,
            _ => self.func.layout.last_inst(cl_block),
        };
        InsertPoint {
            block: block.index() as u32,
            after: after.map(|inst| inst.as_u32()),
        }
    }

    fn set_insertion_point(&mut self, point: Option<InsertPoint>) {
        let Some(point) = point else {
            self.custom_position = None;
            return;
        };
        let block = self.blocks[point.block as usize];
        let next = match point.after {
            Some(inst) => self.func.layout.next_inst(ir::Inst::from_u32(inst)),
            None => self.func.layout.first_inst(block),
        };
        self.custom_position = Some(match next {
            Some(inst) => CursorPosition::At(inst),
            None => CursorPosition::After(block),
        });
    }

    fn set_debug_location(&mut self, location: Option<u32>) {
        self.srcloc = location.map_or_else(SourceLoc::default, SourceLoc::new);
    }

    fn allocate_stack_variable(&mut self, ty: Type, array_size: usize) -> Value {
        let size = ty.bytes() * array_size.max(1) as u32;
        let align_shift = ty.alignment().trailing_zeros() as u8;
        let slot = self
            .func
            .create_sized_stack_slot(StackSlotData::new(StackSlotKind::ExplicitSlot, size, align_shift));
        self.push(Def::StackAddress(slot), Type::PTR)
    }

    fn create_ret_void(&mut self) {
        self.terminate(|c| {
            c.ins().return_(&[]);
        });
    }

    fn create_ret(&mut self, value: Value) {
        let x = self.get(value);
        self.terminate(|c| {
            c.ins().return_(&[x]);
        });
    }

    fn create_br(&mut self, dest: BasicBlock) {
        let target = self.blocks[dest.index()];
        self.terminate(|c| {
            c.ins().jump(target, &[]);
        });
    }

    fn create_cond_br(&mut self, cond: Value, if_true: BasicBlock, if_false: BasicBlock) {
        let c = self.get(cond);
        let (t, f) = (self.blocks[if_true.index()], self.blocks[if_false.index()]);
        self.terminate(|cursor| {
            cursor.ins().brif(c, t, &[], f, &[]);
        });
    }

    fn create_switch(&mut self, control: Value, default: BasicBlock, cases: &[(i64, BasicBlock)]) {
        let x = self.get(control);
        let cl = self.cl(self.ty(control));
        let default = self.blocks[default.index()];
        if cases.is_empty() {
            self.terminate(|c| {
                c.ins().jump(default, &[]);
            });
            return;
        }

        // Compare chain: a failed test falls through to the next test block,
        // the last one to the default.
        let mut position = self.cursor().position();
        for (i, &(case, target)) in cases.iter().enumerate() {
            let next = if i + 1 == cases.len() { default } else { self.new_block() };
            let target = self.blocks[target.index()];

            let mut cursor = FuncCursor::new(&mut self.func).with_srcloc(self.srcloc);
            cursor.set_position(position);
            let k = cursor.ins().iconst(cl, mask_immediate(case, cl.bits()));
            let hit = cursor.ins().icmp(IntCC::Equal, x, k);
            cursor.ins().brif(hit, target, &[], next, &[]);
            position = CursorPosition::After(next);
        }
    }

    fn create_unreachable(&mut self) {
        let ret = self.ret.map(|ty| self.cl(ty));
        self.terminate(|c| lower::default_return(c, ret));
    }

    fn create_add(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(lhs, rhs, |c, a, b| c.ins().iadd(a, b))
    }

    fn create_sub(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(lhs, rhs, |c, a, b| c.ins().isub(a, b))
    }

    fn create_mul(&mut self, lhs: Value, rhs: Value) -> Value {
        if self.ty(lhs).is_vector() && self.ty(lhs).element().bits() == 8 {
            self.lanewise_binary(lhs, rhs, |c, a, b| c.ins().imul(a, b))
        } else {
            self.binary(lhs, rhs, |c, a, b| c.ins().imul(a, b))
        }
    }

    fn create_udiv(&mut self, lhs: Value, rhs: Value) -> Value {
        self.lanewise_binary(lhs, rhs, |c, a, b| c.ins().udiv(a, b))
    }

    fn create_sdiv(&mut self, lhs: Value, rhs: Value) -> Value {
        self.lanewise_binary(lhs, rhs, |c, a, b| c.ins().sdiv(a, b))
    }

    fn create_urem(&mut self, lhs: Value, rhs: Value) -> Value {
        self.lanewise_binary(lhs, rhs, |c, a, b| c.ins().urem(a, b))
    }

    fn create_srem(&mut self, lhs: Value, rhs: Value) -> Value {
        self.lanewise_binary(lhs, rhs, |c, a, b| c.ins().srem(a, b))
    }

    fn create_mul_high(&mut self, lhs: Value, rhs: Value, signed: bool) -> Value {
        self.lanewise_binary(lhs, rhs, move |c, a, b| lower::mul_high(c, a, b, signed))
    }

    fn create_add_sat(&mut self, lhs: Value, rhs: Value, signed: bool) -> Value {
        let ty = self.ty(lhs);
        if lower::has_native_saturation(ty) {
            self.binary(lhs, rhs, |c, a, b| if signed { c.ins().sadd_sat(a, b) } else { c.ins().uadd_sat(a, b) })
        } else {
            self.lanewise_binary(lhs, rhs, move |c, a, b| lower::add_sat(c, a, b, signed))
        }
    }

    fn create_sub_sat(&mut self, lhs: Value, rhs: Value, signed: bool) -> Value {
        let ty = self.ty(lhs);
        if lower::has_native_saturation(ty) {
            self.binary(lhs, rhs, |c, a, b| if signed { c.ins().ssub_sat(a, b) } else { c.ins().usub_sat(a, b) })
        } else {
            self.lanewise_binary(lhs, rhs, move |c, a, b| lower::sub_sat(c, a, b, signed))
        }
    }

    fn create_average(&mut self, lhs: Value, rhs: Value) -> Value {
        if lower::has_native_saturation(self.ty(lhs)) {
            self.binary(lhs, rhs, |c, a, b| c.ins().avg_round(a, b))
        } else {
            self.binary(lhs, rhs, lower::average)
        }
    }

    fn create_min(&mut self, lhs: Value, rhs: Value, signed: bool) -> Value {
        let ty = self.ty(lhs);
        self.binary(lhs, rhs, |c, a, b| lower::min_max(c, ty, a, b, signed, true))
    }

    fn create_max(&mut self, lhs: Value, rhs: Value, signed: bool) -> Value {
        let ty = self.ty(lhs);
        self.binary(lhs, rhs, |c, a, b| lower::min_max(c, ty, a, b, signed, false))
    }

    fn create_fadd(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(lhs, rhs, |c, a, b| c.ins().fadd(a, b))
    }

    fn create_fsub(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(lhs, rhs, |c, a, b| c.ins().fsub(a, b))
    }

    fn create_fmul(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(lhs, rhs, |c, a, b| c.ins().fmul(a, b))
    }

    fn create_fdiv(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(lhs, rhs, |c, a, b| c.ins().fdiv(a, b))
    }

    fn create_frem(&mut self, lhs: Value, rhs: Value) -> Value {
        self.float_helper_binary(lhs, rhs, lower::binary_helper(false))
    }

    fn create_fmin(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(lhs, rhs, |c, a, b| c.ins().fmin(a, b))
    }

    fn create_fmax(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(lhs, rhs, |c, a, b| c.ins().fmax(a, b))
    }

    fn create_fabs(&mut self, value: Value) -> Value {
        self.unary(value, |c, x| c.ins().fabs(x))
    }

    fn create_sqrt(&mut self, value: Value) -> Value {
        self.unary(value, |c, x| c.ins().sqrt(x))
    }

    fn create_round(&mut self, value: Value, mode: RoundingMode) -> Value {
        self.unary(value, |c, x| match mode {
            RoundingMode::Nearest => c.ins().nearest(x),
            RoundingMode::Floor => c.ins().floor(x),
            RoundingMode::Ceil => c.ins().ceil(x),
            RoundingMode::Trunc => c.ins().trunc(x),
        })
    }

    fn create_fma(&mut self, a: Value, b: Value, c: Value) -> Value {
        let ty = self.ty(a);
        let (x, y, z) = (self.get(a), self.get(b), self.get(c));
        let result = self.cursor().ins().fma(x, y, z);
        self.local(result, ty)
    }

    fn create_math(&mut self, function: MathFunction, value: Value) -> Value {
        self.float_helper_unary(value, lower::math_helper(function))
    }

    fn create_pow(&mut self, lhs: Value, rhs: Value) -> Value {
        self.float_helper_binary(lhs, rhs, lower::binary_helper(true))
    }

    fn create_shl(&mut self, lhs: Value, rhs: Value) -> Value {
        if self.ty(rhs).is_vector() {
            self.lanewise_binary(lhs, rhs, |c, a, b| c.ins().ishl(a, b))
        } else {
            self.binary(lhs, rhs, |c, a, b| c.ins().ishl(a, b))
        }
    }

    fn create_lshr(&mut self, lhs: Value, rhs: Value) -> Value {
        if self.ty(rhs).is_vector() {
            self.lanewise_binary(lhs, rhs, |c, a, b| c.ins().ushr(a, b))
        } else {
            self.binary(lhs, rhs, |c, a, b| c.ins().ushr(a, b))
        }
    }

    fn create_ashr(&mut self, lhs: Value, rhs: Value) -> Value {
        if self.ty(rhs).is_vector() {
            self.lanewise_binary(lhs, rhs, |c, a, b| c.ins().sshr(a, b))
        } else {
            self.binary(lhs, rhs, |c, a, b| c.ins().sshr(a, b))
        }
    }

    fn create_and(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(lhs, rhs, |c, a, b| c.ins().band(a, b))
    }

    fn create_or(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(lhs, rhs, |c, a, b| c.ins().bor(a, b))
    }

    fn create_xor(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(lhs, rhs, |c, a, b| c.ins().bxor(a, b))
    }

    fn create_ctlz(&mut self, value: Value) -> Value {
        self.lanewise_unary(value, |c, x| c.ins().clz(x))
    }

    fn create_cttz(&mut self, value: Value) -> Value {
        self.lanewise_unary(value, |c, x| c.ins().ctz(x))
    }

    fn create_popcount(&mut self, value: Value) -> Value {
        if self.cl(self.ty(value)) == types::I8X16 {
            self.unary(value, |c, x| c.ins().popcnt(x))
        } else {
            self.lanewise_unary(value, |c, x| c.ins().popcnt(x))
        }
    }

    fn create_neg(&mut self, value: Value) -> Value {
        self.unary(value, |c, x| c.ins().ineg(x))
    }

    fn create_fneg(&mut self, value: Value) -> Value {
        self.unary(value, |c, x| c.ins().fneg(x))
    }

    fn create_not(&mut self, value: Value) -> Value {
        self.unary(value, |c, x| c.ins().bnot(x))
    }

    fn create_load(&mut self, ptr: Value, ty: Type, access: MemoryAccess) -> Value {
        let cl = self.cl(ty);
        let flags = access_flags(ty, access);
        if let Some(order) = access.order {
            trace_upgrade("atomic load", order);
        }
        let p = self.get(ptr);
        let mut cursor = self.cursor();
        let result = match access.order {
            Some(_) => cursor.ins().atomic_load(cl, MemFlags::new(), p),
            None if access.volatile => lower::volatile_load(&mut cursor, ty, cl, flags, p),
            None => lower::load(&mut cursor, ty, cl, flags, p),
        };
        self.local(result, ty)
    }

    fn create_store(&mut self, value: Value, ptr: Value, ty: Type, access: MemoryAccess) {
        let flags = access_flags(ty, access);
        if let Some(order) = access.order {
            trace_upgrade("atomic store", order);
        }
        let (x, p) = (self.get(value), self.get(ptr));
        let mut cursor = self.cursor();
        match access.order {
            Some(_) => {
                cursor.ins().atomic_store(MemFlags::new(), x, p);
            }
            None => lower::store(&mut cursor, ty, flags, x, p),
        }
    }

    fn create_gep(&mut self, ptr: Value, ty: Type, index: Value, unsigned_index: bool) -> Value {
        let pointer = self.pointer_type();
        let index_bits = self.ty(index).bits();
        let size = ty.bytes() as i64;
        let (p, i) = (self.get(ptr), self.get(index));

        let mut cursor = self.cursor();
        let i = if index_bits < pointer.bits() {
            if unsigned_index {
                cursor.ins().uextend(pointer, i)
            } else {
                cursor.ins().sextend(pointer, i)
            }
        } else {
            i
        };
        let offset = if size == 1 { i } else { cursor.ins().imul_imm(i, size) };
        let result = cursor.ins().iadd(p, offset);
        self.local(result, Type::PTR)
    }

    fn create_masked_load(&mut self, ptr: Value, ty: Type, mask: Value, _alignment: u32, zero_masked: bool) -> Value {
        let scratch = self.scratch_slot();
        let zero = self.vector_constant(ty, vec![0; 16]);
        let zero = self.get(zero);
        let element = self.cl(ty.element());
        let pointer = self.pointer_type();
        let (p, m) = (self.get(ptr), self.get(mask));

        let mut cursor = self.cursor();
        let result = lower::masked_load(&mut cursor, lower::MaskedAccess {
            ptr: p,
            mask: m,
            scratch,
            pointer,
            element,
            lanes: ty.lanes(),
        }, zero, zero_masked);
        self.local(result, ty)
    }

    fn create_masked_store(&mut self, ptr: Value, value: Value, mask: Value, _alignment: u32) {
        let ty = self.ty(value);
        let scratch = self.scratch_slot();
        let element = self.cl(ty.element());
        let pointer = self.pointer_type();
        let (p, x, m) = (self.get(ptr), self.get(value), self.get(mask));

        let mut cursor = self.cursor();
        lower::masked_store(&mut cursor, lower::MaskedAccess {
            ptr: p,
            mask: m,
            scratch,
            pointer,
            element,
            lanes: ty.lanes(),
        }, x);
    }

    fn create_fence(&mut self, order: MemoryOrder) {
        trace_upgrade("fence", order);
        self.cursor().ins().fence();
    }

    fn create_atomic_add(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value {
        self.rmw(AtomicRmwOp::Add, ptr, value, order)
    }

    fn create_atomic_sub(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value {
        self.rmw(AtomicRmwOp::Sub, ptr, value, order)
    }

    fn create_atomic_and(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value {
        self.rmw(AtomicRmwOp::And, ptr, value, order)
    }

    fn create_atomic_or(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value {
        self.rmw(AtomicRmwOp::Or, ptr, value, order)
    }

    fn create_atomic_xor(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value {
        self.rmw(AtomicRmwOp::Xor, ptr, value, order)
    }

    fn create_atomic_min(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value {
        self.rmw(AtomicRmwOp::Smin, ptr, value, order)
    }

    fn create_atomic_max(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value {
        self.rmw(AtomicRmwOp::Smax, ptr, value, order)
    }

    fn create_atomic_umin(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value {
        self.rmw(AtomicRmwOp::Umin, ptr, value, order)
    }

    fn create_atomic_umax(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value {
        self.rmw(AtomicRmwOp::Umax, ptr, value, order)
    }

    fn create_atomic_exchange(&mut self, ptr: Value, value: Value, order: MemoryOrder) -> Value {
        self.rmw(AtomicRmwOp::Xchg, ptr, value, order)
    }

    fn create_atomic_compare_exchange(
        &mut self,
        ptr: Value,
        value: Value,
        compare: Value,
        order_equal: MemoryOrder,
        order_unequal: MemoryOrder,
    ) -> Value {
        trace_upgrade("compare exchange", order_equal);
        trace_upgrade("compare exchange failure", order_unequal);
        let ty = self.ty(value);
        let (p, x, expected) = (self.get(ptr), self.get(value), self.get(compare));
        let result = self.cursor().ins().atomic_cas(MemFlags::new(), p, expected, x);
        self.local(result, ty)
    }

    fn create_trunc(&mut self, value: Value, dest: Type) -> Value {
        if self.cl(self.ty(value)) == self.cl(dest) {
            return self.alias(value, dest);
        }
        self.cast(value, dest, |c, cl, x| c.ins().ireduce(cl, x))
    }

    fn create_zext(&mut self, value: Value, dest: Type) -> Value {
        if self.cl(self.ty(value)) == self.cl(dest) {
            return self.alias(value, dest);
        }
        self.cast(value, dest, |c, cl, x| c.ins().uextend(cl, x))
    }

    fn create_sext(&mut self, value: Value, dest: Type) -> Value {
        if self.cl(self.ty(value)) == self.cl(dest) {
            return self.alias(value, dest);
        }
        self.cast(value, dest, |c, cl, x| c.ins().sextend(cl, x))
    }

    fn create_fp_to_si(&mut self, value: Value, dest: Type) -> Value {
        self.cast(value, dest, |c, cl, x| lower::float_to_int(c, cl, x, true))
    }

    fn create_fp_to_ui(&mut self, value: Value, dest: Type) -> Value {
        self.cast(value, dest, |c, cl, x| lower::float_to_int(c, cl, x, false))
    }

    fn create_si_to_fp(&mut self, value: Value, dest: Type) -> Value {
        let from = self.ty(value);
        self.cast(value, dest, move |c, cl, x| lower::int_to_float(c, cl, x, from, true))
    }

    fn create_ui_to_fp(&mut self, value: Value, dest: Type) -> Value {
        let from = self.ty(value);
        self.cast(value, dest, move |c, cl, x| lower::int_to_float(c, cl, x, from, false))
    }

    fn create_bitcast(&mut self, value: Value, dest: Type) -> Value {
        if self.cl(self.ty(value)) == self.cl(dest) {
            return self.alias(value, dest);
        }
        self.cast(value, dest, |c, cl, x| c.ins().bitcast(cl, lower::little_endian(), x))
    }

    fn create_icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value {
        let ty = Self::comparison_type(self.ty(lhs));
        let (a, b) = (self.get(lhs), self.get(rhs));
        let result = self.cursor().ins().icmp(int_cc(pred), a, b);
        self.local(result, ty)
    }

    fn create_fcmp(&mut self, pred: FloatPredicate, lhs: Value, rhs: Value) -> Value {
        let ty = Self::comparison_type(self.ty(lhs));
        let (a, b) = (self.get(lhs), self.get(rhs));
        let result = lower::fcmp(&mut self.cursor(), pred, a, b);
        self.local(result, ty)
    }

    fn create_select(&mut self, cond: Value, if_true: Value, if_false: Value) -> Value {
        let ty = self.ty(if_true);
        let (c, a, b) = (self.get(cond), self.get(if_true), self.get(if_false));
        let result = self.cursor().ins().select(c, a, b);
        self.local(result, ty)
    }

    fn create_mask_select(&mut self, mask: Value, if_true: Value, if_false: Value) -> Value {
        let ty = self.ty(if_true);
        let cl = self.cl(ty);
        let mask_cl = self.cl(self.ty(mask));
        let (m, a, b) = (self.get(mask), self.get(if_true), self.get(if_false));

        let mut cursor = self.cursor();
        let m = if mask_cl == cl { m } else { cursor.ins().bitcast(cl, lower::little_endian(), m) };
        let result = cursor.ins().bitselect(m, a, b);
        self.local(result, ty)
    }

    fn create_extract_element(&mut self, vector: Value, ty: Type, index: u32) -> Value {
        let v = self.get(vector);
        let result = self.cursor().ins().extractlane(v, index as u8);
        self.local(result, ty)
    }

    fn create_insert_element(&mut self, vector: Value, element: Value, index: u32) -> Value {
        let ty = self.ty(vector);
        let (v, e) = (self.get(vector), self.get(element));
        let result = self.cursor().ins().insertlane(v, e, index as u8);
        self.local(result, ty)
    }

    fn create_shuffle_vector(&mut self, lhs: Value, rhs: Value, select: &[u32]) -> Value {
        let ty = self.ty(lhs);
        let cl = self.cl(ty);
        let lanes = ty.lanes();
        let lane_bytes = ty.element().bytes();
        // Lanes of `rhs` start at the register's lane count, not the pack's.
        let register_lanes = 16 / lane_bytes;
        let mut bytes: Vec<u8> = select
            .iter()
            .map(|&lane| if lane < lanes { lane } else { lane - lanes + register_lanes })
            .flat_map(|lane| (0..lane_bytes).map(move |byte| (lane * lane_bytes + byte) as u8))
            .collect();
        bytes.resize(16, 0);
        let (a, b) = (self.get(lhs), self.get(rhs));

        let mut cursor = self.cursor();
        let immediate = cursor.func.dfg.immediates.push(ConstantData::from(bytes));
        let result = if cl == types::I8X16 {
            cursor.ins().shuffle(a, b, immediate)
        } else {
            let flags = lower::little_endian();
            let a = cursor.ins().bitcast(types::I8X16, flags, a);
            let b = cursor.ins().bitcast(types::I8X16, flags, b);
            let bytes = cursor.ins().shuffle(a, b, immediate);
            cursor.ins().bitcast(cl, flags, bytes)
        };
        self.local(result, ty)
    }

    fn create_splat(&mut self, ty: Type, scalar: Value) -> Value {
        let cl = self.cl(ty);
        let x = self.get(scalar);
        let result = self.cursor().ins().splat(cl, x);
        self.local(result, ty)
    }

    fn create_narrow(&mut self, lhs: Value, rhs: Value, signed_result: bool) -> Value {
        let from = self.ty(lhs);
        let ty = lower::narrowed(from, signed_result);
        let (a, b) = (self.get(lhs), self.get(rhs));
        let mut cursor = self.cursor();
        let result = if signed_result {
            cursor.ins().snarrow(a, b)
        } else {
            cursor.ins().unarrow(a, b)
        };
        self.local(result, ty)
    }

    fn create_widen(&mut self, value: Value, high: bool, signed: bool) -> Value {
        let ty = lower::widened(self.ty(value));
        let x = self.get(value);
        let mut cursor = self.cursor();
        let result = match (signed, high) {
            (true, false) => cursor.ins().swiden_low(x),
            (true, true) => cursor.ins().swiden_high(x),
            (false, false) => cursor.ins().uwiden_low(x),
            (false, true) => cursor.ins().uwiden_high(x),
        };
        self.local(result, ty)
    }

    fn create_sign_mask(&mut self, value: Value) -> Value {
        let ty = self.ty(value);
        let x = self.get(value);
        let mut cursor = self.cursor();
        let x = if ty.is_float() {
            cursor.ins().bitcast(types::I32X4, lower::little_endian(), x)
        } else {
            x
        };
        let mut result = cursor.ins().vhigh_bits(types::I32, x);
        if ty.is_half_vector() {
            result = cursor.ins().band_imm(result, (1i64 << ty.lanes()) - 1);
        }
        self.local(result, Type::I32)
    }

    fn create_constant_int(&mut self, ty: Type, value: i64) -> Value {
        self.push(Def::Int(value), ty)
    }

    fn create_constant_float(&mut self, ty: Type, value: f32) -> Value {
        self.push(Def::Float(value.to_bits()), ty)
    }

    fn create_constant_vector(&mut self, ty: Type, lanes: &[i64]) -> Value {
        assert_eq!(lanes.len(), ty.lanes() as usize, "{ty} constant needs {} lanes", ty.lanes());
        let lane_bytes = ty.element().bytes() as usize;
        let bytes = lanes
            .iter()
            .flat_map(|lane| lane.to_le_bytes().into_iter().take(lane_bytes))
            .collect();
        self.vector_constant(ty, bytes)
    }

    fn create_constant_float_vector(&mut self, ty: Type, lanes: &[f32]) -> Value {
        assert_eq!(lanes.len(), ty.lanes() as usize, "{ty} constant needs {} lanes", ty.lanes());
        let bytes = lanes.iter().flat_map(|lane| lane.to_le_bytes()).collect();
        self.vector_constant(ty, bytes)
    }

    fn create_constant_pointer(&mut self, address: usize) -> Value {
        self.push(Def::Int(address as i64), Type::PTR)
    }

    fn create_null_value(&mut self, ty: Type) -> Value {
        if ty.is_vector() {
            self.vector_constant(ty, vec![0; 16])
        } else if ty.is_float() {
            self.push(Def::Float(0), ty)
        } else {
            self.push(Def::Int(0), ty)
        }
    }

    fn create_call(&mut self, address: usize, params: &[Type], ret: Option<Type>, args: &[Value]) -> Option<Value> {
        let signature = self.signature(params, ret);
        let signature = self.func.import_signature(signature);
        let pointer = self.pointer_type();
        let args: Vec<ir::Value> = args.iter().map(|&arg| self.get(arg)).collect();

        let mut cursor = self.cursor();
        let callee = cursor.ins().iconst(pointer, address as i64);
        let call = cursor.ins().call_indirect(signature, callee, &args);
        let result = cursor.func.dfg.inst_results(call).first().copied();

        match (result, ret) {
            (Some(result), Some(ty)) => Some(self.local(result, ty)),
            _ => None,
        }
    }

    fn create_nop(&mut self) {
        self.cursor().ins().nop();
    }

    fn acquire_routine(&mut self, name: &str) -> ReactorResult<CompiledCode> {
        self.custom_position = None;
        let ret = self.ret.map(|ty| self.cl(ty));
        let open: Vec<Block> = self
            .func
            .layout
            .blocks()
            .filter(|&block| !self.is_terminated(block))
            .collect();
        if !open.is_empty() {
            log::trace!("closing {} open blocks of {}", open.len(), name);
        }
        for block in open {
            let mut cursor = FuncCursor::new(&mut self.func).at_bottom(block);
            lower::default_return(&mut cursor, ret);
        }

        log::trace!("Cranelift IR for {}:\n{}", name, self.func.display());
        let func = std::mem::replace(&mut self.func, Function::new());
        jit::compile(&self.isa, name, func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weaker_orders_are_upgraded() {
        assert!(!is_upgraded(MemoryOrder::SequentiallyConsistent));
        for order in [MemoryOrder::Relaxed, MemoryOrder::Acquire, MemoryOrder::Release, MemoryOrder::AcquireRelease] {
            assert!(is_upgraded(order), "{order:?}");
        }
    }

    #[test]
    fn test_access_flags() {
        let natural = MemoryAccess::default();
        assert!(access_flags(Type::I32, natural).aligned());
        assert!(access_flags(Type::F32, MemoryAccess { alignment: 8, ..natural }).aligned());
        assert!(!access_flags(Type::I32, MemoryAccess { alignment: 1, ..natural }).aligned());
        assert!(!access_flags(Type::I32X4, natural).aligned());
        assert!(!access_flags(Type::I32, natural).readonly());
    }
}

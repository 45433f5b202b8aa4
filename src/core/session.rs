// This module provides the trace session, the explicit context object that every
// construction call goes through. It owns the backend behind the seam, the variable table
// with its pending set, the bookkeeping that maps each block-local value to the block that
// defined it, the constant data blobs that the finished routine must keep alive, and the
// optional debug-info builder. Instruction emission funnels through instr/instr_void so
// that operand checks, debug locations and statistics happen in one place. Block switches,
// branches and returns live here as well because they drive the materialization protocol:
// every branch and every block switch first materializes all pending variables, a return
// discards them. finalize hands the function to the backend and wraps the machine code in
// a Routine. A session builds exactly one function; once finalized every further
// construction call panics. SessionStats records instruction counts, blocks, variables
// and code size, with a Display impl for tools.

//! Trace session management.
//!
//! The session replaces ambient global state: the pending variable set and
//! the debug scope stack are fields of the session, and the session's
//! lifetime is the lifetime of the routine under construction.

use super::backend::{Backend, BasicBlock, Value};
use super::config::Config;
use super::error::ReactorResult;
use super::types::Type;
use super::variable::VariableTable;
use crate::routine::Routine;
use hashbrown::{HashMap, HashSet};
use std::cell::RefCell;
use std::fmt;

/// Per-function trace state that is not owned by the backend.
#[derive(Default)]
struct TraceState {
    params: Vec<Type>,
    ret: Option<Type>,
    block: Option<BasicBlock>,
    /// Defining block of every block-local value.
    value_blocks: HashMap<Value, BasicBlock>,
    stack_addresses: HashSet<Value>,
    arguments: HashMap<usize, Value>,
}

/// The context a routine is traced in.
pub struct Session {
    backend: RefCell<Option<Box<dyn Backend>>>,
    config: Config,
    trace: RefCell<TraceState>,
    pub(crate) variables: RefCell<VariableTable>,
    stats: RefCell<SessionStats>,
    constant_data: RefCell<Vec<Box<[u8]>>>,
    #[cfg(feature = "debug-info")]
    pub(crate) debug: RefCell<Option<crate::debug::DebugInfoBuilder>>,
}

impl Session {
    /// Create a session around `backend`. Call [`Session::begin_function`] before tracing.
    pub fn new(backend: Box<dyn Backend>, config: Config) -> Self {
        #[cfg(feature = "debug-info")]
        let debug = config
            .debug_info
            .then(|| crate::debug::DebugInfoBuilder::new(Box::new(crate::debug::HostBacktrace::new())));

        Self {
            backend: RefCell::new(Some(backend)),
            config,
            trace: RefCell::new(TraceState::default()),
            variables: RefCell::new(VariableTable::default()),
            stats: RefCell::new(SessionStats::default()),
            constant_data: RefCell::new(Vec::new()),
            #[cfg(feature = "debug-info")]
            debug: RefCell::new(debug),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Trace with `builder` instead of the host-backtrace builder `Config::debug_info` selects.
    #[cfg(feature = "debug-info")]
    pub fn install_debug_info(&self, builder: crate::debug::DebugInfoBuilder) {
        *self.debug.borrow_mut() = Some(builder);
    }

    /// Declare the signature of the function being traced and enter its entry block.
    pub fn begin_function(&self, params: &[Type], ret: Option<Type>) {
        for param in params {
            assert!(
                !param.is_vector(),
                "routine parameters must be scalars or pointers, got {param}"
            );
        }
        if let Some(ty) = ret {
            assert!(!ty.is_vector(), "routine return must be a scalar or pointer, got {ty}");
        }

        let entry = self.with_backend(|backend| backend.create_function(params, ret));
        let mut trace = self.trace.borrow_mut();
        assert!(trace.block.is_none(), "a session traces a single function");
        trace.params = params.to_vec();
        trace.ret = ret;
        trace.block = Some(entry);
        self.stats.borrow_mut().blocks_created += 1;
        log::debug!("Begin function ({} params, returns {:?})", params.len(), ret);
    }

    pub fn is_finalized(&self) -> bool {
        self.backend.borrow().is_none()
    }

    pub fn return_type(&self) -> Option<Type> {
        self.trace.borrow().ret
    }

    pub(crate) fn with_backend<R>(&self, f: impl FnOnce(&mut dyn Backend) -> R) -> R {
        let mut guard = self.backend.borrow_mut();
        match guard.as_deref_mut() {
            Some(backend) => f(backend),
            None => panic!("routine already finalized; no further code can be traced"),
        }
    }

    /// Assert that `operands` may be used in the current block.
    pub(crate) fn check_operands(&self, operands: &[Value]) {
        let trace = self.trace.borrow();
        let Some(current) = trace.block else {
            panic!("no function under construction; call begin_function first");
        };
        for operand in operands {
            if let Some(&defined_in) = trace.value_blocks.get(operand) {
                assert!(
                    defined_in == current,
                    "{operand} defined in {defined_in} is used in {current}; \
                     values cross blocks only through variables"
                );
            }
        }
    }

    /// Emit one value-producing instruction.
    pub(crate) fn instr(
        &self,
        op: &'static str,
        operands: &[Value],
        f: impl FnOnce(&mut dyn Backend) -> Value,
    ) -> Value {
        self.check_operands(operands);
        let value = self.with_backend(|backend| {
            self.update_location(backend);
            f(backend)
        });

        let mut trace = self.trace.borrow_mut();
        if let Some(block) = trace.block {
            trace.value_blocks.insert(value, block);
        }
        drop(trace);

        self.record_instruction(op);
        log::trace!("{value} = {op}");
        value
    }

    /// Emit one instruction without a result.
    pub(crate) fn instr_void(&self, op: &'static str, operands: &[Value], f: impl FnOnce(&mut dyn Backend)) {
        self.check_operands(operands);
        self.with_backend(|backend| {
            self.update_location(backend);
            f(backend)
        });
        self.record_instruction(op);
        log::trace!("{op}");
    }

    /// Produce a value usable from any block: constants, arguments, stack addresses.
    pub(crate) fn free_value(&self, f: impl FnOnce(&mut dyn Backend) -> Value) -> Value {
        let value = self.with_backend(f);
        self.stats.borrow_mut().constants += 1;
        value
    }

    fn record_instruction(&self, op: &'static str) {
        let mut stats = self.stats.borrow_mut();
        stats.instructions += 1;
        *stats.instruction_counts.entry(op).or_insert(0) += 1;
    }

    #[cfg(feature = "debug-info")]
    fn update_location(&self, backend: &mut dyn Backend) {
        if let Some(debug) = self.debug.borrow_mut().as_mut() {
            debug.emit_location(backend);
        }
    }

    #[cfg(not(feature = "debug-info"))]
    fn update_location(&self, _backend: &mut dyn Backend) {}

    /// Offer a freshly produced value to the debug-info bridge as a named local.
    pub(crate) fn debug_variable(&self, value: Value) {
        #[cfg(feature = "debug-info")]
        {
            let mut debug = self.debug.borrow_mut();
            if let Some(debug) = debug.as_mut() {
                let is_address = self.is_stack_address(value);
                let ty = self.with_backend(|backend| backend.value_type(value));
                self.with_backend(|backend| debug.emit_variable(backend, value, ty, is_address));
            }
        }
        #[cfg(not(feature = "debug-info"))]
        let _ = value;
    }

    /// Typed value of argument `index`.
    pub fn argument(&self, index: usize, ty: Type) -> Value {
        let mut trace = self.trace.borrow_mut();
        let Some(&declared) = trace.params.get(index) else {
            panic!("argument {index} out of range ({} parameters)", trace.params.len());
        };
        assert!(
            declared.storage_eq(ty) && declared.is_signed() == ty.is_signed(),
            "argument {index} is declared as {declared}, accessed as {ty}"
        );
        if let Some(&value) = trace.arguments.get(&index) {
            return value;
        }
        drop(trace);

        let value = self.with_backend(|backend| backend.argument(index));
        self.trace.borrow_mut().arguments.insert(index, value);
        value
    }

    /// Address of a fresh stack slot, not tracked as a variable.
    pub fn allocate_stack(&self, ty: Type, array_size: usize) -> Value {
        let address = self.with_backend(|backend| backend.allocate_stack_variable(ty, array_size));
        self.trace.borrow_mut().stack_addresses.insert(address);
        self.stats.borrow_mut().stack_slots += 1;
        address
    }

    pub(crate) fn is_stack_address(&self, value: Value) -> bool {
        self.trace.borrow().stack_addresses.contains(&value)
    }

    /// Embed `bytes` in the routine and return their address.
    ///
    /// The data lives as long as the finalized routine.
    pub fn constant_data(&self, bytes: &[u8]) -> Value {
        let blob: Box<[u8]> = bytes.into();
        let address = blob.as_ptr() as usize;
        self.constant_data.borrow_mut().push(blob);
        self.free_value(|backend| backend.create_constant_pointer(address))
    }

    // Blocks and branches

    pub fn create_block(&self) -> BasicBlock {
        self.stats.borrow_mut().blocks_created += 1;
        self.with_backend(|backend| backend.create_basic_block())
    }

    pub fn insert_block(&self) -> BasicBlock {
        match self.trace.borrow().block {
            Some(block) => block,
            None => panic!("no function under construction; call begin_function first"),
        }
    }

    /// Continue emission in `block`, materializing pending variables first.
    pub fn set_insert_block(&self, block: BasicBlock) {
        self.materialize_all();
        self.with_backend(|backend| backend.set_insert_block(block));
        self.trace.borrow_mut().block = Some(block);
    }

    pub fn branch(&self, dest: BasicBlock) {
        self.materialize_all();
        self.instr_void("br", &[], |backend| backend.create_br(dest));
    }

    pub fn cond_branch(&self, cond: Value, if_true: BasicBlock, if_false: BasicBlock) {
        self.materialize_all();
        self.instr_void("condbr", &[cond], |backend| backend.create_cond_br(cond, if_true, if_false));
    }

    pub fn switch_branch(&self, control: Value, default: BasicBlock, cases: &[(i64, BasicBlock)]) {
        self.materialize_all();
        self.instr_void("switch", &[control], |backend| backend.create_switch(control, default, cases));
    }

    /// Return `value` and continue in a fresh, unreachable block.
    pub fn return_value(&self, value: Value) {
        let ret = self.return_type();
        let ty = self.with_backend(|backend| backend.value_type(value));
        match ret {
            Some(expected) => assert!(
                expected.storage_eq(ty),
                "function returns {expected}, got a {ty} value"
            ),
            None => panic!("function returns nothing, got a {ty} value"),
        }
        self.instr_void("ret", &[value], |backend| backend.create_ret(value));
        self.after_return();
    }

    pub fn return_void(&self) {
        if let Some(expected) = self.return_type() {
            panic!("function returns {expected}; a value is required");
        }
        self.instr_void("ret", &[], |backend| backend.create_ret_void());
        self.after_return();
    }

    fn after_return(&self) {
        self.kill_unmaterialized();
        let unreachable = self.create_block();
        self.set_insert_block(unreachable);
    }

    /// Finish tracing and compile the function.
    ///
    /// On error the session is consumed all the same: no routine exists.
    pub fn finalize(&self, name: &str) -> ReactorResult<Routine> {
        self.materialize_all();

        let mut backend = match self.backend.borrow_mut().take() {
            Some(backend) => backend,
            None => panic!("routine {name} already finalized"),
        };

        #[cfg(feature = "debug-info")]
        let debug_info = self
            .debug
            .borrow_mut()
            .take()
            .map(|builder| builder.finalize(backend.as_mut()));

        self.variables.borrow_mut().clear_pending();

        let code = backend.acquire_routine(name)?;
        let code_size = code.bytes.len();
        {
            let mut stats = self.stats.borrow_mut();
            stats.code_size = code_size;
            stats.routine_name = name.to_string();
        }
        log::debug!("Finalized routine {} with {} backend ({} bytes)", name, backend.name(), code_size);

        let constants = std::mem::take(&mut *self.constant_data.borrow_mut());
        let routine = Routine::new(name, code, constants, self.stats());
        #[cfg(feature = "debug-info")]
        let routine = routine.with_debug_info(debug_info);
        Ok(routine)
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }

    pub(crate) fn record_materialized(&self) {
        self.stats.borrow_mut().variables_materialized += 1;
    }

    pub(crate) fn record_declared(&self) {
        self.stats.borrow_mut().variables_declared += 1;
    }

    pub(crate) fn record_discarded(&self, count: usize) {
        self.stats.borrow_mut().variables_discarded += count;
    }
}

/// Trace statistics of one session.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    pub routine_name: String,
    pub instructions: usize,
    pub instruction_counts: HashMap<&'static str, usize>,
    pub blocks_created: usize,
    pub constants: usize,
    pub stack_slots: usize,
    pub variables_declared: usize,
    pub variables_materialized: usize,
    /// Pending variables dropped by a return.
    pub variables_discarded: usize,
    pub code_size: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trace Session Statistics:")?;
        if !self.routine_name.is_empty() {
            writeln!(f, "  Routine: {}", self.routine_name)?;
        }
        writeln!(f, "  Instructions traced: {}", self.instructions)?;
        writeln!(f, "  Blocks created: {}", self.blocks_created)?;
        writeln!(f, "  Constants: {}", self.constants)?;
        writeln!(f, "  Stack slots: {}", self.stack_slots)?;
        writeln!(
            f,
            "  Variables: {} declared, {} materialized, {} discarded",
            self.variables_declared, self.variables_materialized, self.variables_discarded
        )?;
        writeln!(f, "  Code size: {} bytes", self.code_size)?;

        if !self.instruction_counts.is_empty() {
            writeln!(f, "  Instruction breakdown:")?;
            let mut sorted: Vec<_> = self.instruction_counts.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

            for (op, count) in sorted.into_iter().take(10) {
                writeln!(f, "    {}: {}", op, count)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_display() {
        let mut stats = SessionStats {
            routine_name: "blend".to_string(),
            instructions: 3,
            code_size: 64,
            ..SessionStats::default()
        };
        stats.instruction_counts.insert("add", 2);
        stats.instruction_counts.insert("ret", 1);

        let output = format!("{}", stats);
        assert!(output.contains("Routine: blend"));
        assert!(output.contains("Instructions traced: 3"));
        assert!(output.contains("add: 2"));
        assert!(output.contains("Code size: 64 bytes"));
    }
}

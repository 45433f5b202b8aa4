// This module implements structured control flow on top of the session's block and branch
// primitives. Each construct takes closures for its condition and body, creates the blocks
// it needs, and leaves the session positioned at the block after the construct, so traced
// code nests the same way host code does. Every branch goes through the session, which
// materializes pending variables first; values therefore cross construct boundaries only
// through variables. if_then returns a guard: dropping it closes a plain if, calling
// otherwise on it adds the else arm. Return ends the current block and continues in a fresh
// unreachable block so tracing can carry on after an early return.

//! Structured control flow: if/else, loops, switch and return.

use crate::core::{BasicBlock, Session};
use crate::expr::{Bool, Int, IntoRValue, RValue, ReactorType};

/// An `if` whose false edge is still open.
///
/// Dropping it ends the construct; [`IfElse::otherwise`] adds an else arm.
pub struct IfElse<'s> {
    session: &'s Session,
    false_block: BasicBlock,
    closed: bool,
}

impl<'s> IfElse<'s> {
    /// Trace the else arm.
    pub fn otherwise(mut self, arm: impl FnOnce()) {
        let session = self.session;
        self.closed = true;

        let end = session.create_block();
        session.branch(end);
        session.set_insert_block(self.false_block);
        arm();
        session.branch(end);
        session.set_insert_block(end);
    }
}

impl<'s> Drop for IfElse<'s> {
    fn drop(&mut self) {
        if self.closed || std::thread::panicking() {
            return;
        }
        self.session.branch(self.false_block);
        self.session.set_insert_block(self.false_block);
    }
}

impl Session {
    /// `if cond { then }`, with an optional `.otherwise(..)`.
    pub fn if_then<'s>(&'s self, cond: impl IntoRValue<'s, Bool>, then: impl FnOnce()) -> IfElse<'s> {
        let cond = cond.into_rvalue(self).value();
        let true_block = self.create_block();
        let false_block = self.create_block();

        self.cond_branch(cond, true_block, false_block);
        self.set_insert_block(true_block);
        then();

        IfElse {
            session: self,
            false_block,
            closed: false,
        }
    }

    /// `while cond() { body() }`. The condition is traced in its own block.
    pub fn while_loop<'s>(&'s self, mut cond: impl FnMut() -> RValue<'s, Bool>, mut body: impl FnMut()) {
        let header = self.create_block();
        self.branch(header);
        self.set_insert_block(header);

        let test = cond().value();
        let body_block = self.create_block();
        let end = self.create_block();
        self.cond_branch(test, body_block, end);

        self.set_insert_block(body_block);
        body();
        self.branch(header);

        self.set_insert_block(end);
    }

    /// `init(); while cond() { body(); step() }`.
    pub fn for_loop<'s>(
        &'s self,
        init: impl FnOnce(),
        cond: impl FnMut() -> RValue<'s, Bool>,
        mut step: impl FnMut(),
        mut body: impl FnMut(),
    ) {
        init();
        self.while_loop(cond, || {
            body();
            step();
        });
    }

    /// `do { body() } until cond()`: the body runs at least once.
    pub fn do_until<'s>(&'s self, mut body: impl FnMut(), mut cond: impl FnMut() -> RValue<'s, Bool>) {
        let body_block = self.create_block();
        self.branch(body_block);
        self.set_insert_block(body_block);

        body();
        let done = cond().value();
        let end = self.create_block();
        self.cond_branch(done, end, body_block);

        self.set_insert_block(end);
    }

    /// Multi-way branch on `control`.
    ///
    /// `arm` is traced once per case with `Some(case)` and once for the
    /// default with `None`. Arms do not fall through.
    pub fn switch<'s>(
        &'s self,
        control: impl IntoRValue<'s, Int>,
        cases: &[i32],
        mut arm: impl FnMut(Option<i32>),
    ) {
        for (i, case) in cases.iter().enumerate() {
            assert!(!cases[..i].contains(case), "duplicate switch case {case}");
        }
        let control = control.into_rvalue(self).value();
        let default = self.create_block();
        let end = self.create_block();

        let targets: Vec<(i64, BasicBlock)> = cases
            .iter()
            .map(|&case| (case as i64, self.create_block()))
            .collect();
        self.switch_branch(control, default, &targets);

        for (&case, &(_, block)) in cases.iter().zip(&targets) {
            self.set_insert_block(block);
            arm(Some(case));
            self.branch(end);
        }

        self.set_insert_block(default);
        arm(None);
        self.branch(end);

        self.set_insert_block(end);
    }

    /// Return `value` from the routine.
    pub fn ret<'s, T: ReactorType>(&'s self, value: impl IntoRValue<'s, T>) {
        let value = value.into_rvalue(self).value();
        self.return_value(value);
    }

    /// Return from a routine without a result.
    pub fn ret_void(&self) {
        self.return_void();
    }
}

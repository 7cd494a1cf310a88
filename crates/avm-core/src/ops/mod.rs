//! Opcode dispatch. Each opcode is implemented as a small function that
//! operates directly on [`MachineState`]; `dispatch` is the single
//! entry point `step` calls into, matched exhaustively over every
//! [`OpCode`] variant so adding an opcode to `code.rs` without wiring
//! it up here is a compile error rather than a silent no-op.

mod arithmetic;
mod bitwise;
mod control;
mod stackops;
mod system;

use std::rc::Rc;

use crate::code::OpCode;
use crate::error::VmError;
use crate::machine::{DispatchOutcome, MachineState};
use crate::value::TupleBody;
use crate::U256;

pub(crate) fn dispatch(m: &mut MachineState, op: OpCode) -> Result<DispatchOutcome, VmError> {
    use OpCode::*;
    match op {
        ADD => arithmetic::add(m),
        MUL => arithmetic::mul(m),
        SUB => arithmetic::sub(m),
        DIV => arithmetic::div(m),
        SDIV => arithmetic::sdiv(m),
        MOD => arithmetic::modulo(m),
        SMOD => arithmetic::smod(m),
        ADDMOD => arithmetic::addmod(m),
        MULMOD => arithmetic::mulmod(m),
        EXP => arithmetic::exp(m),

        LT => bitwise::lt(m),
        GT => bitwise::gt(m),
        SLT => bitwise::slt(m),
        SGT => bitwise::sgt(m),
        EQ => bitwise::eq(m),
        ISZERO => bitwise::iszero(m),
        AND => bitwise::and(m),
        OR => bitwise::or(m),
        XOR => bitwise::xor(m),
        NOT => bitwise::not(m),
        BYTE => bitwise::byte(m),
        SIGNEXTEND => bitwise::signextend(m),

        HASH => system::hash_op(m),
        TYPE => system::type_op(m),

        POP => control::pop(m),
        SPUSH => control::spush(m),
        RPUSH => control::rpush(m),
        RSET => control::rset(m),
        JUMP => control::jump(m),
        CJUMP => control::cjump(m),
        STACKEMPTY => control::stackempty(m),
        PCPUSH => control::pcpush(m),
        AUXPUSH => control::auxpush(m),
        AUXPOP => control::auxpop(m),
        AUXSTACKEMPTY => control::auxstackempty(m),
        NOP => control::nop(m),
        ERRPUSH => control::errpush(m),
        ERRSET => control::errset(m),

        DUP0 => stackops::dup0(m),
        DUP1 => stackops::dup1(m),
        DUP2 => stackops::dup2(m),
        SWAP1 => stackops::swap1(m),
        SWAP2 => stackops::swap2(m),

        TGET => stackops::tget(m),
        TSET => stackops::tset(m),
        TLEN => stackops::tlen(m),

        BREAKPOINT => system::breakpoint(m),
        LOG => system::log(m),
        DEBUG => system::debug(m),

        SEND => system::send(m),
        NBSEND => system::nbsend(m),
        GETTIME => system::gettime(m),
        INBOX => system::inbox(m),
        ERROR => system::error_op(m),
        HALT => system::halt(m),
    }
}

/// Pops the top of stack and requires it to be an integer.
pub(crate) fn pop_int(m: &mut MachineState) -> Result<U256, VmError> {
    let v = m.stack.pop()?;
    v.as_int()
        .ok_or_else(|| VmError::TypeMismatch { expected: "integer", found: v.type_tag() })
}

/// Pops the top of stack and requires it to be a tuple, returning its
/// body directly (avoids an extra clone of the children for callers
/// that only read them).
pub(crate) fn pop_tuple(m: &mut MachineState) -> Result<Rc<TupleBody>, VmError> {
    let v = m.stack.pop()?;
    match v {
        crate::value::Value::Tuple(t) => Ok(t),
        other => Err(VmError::TypeMismatch { expected: "tuple", found: other.type_tag() }),
    }
}

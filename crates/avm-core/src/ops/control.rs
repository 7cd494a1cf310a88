//! Stack plumbing, control flow, and the register/static/errpc slots.

use super::pop_int;
use crate::error::VmError;
use crate::machine::{DispatchOutcome, MachineState};
use crate::value::Value;

pub(super) fn pop(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    m.stack.pop()?;
    Ok(DispatchOutcome::Advance)
}

pub(super) fn spush(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let v = m.static_val.clone();
    m.stack.push(&m.pool, v);
    Ok(DispatchOutcome::Advance)
}

pub(super) fn rpush(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let v = m.register.clone();
    m.stack.push(&m.pool, v);
    Ok(DispatchOutcome::Advance)
}

pub(super) fn rset(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let v = m.stack.pop()?;
    m.register = v;
    Ok(DispatchOutcome::Advance)
}

fn pop_code_point_target(m: &mut MachineState) -> Result<crate::code::CodePoint, VmError> {
    let v = m.stack.pop()?;
    match v {
        Value::CodePoint(cp) => Ok((*cp).clone()),
        other => Err(VmError::TypeMismatch { expected: "code point", found: other.type_tag() }),
    }
}

pub(super) fn jump(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let cp = pop_code_point_target(m)?;
    m.pc = cp.pc;
    Ok(DispatchOutcome::Jumped)
}

/// Pops the condition (top of stack) then the jump target beneath it;
/// jumps only if the condition is nonzero.
pub(super) fn cjump(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let cond = pop_int(m)?;
    let cp = pop_code_point_target(m)?;
    if cond.is_zero() {
        return Ok(DispatchOutcome::Advance);
    }
    m.pc = cp.pc;
    Ok(DispatchOutcome::Jumped)
}

pub(super) fn stackempty(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let empty = m.stack.is_empty();
    m.stack.push(&m.pool, Value::int(empty as u64));
    Ok(DispatchOutcome::Advance)
}

pub(super) fn pcpush(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let cp = m.code.get(m.pc).cloned().ok_or(VmError::PcOutOfRange(m.pc))?;
    m.stack.push(&m.pool, Value::code_point(cp));
    Ok(DispatchOutcome::Advance)
}

pub(super) fn auxpush(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let v = m.stack.pop()?;
    m.auxstack.push(&m.pool, v);
    Ok(DispatchOutcome::Advance)
}

pub(super) fn auxpop(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let v = m.auxstack.pop().map_err(|_| VmError::AuxStackUnderflow)?;
    m.stack.push(&m.pool, v);
    Ok(DispatchOutcome::Advance)
}

pub(super) fn auxstackempty(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let empty = m.auxstack.is_empty();
    m.stack.push(&m.pool, Value::int(empty as u64));
    Ok(DispatchOutcome::Advance)
}

pub(super) fn nop(_m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    Ok(DispatchOutcome::Advance)
}

pub(super) fn errpush(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let cp = m.errpc.clone();
    m.stack.push(&m.pool, Value::code_point(cp));
    Ok(DispatchOutcome::Advance)
}

pub(super) fn errset(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let v = m.stack.pop()?;
    match v {
        Value::CodePoint(cp) => {
            m.errpc = (*cp).clone();
            Ok(DispatchOutcome::Advance)
        }
        other => Err(VmError::TypeMismatch { expected: "code point", found: other.type_tag() }),
    }
}

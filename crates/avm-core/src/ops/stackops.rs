//! `DUP`/`SWAP` and the tuple accessors `TGET`/`TSET`/`TLEN`.

use super::{pop_int, pop_tuple};
use crate::error::VmError;
use crate::machine::{DispatchOutcome, MachineState};
use crate::value::Value;

fn dup_at(m: &mut MachineState, depth: usize) -> Result<DispatchOutcome, VmError> {
    let v = m.stack.peek(depth).ok_or(VmError::StackUnderflow)?;
    m.stack.push(&m.pool, v);
    Ok(DispatchOutcome::Advance)
}

pub(super) fn dup0(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    dup_at(m, 0)
}

pub(super) fn dup1(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    dup_at(m, 1)
}

pub(super) fn dup2(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    dup_at(m, 2)
}

/// `[a, b, ...] -> [b, a, ...]`.
pub(super) fn swap1(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(&m.pool, a);
    m.stack.push(&m.pool, b);
    Ok(DispatchOutcome::Advance)
}

/// `[a, b, c, ...] -> [c, b, a, ...]`.
pub(super) fn swap2(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    let c = m.stack.pop()?;
    m.stack.push(&m.pool, a);
    m.stack.push(&m.pool, b);
    m.stack.push(&m.pool, c);
    Ok(DispatchOutcome::Advance)
}

fn index_of(index: crate::U256, arity: usize) -> Result<usize, VmError> {
    let idx: u64 = index.try_into().unwrap_or(u64::MAX);
    if idx as usize >= arity {
        return Err(VmError::TupleIndexOutOfRange { index: idx, arity });
    }
    Ok(idx as usize)
}

/// Pops `index` then `tuple`; pushes `tuple[index]`.
pub(super) fn tget(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let index = pop_int(m)?;
    let tuple = pop_tuple(m)?;
    let idx = index_of(index, tuple.arity())?;
    let v = tuple.children()[idx].clone();
    m.stack.push(&m.pool, v);
    Ok(DispatchOutcome::Advance)
}

/// Pops `index`, then `tuple`, then the replacement `value`; pushes a
/// new tuple with `tuple[index]` replaced.
pub(super) fn tset(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let index = pop_int(m)?;
    let tuple = pop_tuple(m)?;
    let value = m.stack.pop()?;
    let idx = index_of(index, tuple.arity())?;
    let mut children: Vec<Value> = tuple.children().to_vec();
    children[idx] = value;
    let new_tuple = m.pool.tuple(children);
    m.stack.push(&m.pool, new_tuple);
    Ok(DispatchOutcome::Advance)
}

pub(super) fn tlen(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let tuple = pop_tuple(m)?;
    m.stack.push(&m.pool, Value::int(tuple.arity() as u64));
    Ok(DispatchOutcome::Advance)
}

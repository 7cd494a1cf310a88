//! Comparison, boolean, and bitwise opcodes.

use std::cmp::Ordering;

use super::arithmetic::is_negative;
use super::pop_int;
use crate::error::VmError;
use crate::machine::{DispatchOutcome, MachineState};
use crate::value::Value;
use crate::U256;

fn push_bool(m: &mut MachineState, cond: bool) -> Result<DispatchOutcome, VmError> {
    m.stack.push(&m.pool, Value::int(cond as u64));
    Ok(DispatchOutcome::Advance)
}

fn push_int(m: &mut MachineState, v: U256) -> Result<DispatchOutcome, VmError> {
    m.stack.push(&m.pool, Value::Int(v));
    Ok(DispatchOutcome::Advance)
}

pub(super) fn lt(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b) = (pop_int(m)?, pop_int(m)?);
    push_bool(m, a < b)
}

pub(super) fn gt(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b) = (pop_int(m)?, pop_int(m)?);
    push_bool(m, a > b)
}

pub(super) fn slt(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b) = (pop_int(m)?, pop_int(m)?);
    push_bool(m, signed_cmp(a, b) == Ordering::Less)
}

pub(super) fn sgt(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b) = (pop_int(m)?, pop_int(m)?);
    push_bool(m, signed_cmp(a, b) == Ordering::Greater)
}

pub(super) fn eq(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    push_bool(m, a.hash() == b.hash())
}

pub(super) fn iszero(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let a = pop_int(m)?;
    push_bool(m, a.is_zero())
}

pub(super) fn and(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b) = (pop_int(m)?, pop_int(m)?);
    push_int(m, a & b)
}

pub(super) fn or(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b) = (pop_int(m)?, pop_int(m)?);
    push_int(m, a | b)
}

pub(super) fn xor(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b) = (pop_int(m)?, pop_int(m)?);
    push_int(m, a ^ b)
}

pub(super) fn not(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let a = pop_int(m)?;
    push_int(m, !a)
}

pub(super) fn byte(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (i, x) = (pop_int(m)?, pop_int(m)?);
    push_int(m, byte_of(i, x))
}

pub(super) fn signextend(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (b, x) = (pop_int(m)?, pop_int(m)?);
    push_int(m, signextend_of(b, x))
}

/// Two equal-sign values compare the same way as raw two's-complement
/// bit patterns, so only the cross-sign cases need special-casing.
fn signed_cmp(a: U256, b: U256) -> Ordering {
    match (is_negative(a), is_negative(b)) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.cmp(&b),
    }
}

/// EVM-style `BYTE`: index `0` is the most significant byte; any index
/// `>= 32` yields zero.
fn byte_of(i: U256, x: U256) -> U256 {
    for n in 0..32u64 {
        if i == U256::from(n) {
            let bytes = x.to_be_bytes::<32>();
            let idx = n as usize;
            return U256::from(bytes.get(idx).copied().unwrap_or(0) as u64);
        }
    }
    U256::ZERO
}

/// EVM-style `SIGNEXTEND`: `b` counts bytes from the least-significant
/// end; any `b >= 32` leaves `x` untouched.
fn signextend_of(b: U256, x: U256) -> U256 {
    for n in 0..32u64 {
        if b == U256::from(n) {
            let bytes_be = x.to_be_bytes::<32>();
            let sign_byte_index = 31 - n as usize;
            let is_negative = bytes_be.get(sign_byte_index).copied().unwrap_or(0) & 0x80 != 0;
            let mut out = [0u8; 32];
            for (idx, slot) in out.iter_mut().enumerate() {
                *slot = if idx < sign_byte_index {
                    if is_negative {
                        0xff
                    } else {
                        0x00
                    }
                } else {
                    bytes_be.get(idx).copied().unwrap_or(0)
                };
            }
            return U256::from_be_bytes(out);
        }
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_extracts_most_significant_first() {
        let x = U256::from(0x01020304u64);
        assert_eq!(byte_of(U256::from(31u64), x), U256::from(0x04u64));
        assert_eq!(byte_of(U256::from(28u64), x), U256::from(0x01u64));
        assert_eq!(byte_of(U256::from(32u64), x), U256::ZERO);
    }

    #[test]
    fn signextend_propagates_sign_bit() {
        let x = U256::from(0xffu64); // byte 0 = 0xff, negative as i8
        let extended = signextend_of(U256::ZERO, x);
        assert_eq!(extended, U256::MAX);
    }

    #[test]
    fn signextend_leaves_positive_untouched() {
        let x = U256::from(0x7fu64);
        assert_eq!(signextend_of(U256::ZERO, x), x);
    }

    #[test]
    fn signed_compare_handles_negative_values() {
        let neg_one = U256::MAX;
        let one = U256::from(1u64);
        assert_eq!(signed_cmp(neg_one, one), Ordering::Less);
        assert_eq!(signed_cmp(one, neg_one), Ordering::Greater);
    }
}

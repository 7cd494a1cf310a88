//! The integer arithmetic opcodes. All operate modulo 2^256 except the
//! division/modulus family, which fault on a zero divisor rather than
//! wrapping (spec §7, "Error handler" scenario).

use super::pop_int;
use crate::error::VmError;
use crate::machine::{DispatchOutcome, MachineState};
use crate::value::Value;
use crate::U256;

fn push_result(m: &mut MachineState, result: U256) -> Result<DispatchOutcome, VmError> {
    m.stack.push(&m.pool, Value::Int(result));
    Ok(DispatchOutcome::Advance)
}

pub(super) fn add(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b) = (pop_int(m)?, pop_int(m)?);
    push_result(m, a.wrapping_add(b))
}

pub(super) fn mul(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b) = (pop_int(m)?, pop_int(m)?);
    push_result(m, a.wrapping_mul(b))
}

pub(super) fn sub(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b) = (pop_int(m)?, pop_int(m)?);
    push_result(m, a.wrapping_sub(b))
}

pub(super) fn div(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b) = (pop_int(m)?, pop_int(m)?);
    if b.is_zero() {
        return Err(VmError::DivisionByZero);
    }
    push_result(m, a / b)
}

pub(super) fn sdiv(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b) = (pop_int(m)?, pop_int(m)?);
    if b.is_zero() {
        return Err(VmError::DivisionByZero);
    }
    push_result(m, signed_div(a, b))
}

pub(super) fn modulo(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b) = (pop_int(m)?, pop_int(m)?);
    if b.is_zero() {
        return Err(VmError::ModulusIsZero);
    }
    push_result(m, a % b)
}

pub(super) fn smod(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b) = (pop_int(m)?, pop_int(m)?);
    if b.is_zero() {
        return Err(VmError::ModulusIsZero);
    }
    push_result(m, signed_mod(a, b))
}

pub(super) fn addmod(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b, n) = (pop_int(m)?, pop_int(m)?, pop_int(m)?);
    if n.is_zero() {
        return Err(VmError::ModulusIsZero);
    }
    push_result(m, add_mod(a, b, n))
}

pub(super) fn mulmod(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (a, b, n) = (pop_int(m)?, pop_int(m)?, pop_int(m)?);
    if n.is_zero() {
        return Err(VmError::ModulusIsZero);
    }
    push_result(m, mul_mod(a, b, n))
}

pub(super) fn exp(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let (base, exponent) = (pop_int(m)?, pop_int(m)?);
    push_result(m, wrapping_pow(base, exponent))
}

pub(crate) fn is_negative(v: U256) -> bool {
    v.bit(255)
}

fn negate(v: U256) -> U256 {
    (!v).wrapping_add(U256::from(1u64))
}

fn signed_div(a: U256, b: U256) -> U256 {
    let min = U256::from(1u64) << 255;
    if a == min && b == U256::MAX {
        return min;
    }
    let (a_abs, a_neg) = if is_negative(a) { (negate(a), true) } else { (a, false) };
    let (b_abs, b_neg) = if is_negative(b) { (negate(b), true) } else { (b, false) };
    let result = a_abs / b_abs;
    if a_neg != b_neg {
        negate(result)
    } else {
        result
    }
}

fn signed_mod(a: U256, b: U256) -> U256 {
    let (a_abs, a_neg) = if is_negative(a) { (negate(a), true) } else { (a, false) };
    let (b_abs, _) = if is_negative(b) { (negate(b), true) } else { (b, false) };
    let result = a_abs % b_abs;
    if a_neg {
        negate(result)
    } else {
        result
    }
}

/// Computes `(a + b) mod n` accounting for the sum overflowing 256
/// bits, without reaching for a wider integer type.
fn add_mod(a: U256, b: U256, n: U256) -> U256 {
    let a_r = a % n;
    let b_r = b % n;
    let (sum, overflow) = a_r.overflowing_add(b_r);
    if !overflow {
        sum % n
    } else {
        let pow2_256_mod_n = (U256::MAX % n).wrapping_add(U256::from(1u64)) % n;
        sum.wrapping_add(pow2_256_mod_n) % n
    }
}

/// Binary double-and-add multiplication modulo `n`, avoiding the need
/// for a double-width intermediate.
fn mul_mod(a: U256, mut b: U256, n: U256) -> U256 {
    let mut acc = a % n;
    let mut result = U256::ZERO;
    while b != U256::ZERO {
        if b & U256::from(1u64) == U256::from(1u64) {
            result = add_mod(result, acc, n);
        }
        acc = add_mod(acc, acc, n);
        b >>= 1;
    }
    result
}

/// Square-and-multiply, wrapping modulo 2^256 at every step.
fn wrapping_pow(base: U256, mut exponent: U256) -> U256 {
    let mut result = U256::from(1u64);
    let mut b = base;
    while exponent != U256::ZERO {
        if exponent & U256::from(1u64) == U256::from(1u64) {
            result = result.wrapping_mul(b);
        }
        b = b.wrapping_mul(b);
        exponent >>= 1;
    }
    result
}

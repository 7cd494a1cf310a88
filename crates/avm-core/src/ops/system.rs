//! Value introspection, debug/log opcodes, and the messaging and
//! lifecycle opcodes (`SEND`, `NBSEND`, `GETTIME`, `INBOX`, `ERROR`,
//! `HALT`).

use crate::error::VmError;
use crate::machine::{BlockReason, DispatchOutcome, MachineState, Status};
use crate::message::Message;
use crate::value::Value;
use crate::U256;

pub(super) fn hash_op(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let v = m.stack.pop()?;
    m.stack.push(&m.pool, Value::Int(v.hash()));
    Ok(DispatchOutcome::Advance)
}

pub(super) fn type_op(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let v = m.stack.pop()?;
    m.stack.push(&m.pool, Value::int(v.type_tag() as u64));
    Ok(DispatchOutcome::Advance)
}

pub(super) fn breakpoint(_m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    Ok(DispatchOutcome::Blocked { reason: BlockReason::Breakpoint, advance: true })
}

pub(super) fn log(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let v = m.stack.pop()?;
    m.logs.push(v);
    Ok(DispatchOutcome::Advance)
}

pub(super) fn debug(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let v = m.stack.pop()?;
    tracing::debug!(value = ?v, pc = m.pc, "DEBUG opcode");
    Ok(DispatchOutcome::Advance)
}

/// Pops a 4-tuple `(destination, token_type, currency, payload)` and
/// attaches `sender = 0` (this machine has no notion of its own
/// address; spec §9 leaves "sender" for a host to fill in at a higher
/// layer). Shared by `SEND` and `NBSEND`.
fn pop_outgoing_message(m: &mut MachineState) -> Result<Message, VmError> {
    let tuple_val = m.stack.pop()?;
    let t = tuple_val
        .as_tuple()
        .ok_or_else(|| VmError::TypeMismatch { expected: "4-tuple message", found: tuple_val.type_tag() })?;
    if t.arity() != 4 {
        return Err(VmError::TupleIndexOutOfRange { index: 4, arity: t.arity() });
    }
    let children = t.children();
    let int_field = |v: &Value| {
        v.as_int().ok_or_else(|| VmError::TypeMismatch { expected: "integer", found: v.type_tag() })
    };
    let destination = int_field(&children[0])?;
    let token_type = int_field(&children[1])?;
    let currency = int_field(&children[2])?;
    let payload = children[3].clone();
    Ok(Message { sender: U256::ZERO, destination, token_type, currency, payload })
}

/// Blocks (without consuming the message) until the balance tracker
/// can cover the transfer.
pub(super) fn send(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let msg = pop_outgoing_message(m)?;
    if !m.balance.try_debit(msg.token_type, msg.currency) {
        let retry = m.pool.tuple(vec![
            Value::Int(msg.destination),
            Value::Int(msg.token_type),
            Value::Int(msg.currency),
            msg.payload,
        ]);
        m.stack.push(&m.pool, retry);
        return Ok(DispatchOutcome::Blocked {
            reason: BlockReason::Send { insufficient_balance: true },
            advance: false,
        });
    }
    m.sent_messages.push(msg);
    Ok(DispatchOutcome::Advance)
}

/// Never blocks: pushes `1`/`0` reporting whether the transfer went
/// through instead of stalling the machine on an empty balance.
pub(super) fn nbsend(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let msg = pop_outgoing_message(m)?;
    let ok = m.balance.try_debit(msg.token_type, msg.currency);
    if ok {
        m.sent_messages.push(msg);
    }
    m.stack.push(&m.pool, Value::int(ok as u64));
    Ok(DispatchOutcome::Advance)
}

pub(super) fn gettime(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    let t = m.pool.tuple(vec![Value::Int(m.context.time_lower), Value::Int(m.context.time_upper)]);
    m.stack.push(&m.pool, t);
    Ok(DispatchOutcome::Advance)
}

/// Consumes the entire inbox as one atomic chunk, pushing its
/// tuple-chain representation. Blocks without advancing `pc` if the
/// inbox is currently empty, so a subsequent `deliver_onchain_messages`
/// plus re-run naturally retries the same instruction.
pub(super) fn inbox(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    if m.inbox.message_count() == 0 {
        return Ok(DispatchOutcome::Blocked { reason: BlockReason::InboxEmpty, advance: false });
    }
    let chunk = m.inbox.take();
    let value = chunk.head_value(&m.pool);
    m.stack.push(&m.pool, value);
    Ok(DispatchOutcome::Advance)
}

pub(super) fn error_op(_m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    Err(VmError::ExplicitError)
}

pub(super) fn halt(m: &mut MachineState) -> Result<DispatchOutcome, VmError> {
    m.state = Status::Halted;
    Ok(DispatchOutcome::Blocked { reason: BlockReason::Halt, advance: false })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{CodeSegment, Op, OpCode};
    use crate::machine::MachineState;

    fn machine_with_op(op: OpCode) -> MachineState {
        let mut m = MachineState::new();
        m.code = CodeSegment::from_ops(vec![Op::new(op, None)]);
        m.state = Status::Extensive;
        m
    }

    #[test]
    fn inbox_blocks_when_empty() {
        let mut m = machine_with_op(OpCode::INBOX);
        let reason = m.step();
        assert_eq!(reason, BlockReason::InboxEmpty);
        assert_eq!(m.pc, 0);
    }

    #[test]
    fn inbox_delivers_after_offchain_send() {
        let mut m = machine_with_op(OpCode::INBOX);
        m.send_offchain_messages(vec![Message {
            sender: U256::ZERO,
            destination: U256::from(1u64),
            token_type: U256::ZERO,
            currency: U256::ZERO,
            payload: Value::int(42u64),
        }]);
        let reason = m.step();
        assert_eq!(reason, BlockReason::NotBlocked);
        assert!(!m.stack.is_empty());
    }

    #[test]
    fn send_blocks_on_insufficient_balance() {
        let mut m = machine_with_op(OpCode::SEND);
        let msg_tuple = m.pool.tuple(vec![
            Value::int(1u64),
            Value::int(7u64),
            Value::int(100u64),
            Value::int(0u64),
        ]);
        m.stack.push(&m.pool, msg_tuple);
        let reason = m.step();
        assert_eq!(reason, BlockReason::Send { insufficient_balance: true });
        assert_eq!(m.pc, 0);
    }

    #[test]
    fn nbsend_reports_failure_without_blocking() {
        let mut m = machine_with_op(OpCode::NBSEND);
        let msg_tuple = m.pool.tuple(vec![
            Value::int(1u64),
            Value::int(7u64),
            Value::int(100u64),
            Value::int(0u64),
        ]);
        m.stack.push(&m.pool, msg_tuple);
        let reason = m.step();
        assert_eq!(reason, BlockReason::NotBlocked);
        assert_eq!(m.stack.pop().unwrap(), Value::int(0u64));
    }
}

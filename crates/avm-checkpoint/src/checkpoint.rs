//! The top-level checkpoint/restore protocol (spec §4.7): a
//! transactional, content-addressed snapshot of the full machine state,
//! keyed by the machine's own root hash.

use avm_core::{BlockReason, CodeSegment, CodePoint, Context, Hash256, LoadError, MachineState, Message, Pool, Stack, Status, Value};

use crate::error::CheckpointError;
use crate::node::{load_value, save_value};
use crate::record::{decode_record, encode_record, MachineStateRecord};
use crate::store::CheckpointStore;

/// Opens a transaction, writes every child node and the top-level
/// `machine_state` record, and commits only if every write succeeds.
/// A failure anywhere aborts the whole transaction (spec §4.7: "all
/// child saves must succeed before the transaction commits").
pub fn checkpoint(m: &MachineState, store: &dyn CheckpointStore) -> Result<Hash256, CheckpointError> {
    let root_hash = m.hash();
    let mut tx = store.begin();

    let attempt = (|| -> Result<(), CheckpointError> {
        let static_key = save_value(tx.as_mut(), &m.static_val)?;
        let register_key = save_value(tx.as_mut(), &m.register)?;
        let errpc_key = save_value(tx.as_mut(), &Value::code_point(m.errpc.clone()))?;
        let current_cp = m.code.get(m.pc).cloned().unwrap_or_else(CodePoint::null);
        let code_point_key = save_value(tx.as_mut(), &Value::code_point(current_cp))?;
        let stack_key = save_value(tx.as_mut(), m.stack.head())?;
        let auxstack_key = save_value(tx.as_mut(), m.auxstack.head())?;

        let inbox_head = m.inbox.head_value(&m.pool);
        let inbox_head_key = save_value(tx.as_mut(), &inbox_head)?;
        let inbox_count_key = save_value(tx.as_mut(), &Value::int(m.inbox.message_count()))?;

        let pending_head = m.pending_inbox.head_value(&m.pool);
        let pending_inbox_head_key = save_value(tx.as_mut(), &pending_head)?;
        let pending_inbox_count_key = save_value(tx.as_mut(), &Value::int(m.pending_inbox.message_count()))?;

        let record = MachineStateRecord {
            status: m.state,
            block_reason: m.block_reason.clone(),
            static_key,
            register_key,
            errpc_key,
            code_point_key,
            stack_key,
            auxstack_key,
            inbox_head_key,
            inbox_count_key,
            pending_inbox_head_key,
            pending_inbox_count_key,
            balance: m.balance.clone(),
        };
        tx.put_if_absent(root_hash, encode_record(&record))?;
        Ok(())
    })();

    match attempt {
        Ok(()) => match tx.commit() {
            Ok(()) => {
                tracing::debug!(hash = %root_hash, "checkpoint committed");
                Ok(root_hash)
            }
            Err(err) => {
                tracing::warn!(%err, "checkpoint commit failed");
                Err(CheckpointError::Aborted)
            }
        },
        Err(err) => {
            tracing::warn!(%err, "checkpoint save aborted before commit");
            Err(CheckpointError::Aborted)
        }
    }
}

/// Reconstructs a full [`MachineState`] from a committed checkpoint.
/// The caller supplies `code` (spec §4.7: "the caller must supply the
/// already-loaded code segment"); `pc` is recovered from the saved
/// current code point's own `pc` field. Restoration is all-or-nothing:
/// a missing or malformed child fails the whole call.
///
/// The machine's `context` (the `GETTIME` time bounds) is not part of
/// the checkpoint per spec §4.7's field list; the restored machine
/// starts with a default context, which the caller may overwrite.
pub fn restore(store: &dyn CheckpointStore, code: CodeSegment, machine_hash: Hash256) -> Result<MachineState, CheckpointError> {
    let tx = store.begin();
    let record_bytes = tx.get(machine_hash)?.ok_or(CheckpointError::MissingNode(machine_hash))?;
    let record: MachineStateRecord = decode_record(&record_bytes).map_err(|e| CheckpointError::Corrupt(machine_hash, e))?;

    let pool = Pool::new();
    let static_val = load_value(tx.as_ref(), &pool, record.static_key)?;
    let register = load_value(tx.as_ref(), &pool, record.register_key)?;
    let errpc = expect_code_point(load_value(tx.as_ref(), &pool, record.errpc_key)?, record.errpc_key)?;
    let current_cp = expect_code_point(load_value(tx.as_ref(), &pool, record.code_point_key)?, record.code_point_key)?;
    let pc = current_cp.pc;

    let stack_head = load_value(tx.as_ref(), &pool, record.stack_key)?;
    let auxstack_head = load_value(tx.as_ref(), &pool, record.auxstack_key)?;

    let inbox_head = load_value(tx.as_ref(), &pool, record.inbox_head_key)?;
    let inbox_count = expect_count(load_value(tx.as_ref(), &pool, record.inbox_count_key)?, record.inbox_count_key)?;
    let pending_head = load_value(tx.as_ref(), &pool, record.pending_inbox_head_key)?;
    let pending_count =
        expect_count(load_value(tx.as_ref(), &pool, record.pending_inbox_count_key)?, record.pending_inbox_count_key)?;

    let inbox = message_stack_from_value(inbox_head, inbox_count)
        .map_err(|e| CheckpointError::Corrupt(record.inbox_head_key, e))?;
    let pending_inbox = message_stack_from_value(pending_head, pending_count)
        .map_err(|e| CheckpointError::Corrupt(record.pending_inbox_head_key, e))?;

    Ok(MachineState {
        code,
        pc,
        stack: Stack::from_head(stack_head),
        auxstack: Stack::from_head(auxstack_head),
        register,
        static_val,
        errpc,
        pending_inbox,
        inbox,
        balance: record.balance,
        state: record.status,
        block_reason: record.block_reason,
        context: Context::default(),
        logs: Vec::new(),
        sent_messages: Vec::new(),
        pool,
    })
}

fn expect_code_point(v: Value, key: Hash256) -> Result<CodePoint, CheckpointError> {
    v.as_code_point()
        .cloned()
        .ok_or_else(|| CheckpointError::Corrupt(key, LoadError::Malformed("expected node to decode as a code point")))
}

fn expect_count(v: Value, key: Hash256) -> Result<u64, CheckpointError> {
    let n = v.as_int().ok_or_else(|| CheckpointError::Corrupt(key, LoadError::Malformed("expected node to decode as an integer")))?;
    u64::try_from(n).map_err(|_| CheckpointError::Corrupt(key, LoadError::Malformed("message count exceeds u64 range")))
}

/// Rebuilds a [`avm_core::MessageStack`] from its tuple-chain
/// representation, walking the chain iteratively (not recursively) so
/// a long-running inbox cannot overflow the native stack.
fn message_stack_from_value(head: Value, expected_count: u64) -> Result<avm_core::MessageStack, LoadError> {
    let mut messages = Vec::new();
    let mut cur = head;
    loop {
        let Some(tuple) = cur.as_tuple() else {
            return Err(LoadError::Malformed("message chain node is not a tuple"));
        };
        match tuple.arity() {
            0 => break,
            2 => {
                let children = tuple.children();
                messages.push(decode_message(&children[0])?);
                cur = children[1].clone();
            }
            _ => return Err(LoadError::Malformed("message chain node has unexpected arity")),
        }
    }
    if messages.len() as u64 != expected_count {
        return Err(LoadError::Malformed("message count does not match stored message chain"));
    }
    Ok(avm_core::MessageStack::from_messages(messages))
}

fn decode_message(v: &Value) -> Result<Message, LoadError> {
    let tuple = v.as_tuple().ok_or(LoadError::Malformed("message node is not a tuple"))?;
    if tuple.arity() != 5 {
        return Err(LoadError::Malformed("message tuple does not have arity 5"));
    }
    let children = tuple.children();
    let int_field = |v: &Value| v.as_int().ok_or(LoadError::Malformed("message field is not an integer"));
    Ok(Message {
        sender: int_field(&children[0])?,
        destination: int_field(&children[1])?,
        token_type: int_field(&children[2])?,
        currency: int_field(&children[3])?,
        payload: children[4].clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use avm_core::{Op, OpCode};

    fn program() -> CodeSegment {
        CodeSegment::from_ops(vec![
            Op::new(OpCode::ADD, None),
            Op::new(OpCode::HALT, None),
        ])
    }

    #[test]
    fn checkpoint_round_trips_observable_state() {
        let mut m = MachineState::new();
        m.code = program();
        m.state = Status::Extensive;
        m.stack.push(&m.pool, Value::int(3u64));
        m.stack.push(&m.pool, Value::int(4u64));
        m.send_offchain_messages(vec![Message {
            sender: avm_core::U256::ZERO,
            destination: avm_core::U256::from(9u64),
            token_type: avm_core::U256::ZERO,
            currency: avm_core::U256::ZERO,
            payload: Value::int(1u64),
        }]);
        let pre_hash = m.hash();

        let store = InMemoryStore::new();
        let handle = checkpoint(&m, &store).unwrap();
        assert_eq!(handle, pre_hash);

        let restored = restore(&store, program(), handle).unwrap();
        assert_eq!(restored.hash(), pre_hash);
        assert_eq!(restored.pc, m.pc);
        assert_eq!(restored.stack.hash(), m.stack.hash());
        assert_eq!(restored.inbox.message_count(), 1);
    }

    #[test]
    fn restore_of_unknown_hash_is_reported() {
        let store = InMemoryStore::new();
        let err = restore(&store, program(), Hash256::from(0xdeadu64)).unwrap_err();
        assert!(matches!(err, CheckpointError::MissingNode(_)));
    }

    #[test]
    fn checkpoint_then_run_then_restore_matches_original_trace() {
        let mut m = MachineState::new();
        m.code = program();
        m.state = Status::Extensive;
        m.stack.push(&m.pool, Value::int(3u64));
        m.stack.push(&m.pool, Value::int(4u64));

        m.step(); // ADD
        let store = InMemoryStore::new();
        let handle = checkpoint(&m, &store).unwrap();

        let (reason, _) = m.run(10);
        assert_eq!(reason, BlockReason::Halt);
        let final_hash = m.hash();

        let mut restored = restore(&store, program(), handle).unwrap();
        let (reason, _) = restored.run(10);
        assert_eq!(reason, BlockReason::Halt);
        assert_eq!(restored.hash(), final_hash);
    }
}

//! End-to-end scenarios exercising a full machine run rather than a
//! single opcode, kept separate from the per-module unit tests.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use avm_core::{BlockReason, CodeSegment, Hash256, MachineState, Message, Op, OpCode, Status, Value, U256};

fn extensive(code: CodeSegment) -> MachineState {
    let mut m = MachineState::new();
    m.code = code;
    m.state = Status::Extensive;
    m
}

#[test]
fn empty_program_hashes_before_stepping_then_errors() {
    let m = extensive(CodeSegment::from_ops(Vec::new()));
    let h1 = m.hash();
    let h2 = m.hash();
    assert_eq!(h1, h2);

    let mut m = m;
    let reason = m.step();
    assert_eq!(reason, BlockReason::Error);
    assert_eq!(m.state, Status::Error);
    assert_eq!(m.hash(), U256::from(1u64));
}

#[test]
fn add_and_halt_leaves_the_sum_on_top_of_stack() {
    let mut m = extensive(CodeSegment::from_ops(vec![Op::new(OpCode::ADD, None), Op::new(OpCode::HALT, None)]));
    m.stack.push(&m.pool, Value::int(2u64));
    m.stack.push(&m.pool, Value::int(3u64));

    assert_eq!(m.step(), BlockReason::NotBlocked);
    assert_eq!(m.stack.pop().unwrap(), Value::int(5u64));
    m.stack.push(&m.pool, Value::int(5u64));

    assert_eq!(m.step(), BlockReason::Halt);
    assert_eq!(m.state, Status::Halted);
    assert_eq!(m.hash(), Hash256::ZERO);
}

/// A `register`-counted loop: seeds the auxiliary stack with the
/// loop's own entry code point (a host-side bootstrap, the same way a
/// unit test pre-seeds a stack before stepping) and has the body
/// restock the auxstack each iteration via `AUXPOP`/`DUP0`/`AUXPUSH` so
/// the jump target survives the next `CJUMP`. The register counts down
/// from 10 to 0 across ten iterations before the loop falls through.
#[test]
fn jump_loop_counts_a_register_down_to_zero() {
    let ops = vec![
        Op::new(OpCode::NOP, Some(Value::int(10u64))), // pc0: push 10
        Op::new(OpCode::RSET, None),                    // pc1: register = 10
        Op::new(OpCode::AUXPOP, None),                  // pc2: loop start
        Op::new(OpCode::DUP0, None),                    // pc3
        Op::new(OpCode::AUXPUSH, None),                 // pc4: restock target
        Op::new(OpCode::NOP, Some(Value::int(1u64))),   // pc5: push 1
        Op::new(OpCode::RPUSH, None),                   // pc6: push register
        Op::new(OpCode::SUB, None),                     // pc7: register - 1
        Op::new(OpCode::RSET, None),                    // pc8: register = result
        Op::new(OpCode::RPUSH, None),                   // pc9: push new register (cond)
        Op::new(OpCode::CJUMP, None),                   // pc10
        Op::new(OpCode::HALT, None),                     // pc11
    ];
    let code = CodeSegment::from_ops(ops);
    let loop_start = code.get(2).cloned().unwrap();

    let mut m = extensive(code);
    m.auxstack.push(&m.pool, Value::code_point(loop_start));

    let mut registers = std::collections::HashSet::new();
    registers.insert(m.register.as_int().unwrap());

    let mut reason = BlockReason::NotBlocked;
    for _ in 0..500 {
        reason = m.step();
        registers.insert(m.register.as_int().unwrap());
        if reason != BlockReason::NotBlocked {
            break;
        }
    }

    assert_eq!(reason, BlockReason::Halt);
    assert_eq!(m.state, Status::Halted);
    assert_eq!(m.register, Value::int(0u64));
    assert_eq!(registers.len(), 11, "register should take exactly 11 distinct values counting down from 10");
}

/// A handler installed via `errpc` catches the VM-internal
/// `DivisionByZero` fault and leaves a sentinel on the stack instead of
/// transitioning to `Status::Error`.
#[test]
fn error_handler_catches_division_by_zero() {
    let ops = vec![
        Op::new(OpCode::NOP, Some(Value::int(0u64))),       // pc0: push divisor 0
        Op::new(OpCode::NOP, Some(Value::int(10u64))),      // pc1: push numerator 10
        Op::new(OpCode::DIV, None),                          // pc2: faults, diverts to errpc
        Op::new(OpCode::HALT, None),                          // pc3: unreached on the error path
        Op::new(OpCode::NOP, Some(Value::int(0xdeadu64))),  // pc4: handler entry
        Op::new(OpCode::HALT, None),                          // pc5
    ];
    let code = CodeSegment::from_ops(ops);
    let handler_entry = code.get(4).cloned().unwrap();
    let mut m = extensive(code);
    m.errpc = handler_entry;

    let (reason, _) = m.run(10);
    assert_eq!(reason, BlockReason::Halt);
    assert_eq!(m.state, Status::Halted);
    assert_eq!(m.stack.pop().unwrap(), Value::int(0xdeadu64));
}

#[test]
fn inbox_blocks_then_unblocks_after_an_offchain_delivery() {
    let mut m = extensive(CodeSegment::from_ops(vec![Op::new(OpCode::INBOX, None), Op::new(OpCode::HALT, None)]));

    assert_eq!(m.step(), BlockReason::InboxEmpty);
    assert_eq!(m.pc, 0);

    m.send_offchain_messages(vec![Message {
        sender: U256::ZERO,
        destination: U256::from(1u64),
        token_type: U256::ZERO,
        currency: U256::ZERO,
        payload: Value::int(42u64),
    }]);

    assert_eq!(m.step(), BlockReason::NotBlocked);
    assert_eq!(m.pc, 1);
    assert!(!m.stack.is_empty());

    assert_eq!(m.step(), BlockReason::Halt);
    assert_eq!(m.state, Status::Halted);
}

//! The machine state and step engine tying every component together.

use crate::balance::BalanceTracker;
use crate::code::{CodePoint, CodeSegment};
use crate::error::{LoadError, VmError};
use crate::hash::{keccak256, Hash256};
use crate::loader;
use crate::message::{Message, MessageStack};
use crate::ops;
use crate::proof;
use crate::stack::Stack;
use crate::value::{Pool, Value};
use crate::U256;

/// The machine's coarse lifecycle state (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Extensive,
    Halted,
    Error,
}

/// Why the most recent `step`/`run` stopped (spec §4.5). `NotBlocked`
/// never escapes `run` except as its final iteration's reason when the
/// step budget is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    NotBlocked,
    Halt,
    Error,
    Breakpoint,
    InboxEmpty,
    Send { insufficient_balance: bool },
}

/// The context values exposed by `GETTIME`. Threaded into machine
/// construction rather than hardcoded, so a host can model block time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Context {
    pub time_lower: U256,
    pub time_upper: U256,
}

pub(crate) enum DispatchOutcome {
    /// Normal completion: advance `pc` by one.
    Advance,
    /// The opcode already set `pc` explicitly (a taken `JUMP`/`CJUMP`).
    Jumped,
    /// Execution paused; `advance` says whether `pc` should still move
    /// past this instruction (true for `BREAKPOINT`, false for a
    /// genuine block like `InboxEmpty` or insufficient-balance `SEND`,
    /// so a retry re-executes the same instruction).
    Blocked { reason: BlockReason, advance: bool },
}

/// `{ code, pc, stack, auxstack, register, static_val, errpc,
/// pending_inbox, inbox, balance, state, block_reason, context }`
/// (spec §3), plus the owning value pool and the program's emitted
/// side-channel output (logs, outbound messages) which sit alongside
/// the state tuple but are not part of the root hash.
pub struct MachineState {
    pub pool: Pool,
    pub code: CodeSegment,
    pub pc: u64,
    pub stack: Stack,
    pub auxstack: Stack,
    pub register: Value,
    pub static_val: Value,
    pub errpc: CodePoint,
    pub pending_inbox: MessageStack,
    pub inbox: MessageStack,
    pub balance: BalanceTracker,
    pub state: Status,
    pub block_reason: BlockReason,
    pub context: Context,
    /// Values emitted by the `LOG` opcode, in program order.
    pub logs: Vec<Value>,
    /// Messages accepted by `SEND`/`NBSEND`, in program order.
    pub sent_messages: Vec<Message>,
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineState {
    pub fn new() -> Self {
        let pool = Pool::new();
        let register = pool.empty_tuple();
        let static_val = pool.empty_tuple();
        let stack = Stack::new(&pool);
        let auxstack = Stack::new(&pool);
        MachineState {
            code: CodeSegment::from_ops(Vec::new()),
            pc: 0,
            stack,
            auxstack,
            register,
            static_val,
            errpc: CodePoint::null(),
            pending_inbox: MessageStack::new(),
            inbox: MessageStack::new(),
            balance: BalanceTracker::new(),
            state: Status::Extensive,
            block_reason: BlockReason::NotBlocked,
            context: Context::default(),
            logs: Vec::new(),
            sent_messages: Vec::new(),
            pool,
        }
    }

    pub fn with_context(context: Context) -> Self {
        let mut m = MachineState::new();
        m.context = context;
        m
    }

    /// Decodes a `.ao` program buffer and resets the machine to its
    /// initial running state (spec §4.3).
    pub fn load(&mut self, program: &[u8]) -> Result<(), LoadError> {
        let (code, static_val) = loader::load_program(program, &self.pool)?;
        self.code = code;
        self.static_val = static_val;
        self.pc = 0;
        self.stack = Stack::new(&self.pool);
        self.auxstack = Stack::new(&self.pool);
        self.register = self.pool.empty_tuple();
        self.errpc = CodePoint::null();
        self.state = Status::Extensive;
        self.block_reason = BlockReason::NotBlocked;
        Ok(())
    }

    /// The root state hash (spec §4.4). Collapses to `0`/`1` for
    /// `Halted`/`Error` without touching the six-field Keccak.
    pub fn hash(&self) -> Hash256 {
        match self.state {
            Status::Halted => return Hash256::ZERO,
            Status::Error => return U256::from(1u64),
            Status::Extensive => {}
        }
        let cp_hash = match self.code.get(self.pc) {
            Some(cp) => cp.hash(),
            // Invariant (spec §3) says pc < code.len() whenever
            // Extensive; an empty or not-yet-validated program can
            // still be hashed before the first step, so this falls
            // back to the Error-equivalent collapse rather than
            // panicking.
            None => return U256::from(1u64),
        };
        let mut buf = Vec::with_capacity(32 * 6);
        buf.extend_from_slice(&cp_hash.to_be_bytes::<32>());
        buf.extend_from_slice(&self.stack.hash().to_be_bytes::<32>());
        buf.extend_from_slice(&self.auxstack.hash().to_be_bytes::<32>());
        buf.extend_from_slice(&self.register.hash().to_be_bytes::<32>());
        buf.extend_from_slice(&self.static_val.hash().to_be_bytes::<32>());
        buf.extend_from_slice(&self.errpc.hash().to_be_bytes::<32>());
        keccak256(&buf)
    }

    /// Executes exactly one instruction (spec §4.5).
    pub fn step(&mut self) -> BlockReason {
        match self.state {
            Status::Halted => return BlockReason::Halt,
            Status::Error => return BlockReason::Error,
            Status::Extensive => {}
        }

        let cp = match self.code.get(self.pc) {
            Some(cp) => cp.clone(),
            None => {
                tracing::warn!(pc = self.pc, "program counter out of range");
                self.state = Status::Error;
                self.block_reason = BlockReason::Error;
                return BlockReason::Error;
            }
        };

        if let Some(imm) = cp.op.immediate.clone() {
            self.stack.push(&self.pool, imm);
        }

        let opcode = match cp.op.decoded() {
            Some(op) => op,
            None => return self.raise_error(VmError::UnknownOpcode(cp.op.opcode)),
        };

        let outcome = ops::dispatch(self, opcode);
        match outcome {
            Ok(DispatchOutcome::Advance) => {
                self.pc += 1;
                self.block_reason = BlockReason::NotBlocked;
                BlockReason::NotBlocked
            }
            Ok(DispatchOutcome::Jumped) => {
                self.block_reason = BlockReason::NotBlocked;
                BlockReason::NotBlocked
            }
            Ok(DispatchOutcome::Blocked { reason, advance }) => {
                if advance {
                    self.pc += 1;
                }
                self.block_reason = reason.clone();
                reason
            }
            Err(err) => self.raise_error(err),
        }
    }

    /// Runs until a block reason other than `NotBlocked` is produced,
    /// or until `max_steps` instructions have executed.
    pub fn run(&mut self, max_steps: u64) -> (BlockReason, u64) {
        let mut taken = 0u64;
        let mut reason = BlockReason::NotBlocked;
        while taken < max_steps {
            reason = self.step();
            taken += 1;
            if reason != BlockReason::NotBlocked {
                break;
            }
        }
        (reason, taken)
    }

    fn raise_error(&mut self, err: VmError) -> BlockReason {
        if self.errpc.is_null() {
            tracing::debug!(%err, "vm-internal error with null errpc; halting with Error");
            self.state = Status::Error;
            self.block_reason = BlockReason::Error;
            BlockReason::Error
        } else {
            tracing::debug!(%err, errpc = self.errpc.pc, "vm-internal error; diverting to errpc");
            self.pc = self.errpc.pc;
            self.block_reason = BlockReason::NotBlocked;
            BlockReason::NotBlocked
        }
    }

    /// Appends an on-chain deposit to the pending inbox and credits the
    /// balance tracker in one call, so a caller can never credit a
    /// balance without a matching message (spec §2B).
    pub fn send_onchain_message(&mut self, msg: Message) -> Result<(), VmError> {
        self.balance.add(msg.token_type, msg.currency)?;
        self.pending_inbox.add_message(msg);
        Ok(())
    }

    /// Appends a batch of messages as one new chunk onto the inbox, in
    /// order.
    pub fn send_offchain_messages(&mut self, messages: Vec<Message>) {
        let chunk = MessageStack::from_messages(messages);
        self.inbox.merge(chunk);
    }

    /// Atomically moves the pending inbox into the inbox and clears
    /// pending.
    pub fn deliver_onchain_messages(&mut self) {
        let pending = self.pending_inbox.take();
        self.inbox.merge(pending);
    }

    pub fn set_inbox(&mut self, ms: MessageStack) {
        self.inbox = ms;
    }

    pub fn set_pending_inbox(&mut self, ms: MessageStack) {
        self.pending_inbox = ms;
    }

    pub fn pending_message_count(&self) -> u64 {
        self.pending_inbox.message_count()
    }

    /// The single-step proof blob (spec §4.6).
    pub fn marshal_proof(&self) -> Vec<u8> {
        proof::marshal_proof(self)
    }
}

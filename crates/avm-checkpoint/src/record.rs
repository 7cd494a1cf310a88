//! Wire layout for the `machine_state` record (spec §4.7) and the
//! scalar fields folded into it (status, block reason, balance
//! tracker) that are not themselves content-addressed.

use avm_core::{BalanceTracker, BlockReason, Hash256, LoadError, Status, U256};

const STATUS_EXTENSIVE: u8 = 0;
const STATUS_HALTED: u8 = 1;
const STATUS_ERROR: u8 = 2;

const REASON_NOT_BLOCKED: u8 = 0;
const REASON_HALT: u8 = 1;
const REASON_ERROR: u8 = 2;
const REASON_BREAKPOINT: u8 = 3;
const REASON_INBOX_EMPTY: u8 = 4;
const REASON_SEND: u8 = 5;

/// The ten content-addressed child keys plus the inline scalar fields
/// that make up one `machine_state` record (spec §4.7).
pub struct MachineStateRecord {
    pub status: Status,
    pub block_reason: BlockReason,
    pub static_key: Hash256,
    pub register_key: Hash256,
    pub errpc_key: Hash256,
    pub code_point_key: Hash256,
    pub stack_key: Hash256,
    pub auxstack_key: Hash256,
    pub inbox_head_key: Hash256,
    pub inbox_count_key: Hash256,
    pub pending_inbox_head_key: Hash256,
    pub pending_inbox_count_key: Hash256,
    pub balance: BalanceTracker,
}

pub fn encode_record(r: &MachineStateRecord) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(encode_status(r.status));
    encode_block_reason(&r.block_reason, &mut buf);
    for key in [
        r.static_key,
        r.register_key,
        r.errpc_key,
        r.code_point_key,
        r.stack_key,
        r.auxstack_key,
        r.inbox_head_key,
        r.inbox_count_key,
        r.pending_inbox_head_key,
        r.pending_inbox_count_key,
    ] {
        buf.extend_from_slice(&key.to_be_bytes::<32>());
    }
    let entries: Vec<(&U256, &U256)> = r.balance.iter().collect();
    buf.extend_from_slice(&(entries.len() as u64).to_be_bytes());
    for (token_type, currency) in entries {
        buf.extend_from_slice(&token_type.to_be_bytes::<32>());
        buf.extend_from_slice(&currency.to_be_bytes::<32>());
    }
    buf
}

pub fn decode_record(bytes: &[u8]) -> Result<MachineStateRecord, LoadError> {
    let mut r = Reader { buf: bytes, pos: 0 };
    let status = decode_status(r.u8("machine state status")?)?;
    let block_reason = decode_block_reason(&mut r)?;
    let static_key = r.hash("static_val key")?;
    let register_key = r.hash("register key")?;
    let errpc_key = r.hash("errpc key")?;
    let code_point_key = r.hash("code point key")?;
    let stack_key = r.hash("stack key")?;
    let auxstack_key = r.hash("auxstack key")?;
    let inbox_head_key = r.hash("inbox head key")?;
    let inbox_count_key = r.hash("inbox count key")?;
    let pending_inbox_head_key = r.hash("pending inbox head key")?;
    let pending_inbox_count_key = r.hash("pending inbox count key")?;
    let entry_count = r.u64("balance entry count")?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        let token_type = r.hash("balance token_type")?;
        let currency = r.hash("balance currency")?;
        entries.push((token_type, currency));
    }
    if r.pos != bytes.len() {
        return Err(LoadError::Malformed("trailing bytes after machine state record"));
    }
    Ok(MachineStateRecord {
        status,
        block_reason,
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
        balance: BalanceTracker::from_entries(entries),
    })
}

fn encode_status(status: Status) -> u8 {
    match status {
        Status::Extensive => STATUS_EXTENSIVE,
        Status::Halted => STATUS_HALTED,
        Status::Error => STATUS_ERROR,
    }
}

fn decode_status(byte: u8) -> Result<Status, LoadError> {
    match byte {
        STATUS_EXTENSIVE => Ok(Status::Extensive),
        STATUS_HALTED => Ok(Status::Halted),
        STATUS_ERROR => Ok(Status::Error),
        _ => Err(LoadError::Malformed("unrecognized machine status byte")),
    }
}

fn encode_block_reason(reason: &BlockReason, buf: &mut Vec<u8>) {
    match reason {
        BlockReason::NotBlocked => buf.push(REASON_NOT_BLOCKED),
        BlockReason::Halt => buf.push(REASON_HALT),
        BlockReason::Error => buf.push(REASON_ERROR),
        BlockReason::Breakpoint => buf.push(REASON_BREAKPOINT),
        BlockReason::InboxEmpty => buf.push(REASON_INBOX_EMPTY),
        BlockReason::Send { insufficient_balance } => {
            buf.push(REASON_SEND);
            buf.push(*insufficient_balance as u8);
        }
    }
}

fn decode_block_reason(r: &mut Reader<'_>) -> Result<BlockReason, LoadError> {
    match r.u8("block reason tag")? {
        REASON_NOT_BLOCKED => Ok(BlockReason::NotBlocked),
        REASON_HALT => Ok(BlockReason::Halt),
        REASON_ERROR => Ok(BlockReason::Error),
        REASON_BREAKPOINT => Ok(BlockReason::Breakpoint),
        REASON_INBOX_EMPTY => Ok(BlockReason::InboxEmpty),
        REASON_SEND => Ok(BlockReason::Send { insufficient_balance: r.u8("send block flag")? != 0 }),
        _ => Err(LoadError::Malformed("unrecognized block reason tag")),
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], LoadError> {
        let end = self.pos.checked_add(n).ok_or(LoadError::Truncated(what))?;
        let slice = self.buf.get(self.pos..end).ok_or(LoadError::Truncated(what))?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, LoadError> {
        Ok(self.take(1, what)?[0])
    }

    fn u64(&mut self, what: &'static str) -> Result<u64, LoadError> {
        let bytes: [u8; 8] = self.take(8, what)?.try_into().map_err(|_| LoadError::Truncated(what))?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn hash(&mut self, what: &'static str) -> Result<Hash256, LoadError> {
        let bytes: [u8; 32] = self.take(32, what)?.try_into().map_err(|_| LoadError::Truncated(what))?;
        Ok(Hash256::from_be_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> MachineStateRecord {
        MachineStateRecord {
            status: Status::Extensive,
            block_reason: BlockReason::Send { insufficient_balance: true },
            static_key: Hash256::from(1u64),
            register_key: Hash256::from(2u64),
            errpc_key: Hash256::from(3u64),
            code_point_key: Hash256::from(4u64),
            stack_key: Hash256::from(5u64),
            auxstack_key: Hash256::from(6u64),
            inbox_head_key: Hash256::from(7u64),
            inbox_count_key: Hash256::from(8u64),
            pending_inbox_head_key: Hash256::from(9u64),
            pending_inbox_count_key: Hash256::from(10u64),
            balance: BalanceTracker::from_entries(vec![(U256::from(1u64), U256::from(100u64))]),
        }
    }

    #[test]
    fn record_round_trips() {
        let record = sample_record();
        let bytes = encode_record(&record);
        let decoded = decode_record(&bytes).unwrap();
        assert_eq!(decoded.status, record.status);
        assert_eq!(decoded.block_reason, record.block_reason);
        assert_eq!(decoded.static_key, record.static_key);
        assert_eq!(decoded.pending_inbox_count_key, record.pending_inbox_count_key);
        assert_eq!(decoded.balance.balance_of(U256::from(1u64)), U256::from(100u64));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode_record(&sample_record());
        bytes.push(0xff);
        assert!(decode_record(&bytes).is_err());
    }
}

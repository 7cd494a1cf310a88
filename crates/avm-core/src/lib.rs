//! Machine state and step engine for a deterministic, provable
//! stack-based rollup VM.
//!
//! The crate is organized bottom-up: [`value`] and [`code`] define the
//! data model, [`stack`], [`message`], and [`balance`] build the
//! machine's working memory out of it, [`machine`] ties everything
//! into the step/run engine, and [`proof`]/[`loader`] handle the
//! boundary with the outside world (on-chain verification and program
//! loading, respectively).

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod balance;
pub mod code;
pub mod codec;
pub mod error;
pub mod hash;
pub mod loader;
pub mod machine;
pub mod message;
mod ops;
pub mod proof;
pub mod stack;
pub mod value;

pub use ruint::aliases::U256;

pub use balance::BalanceTracker;
pub use code::{CodePoint, CodeSegment, Op, OpCode};
pub use error::{LoadError, VmError};
pub use hash::Hash256;
pub use machine::{BlockReason, Context, MachineState, Status};
pub use message::{Message, MessageStack};
pub use stack::Stack;
pub use value::{Pool, Value};

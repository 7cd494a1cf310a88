//! Loads a `.ao` program, runs it to completion (or until it blocks or
//! exhausts its step budget), and reports the resulting state.

use thiserror::Error;

use avm_checkpoint::{checkpoint, InMemoryStore};
use avm_core::{BlockReason, Context, LoadError, MachineState};

use crate::cli::Options;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to read program file {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("failed to load program: {0}")]
    Load(#[from] LoadError),
}

pub fn run(options: &Options) -> Result<(), RunError> {
    let bytes = std::fs::read(&options.program).map_err(|source| RunError::Io {
        path: options.program.display().to_string(),
        source,
    })?;

    let mut machine = MachineState::with_context(Context {
        time_lower: options.time_lower.into(),
        time_upper: options.time_upper.into(),
    });
    machine.load(&bytes)?;
    tracing::info!(path = %options.program.display(), steps_budget = options.max_steps, "loaded program");

    let (reason, taken) = machine.run(options.max_steps);
    let final_hash = machine.hash();

    println!("block reason : {reason:?}");
    println!("steps taken  : {taken}");
    println!("final hash   : {final_hash:#x}");
    for log in &machine.logs {
        println!("log          : {log:?}");
    }
    for msg in &machine.sent_messages {
        println!("sent message : destination={:#x} currency={:#x}", msg.destination, msg.currency);
    }

    if reason == BlockReason::Error {
        tracing::warn!("machine halted with status Error");
    }

    if options.checkpoint {
        let store = InMemoryStore::new();
        match checkpoint(&machine, &store) {
            Ok(handle) => println!("checkpoint   : {handle:#x}"),
            Err(err) => tracing::warn!(%err, "checkpoint failed"),
        }
    }

    Ok(())
}

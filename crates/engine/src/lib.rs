// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Onyx Engine: turns blocks and transactions into validated state
//! transitions. It owns the orchestration around the executor (header
//! validation, per-block checkpointing, receipts and roots, the block
//! builder, the canonical-chain driver) while the bytecode interpreter
//! stays an injected collaborator.

#[macro_use]
extern crate log;

mod block_builder;
mod block_execution;
mod block_store;
mod chain_execution;
mod engine;
mod error;
mod events;

pub use block_builder::{BlockBuilder, BuildBlockOpts};
pub use block_execution::{RunBlockOpts, RunBlockResult};
pub use block_store::{BlockStore, InMemoryBlockStore};
pub use chain_execution::{RunBlockchainOpts, RunBlockchainResult};
pub use engine::{Engine, EngineOptions, RunTxOpts, RunTxResult};
pub use error::{BlockError, EngineError, Result};
pub use events::{EngineEvent, EventHandler, StepInfo};

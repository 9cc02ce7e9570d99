// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Onyx Executor: the core logic of executing transactions against a
//! checkpointed ledger state. It encapsulates everything a consensus node
//! needs during execution and nothing more; tracing and trace processing
//! attach through the observer seam.

#[macro_use]
extern crate log;

/// Builtin contracts: the fixed-address native contracts, used here for
/// their gas pricing metadata, access-list pre-warming and account priming.
pub mod builtin;

/// Execution context: the environment facade handed to the interpreter,
/// carrying the block context and the state reachable from a frame.
pub mod context;

/// Transaction execution entry: receives transactions, performs the checks
/// of the active rule set, and submits them to the interpreter.
pub mod executive;

/// Execution engine object: a factory for specs, builtin contracts and the
/// interpreter reference.
pub mod machine;

/// Observability interface: extensions implement this trait to watch the
/// execution without touching consensus state.
pub mod observer;

/// Rule-set oracle: maps block number (and optionally total difficulty) to
/// the spec in force, via the configured transition table.
pub mod spec;

/// Ledger state: a caching and checkpoint layer built upon the semantically
/// meaningful database interfaces.
pub mod state;

/// Transaction execution tracker: records consensus-relevant side effects
/// of the running transaction.
pub mod substate;

/// The default interpreter: executes code-free messages only.
pub mod transfer_vm;

pub use observer as executive_observer;

// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    action_params::ActionParams, env::Env, error::Result,
    messages::MessageResult, spec::Spec,
};
use ethereum_types::{Address, H256, U256};
use primitives::bytes::Bytes;
use std::sync::Arc;

/// The environment facade a message executes against: block context plus the
/// state reachable from this frame. The engine provides the canonical
/// implementation; the interpreter sees only this trait.
pub trait Context {
    fn env(&self) -> &Env;

    fn spec(&self) -> &Spec;

    /// Hash of one of the 256 most recent blocks, zero outside the window.
    fn blockhash(&self, number: &U256) -> H256;

    fn balance(&self, address: &Address) -> Result<U256>;

    fn code(&self, address: &Address) -> Result<Option<Arc<Bytes>>>;

    fn code_hash(&self, address: &Address) -> Result<H256>;

    /// Storage slot of the executing account.
    fn storage_at(&self, key: &H256) -> Result<H256>;

    /// Write a storage slot of the executing account; writing zero deletes.
    fn set_storage(&mut self, key: H256, value: H256) -> Result<()>;

    /// The slot value as of the start of the enclosing transaction; input to
    /// the net-metered storage pricing and refunds.
    fn original_storage_at(&self, key: &H256) -> Result<H256>;

    /// Transaction-scoped scratchpad slot of the executing account.
    fn transient_storage_at(&self, key: &H256) -> Result<H256>;

    fn set_transient_storage(&mut self, key: H256, value: H256) -> Result<()>;

    /// Whether the address was accessed earlier in this transaction.
    fn is_warm_account(&self, address: &Address) -> bool;

    /// Whether the storage slot was accessed earlier in this transaction.
    fn is_warm_storage(&self, address: &Address, key: &H256) -> Result<bool>;

    /// Record an account access for the warm/cold schedule.
    fn mark_warm_account(&mut self, address: Address) -> Result<()>;

    /// Record a storage access for the warm/cold schedule.
    fn mark_warm_storage(&mut self, address: Address, key: H256)
        -> Result<()>;
}

/// The bytecode interpreter. It owns the nested call/create tree of a
/// message: inner frames, their checkpoints and their gas are its business,
/// and it must leave the state consistent with the reported status before
/// returning (a reverted message's writes are already rolled back).
pub trait Interpreter: Send + Sync {
    fn execute_message(
        &self, params: ActionParams, context: &mut dyn Context,
    ) -> Result<MessageResult>;
}

/// An override of the environment facade: wraps the engine's concrete
/// [`Context`] before it reaches the interpreter. Layers may observe or
/// reinterpret environment queries; they hold no reference to the state
/// store of their own.
pub trait EnvironmentLayer: Send + Sync {
    fn wrap<'a>(
        &self, inner: Box<dyn Context + 'a>,
    ) -> Box<dyn Context + 'a>;
}

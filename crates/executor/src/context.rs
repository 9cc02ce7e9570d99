// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

// Transaction execution environment.

use crate::{machine::Machine, state::State, substate::Substate};
use ethereum_types::{Address, H256, U256};
use onyx_statedb::Error as DbError;
use onyx_vm_types::{
    self as vm, ActionParams, ActionValue, Context as ContextTrait, Env, Spec,
};
use primitives::bytes::Bytes;
use std::sync::Arc;

fn db_error(e: DbError) -> vm::Error { vm::Error::StateDb(e.to_string()) }

/// Transaction properties that the environment facade needs to know about.
#[derive(Debug)]
pub struct OriginInfo {
    /// The account this frame executes as.
    address: Address,
    /// The address of the original sender of the transaction.
    original_sender: Address,
    gas_price: U256,
    value: U256,
}

impl OriginInfo {
    /// Populates origin info from action params.
    pub fn from(params: &ActionParams) -> Self {
        OriginInfo {
            address: params.address,
            original_sender: params.original_sender,
            gas_price: params.gas_price,
            value: match params.value {
                ActionValue::Transfer(val) | ActionValue::Apparent(val) => val,
            },
        }
    }

    pub fn recipient(&self) -> &Address { &self.address }

    pub fn original_sender(&self) -> &Address { &self.original_sender }

    pub fn gas_price(&self) -> &U256 { &self.gas_price }

    pub fn value(&self) -> &U256 { &self.value }
}

/// The concrete environment facade handed to the interpreter: block
/// context, active spec, and the state reachable from the executing frame.
pub struct Context<'a> {
    env: &'a Env,
    spec: &'a Spec,
    machine: &'a Machine,
    state: &'a mut State,
    substate: &'a mut Substate,
    origin: OriginInfo,
}

impl<'a> Context<'a> {
    pub fn new(
        state: &'a mut State, env: &'a Env, machine: &'a Machine,
        spec: &'a Spec, substate: &'a mut Substate, origin: OriginInfo,
    ) -> Self {
        Context {
            env,
            spec,
            machine,
            state,
            substate,
            origin,
        }
    }

    pub fn machine(&self) -> &Machine { self.machine }

    pub fn substate(&mut self) -> &mut Substate { self.substate }

    pub fn origin(&self) -> &OriginInfo { &self.origin }
}

impl ContextTrait for Context<'_> {
    fn env(&self) -> &Env { self.env }

    fn spec(&self) -> &Spec { self.spec }

    fn blockhash(&self, number: &U256) -> H256 { self.env.blockhash(number) }

    fn balance(&self, address: &Address) -> vm::Result<U256> {
        self.state.balance(address).map_err(db_error)
    }

    fn code(&self, address: &Address) -> vm::Result<Option<Arc<Bytes>>> {
        self.state.code(address).map_err(db_error)
    }

    fn code_hash(&self, address: &Address) -> vm::Result<H256> {
        self.state.code_hash(address).map_err(db_error)
    }

    fn storage_at(&self, key: &H256) -> vm::Result<H256> {
        self.state
            .storage_at(&self.origin.address, key)
            .map_err(db_error)
    }

    fn set_storage(&mut self, key: H256, value: H256) -> vm::Result<()> {
        self.state
            .set_storage(&self.origin.address, &key, &value)
            .map_err(db_error)
    }

    fn original_storage_at(&self, key: &H256) -> vm::Result<H256> {
        self.state
            .original_storage_at(&self.origin.address, key)
            .map_err(db_error)
    }

    fn transient_storage_at(&self, key: &H256) -> vm::Result<H256> {
        Ok(self.state.transient_storage_at(&self.origin.address, key))
    }

    fn set_transient_storage(
        &mut self, key: H256, value: H256,
    ) -> vm::Result<()> {
        self.state
            .set_transient_storage(self.origin.address, key, value);
        Ok(())
    }

    fn is_warm_account(&self, address: &Address) -> bool {
        self.state.is_warm_account(address)
    }

    fn is_warm_storage(
        &self, address: &Address, key: &H256,
    ) -> vm::Result<bool> {
        Ok(self.state.is_warm_storage_entry(address, key))
    }

    fn mark_warm_account(&mut self, address: Address) -> vm::Result<()> {
        self.state.warm_account(address);
        Ok(())
    }

    fn mark_warm_storage(
        &mut self, address: Address, key: H256,
    ) -> vm::Result<()> {
        self.state.warm_storage_entry(address, key);
        Ok(())
    }
}

// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

pub mod executed;
pub mod execution_outcome;
mod fresh_executive;
mod pre_checked_executive;
#[cfg(test)]
mod tests;
pub mod transact_options;

use ethereum_types::{Address, H256, U256};
use keccak_hash::keccak;
use onyx_statedb::Result as DbResult;
use onyx_vm_types::{Env, Spec};
use primitives::{AccessList, SignedTransaction};
use rlp::RlpStream;

use fresh_executive::FreshExecutive;
use pre_checked_executive::PreCheckedExecutive;

pub use executed::Executed;
pub use execution_outcome::{
    ExecutionError, ExecutionOutcome, TxValidationError,
};
pub use transact_options::{TransactOptions, TransactSettings};

use crate::{
    executive_observer::ExecutiveObserver, machine::Machine, state::State,
};

/// Transaction executor.
pub struct ExecutiveContext<'a> {
    state: &'a mut State,
    env: &'a Env,
    machine: &'a Machine,
    spec: &'a Spec,
}

impl<'a> ExecutiveContext<'a> {
    pub fn new(
        state: &'a mut State, env: &'a Env, machine: &'a Machine,
        spec: &'a Spec,
    ) -> Self {
        ExecutiveContext {
            state,
            env,
            machine,
            spec,
        }
    }

    pub fn transact<O: ExecutiveObserver>(
        self, tx: &SignedTransaction, mut options: TransactOptions<O>,
    ) -> DbResult<ExecutionOutcome> {
        trace!("transact: tx={:?} sender={:?}", tx.hash(), tx.sender());
        options.observer.on_transact_begin(tx);
        let fresh_exec = FreshExecutive::new(self, tx, options);

        Ok(match fresh_exec.check_all()? {
            Ok(executive) => executive.execute_transaction()?,
            Err(execution_outcome) => execution_outcome,
        })
    }
}

/// The intrinsic gas of a transaction: charged before the first opcode
/// runs.
pub fn gas_required_for(
    is_create: bool, data: &[u8], access_list: Option<&AccessList>,
    spec: &Spec,
) -> u64 {
    let init_gas = (if is_create {
        spec.tx_create_gas
    } else {
        spec.tx_gas
    }) as u64;

    let byte_gas = |b: &u8| {
        (match *b {
            0 => spec.tx_data_zero_gas,
            _ => spec.tx_data_non_zero_gas,
        }) as u64
    };
    let data_gas: u64 = data.iter().map(byte_gas).sum();

    let access_gas: u64 = if let Some(acc) = access_list {
        let address_gas =
            acc.len() as u64 * spec.access_list_address_gas as u64;

        let storage_key_num =
            acc.iter().map(|e| e.storage_keys.len() as u64).sum::<u64>();
        let storage_key_gas =
            storage_key_num * spec.access_list_storage_key_gas as u64;

        address_gas + storage_key_gas
    } else {
        0
    };

    let init_code_gas = if is_create && spec.eip3860 {
        ((data.len() as u64 + 31) / 32) * spec.init_code_word_gas as u64
    } else {
        0
    };

    init_gas + data_gas + access_gas + init_code_gas
}

/// How the address of a created contract is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateContractAddress {
    /// From the sender and its account nonce before the create.
    FromSenderNonce,
    /// From the sender, a caller-chosen salt and the init code hash.
    FromSenderSaltAndCodeHash(H256),
}

pub fn contract_address(
    address_scheme: CreateContractAddress, sender: &Address, nonce: &U256,
    code: &[u8],
) -> (Address, H256) {
    let code_hash = keccak(code);
    let address = match address_scheme {
        CreateContractAddress::FromSenderNonce => {
            let mut stream = RlpStream::new_list(2);
            stream.append(sender);
            stream.append(nonce);
            let hash = keccak(stream.out());
            Address::from_slice(&hash[12..])
        }
        CreateContractAddress::FromSenderSaltAndCodeHash(salt) => {
            let mut buffer = [0u8; 1 + 20 + 32 + 32];
            buffer[0] = 0xff;
            buffer[1..21].copy_from_slice(sender.as_bytes());
            buffer[21..53].copy_from_slice(salt.as_bytes());
            buffer[53..].copy_from_slice(code_hash.as_bytes());
            let hash = keccak(buffer);
            Address::from_slice(&hash[12..])
        }
    };
    (address, code_hash)
}

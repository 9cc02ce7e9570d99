// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use super::{
    contract_address,
    executed::Executed,
    execution_outcome::{ExecutionError, ExecutionOutcome},
    fresh_executive::CostInfo,
    transact_options::TransactSettings,
    CreateContractAddress, ExecutiveContext,
};
use crate::{
    context::{Context, OriginInfo},
    executive_observer::ExecutiveObserver,
    state::CleanupMode,
    substate::Substate,
};

use ethereum_types::{Address, U256};
use onyx_statedb::{Error as DbError, Result as DbResult};
use onyx_vm_types::{
    ActionParams, ActionValue, CallType, CreateType, MessageResult,
    MessageStatus,
};
use primitives::{Action, SignedTransaction};
use std::{cmp::min, sync::Arc};

/// A transaction that passed every pre-execution check. Executing it
/// charges the sender irrevocably, then runs the top-level message under a
/// checkpoint.
pub struct PreCheckedExecutive<'a, O: ExecutiveObserver> {
    pub(super) context: ExecutiveContext<'a>,
    pub(super) tx: &'a SignedTransaction,
    pub(super) observer: O,
    pub(super) settings: TransactSettings,
    pub(super) cost: CostInfo,
    pub(super) substate: Substate,
}

impl<'a, O: ExecutiveObserver> PreCheckedExecutive<'a, O> {
    pub(super) fn execute_transaction(
        mut self,
    ) -> DbResult<ExecutionOutcome> {
        let sender = self.tx.sender();

        // The gas purchase and the nonce bump stick even when the message
        // fails: the transaction is included either way.
        self.context.state.inc_nonce(&sender)?;
        if self.settings.charge_gas {
            let mut cleanup =
                CleanupMode::TrackTouched(&mut self.substate.touched);
            self.context.state.sub_balance(
                &sender,
                &self.cost.gas_cost,
                &mut cleanup,
            )?;
        }

        self.context.state.checkpoint();

        let result = match self.exec_top_message() {
            Ok(result) => result,
            Err(e) => {
                // Database failures poison the engine, but the journal must
                // still balance on the way out.
                let _ = self.context.state.revert_to_checkpoint();
                self.context.state.clear_tx_scope();
                return Err(e);
            }
        };
        self.observer.on_message_result(&result);

        let outcome = self.settle(result)?;
        Ok(outcome)
    }

    /// Pre-warm the access sets, transfer the value and hand the top-level
    /// message to the interpreter.
    fn exec_top_message(&mut self) -> DbResult<MessageResult> {
        let sender = self.tx.sender();
        let value = *self.tx.unsigned.value();
        let gas = *self.tx.gas() - U256::from(self.cost.base_gas);

        self.pre_warm_access_sets();

        let params = match self.tx.action() {
            &Action::Call(to) => {
                self.context.state.transfer_balance(
                    &sender,
                    &to,
                    &value,
                    CleanupMode::TrackTouched(&mut self.substate.touched),
                )?;
                ActionParams {
                    address: to,
                    code_address: to,
                    sender,
                    original_sender: sender,
                    gas,
                    gas_price: self.cost.gas_price,
                    value: ActionValue::Transfer(value),
                    code: self.context.state.code(&to)?,
                    code_hash: Some(self.context.state.code_hash(&to)?),
                    data: Some(self.tx.data().clone()),
                    call_type: CallType::Call,
                    create_type: CreateType::None,
                    salt: None,
                    static_flag: false,
                }
            }
            &Action::Create => {
                // The sender nonce was bumped above; the create address is
                // derived from the pre-bump nonce.
                let prev_nonce =
                    self.context.state.nonce(&sender)? - U256::one();
                let (new_address, code_hash) = contract_address(
                    CreateContractAddress::FromSenderNonce,
                    &sender,
                    &prev_nonce,
                    self.tx.data(),
                );

                // Address collision: creation fails consuming all gas.
                if self.context.state.is_contract_with_code(&new_address)?
                    || self.context.state.nonce(&new_address)?
                        > U256::zero()
                {
                    return Ok(MessageResult::exceptional_halt());
                }

                let start_nonce = if self.context.spec.eip158 {
                    U256::one()
                } else {
                    U256::zero()
                };
                self.context.state.new_contract(
                    &new_address,
                    U256::zero(),
                    start_nonce,
                )?;
                self.context.state.transfer_balance(
                    &sender,
                    &new_address,
                    &value,
                    CleanupMode::TrackTouched(&mut self.substate.touched),
                )?;
                if self.context.spec.eip2929 {
                    self.context.state.warm_account(new_address);
                }
                ActionParams {
                    address: new_address,
                    code_address: new_address,
                    sender,
                    original_sender: sender,
                    gas,
                    gas_price: self.cost.gas_price,
                    value: ActionValue::Transfer(value),
                    code: Some(Arc::new(self.tx.data().clone())),
                    code_hash: Some(code_hash),
                    data: None,
                    call_type: CallType::None,
                    create_type: CreateType::CREATE,
                    salt: None,
                    static_flag: false,
                }
            }
        };

        let is_create = params.is_create();
        let create_address = params.address;
        let mut result = exec_vm(&mut self.context, &mut self.substate, params)?;

        if is_create && result.status == MessageStatus::Success {
            result = self.finish_create(create_address, result)?;
        }
        Ok(result)
    }

    /// Install the deployed code of a successful create, enforcing the
    /// code-deposit rules of the active rule set.
    fn finish_create(
        &mut self, address: Address, mut result: MessageResult,
    ) -> DbResult<MessageResult> {
        let spec = self.context.spec;
        if spec.eip3541 && result.return_data.first() == Some(&0xef) {
            return Ok(MessageResult::exceptional_halt());
        }
        if result.return_data.len() > spec.create_data_limit {
            return Ok(MessageResult::exceptional_halt());
        }
        if !result.return_data.is_empty() {
            self.context
                .state
                .init_code(&address, result.return_data.clone())?;
        }
        result.created_address = Some(address);
        // The deployed bytecode is not part of the transaction output.
        result.return_data = vec![];
        Ok(result)
    }

    fn pre_warm_access_sets(&mut self) {
        let spec = self.context.spec;
        if !spec.eip2929 {
            return;
        }
        let state = &mut *self.context.state;
        state.warm_account(self.tx.sender());
        if let Action::Call(to) = self.tx.action() {
            state.warm_account(*to);
        }
        if spec.eip3651 {
            state.warm_account(self.context.env.author);
        }
        for address in self
            .context
            .machine
            .builtin_accounts(self.context.env.number)
        {
            state.warm_account(address);
        }
        if let Some(access_list) = self.tx.access_list() {
            for item in access_list {
                state.warm_account(item.address);
                for key in &item.storage_keys {
                    state.warm_storage_entry(item.address, *key);
                }
            }
        }
    }

    /// Close the checkpoint, apply refunds and fees, sweep destroyed and
    /// empty accounts, and shape the outcome.
    fn settle(mut self, result: MessageResult) -> DbResult<ExecutionOutcome> {
        let sender = self.tx.sender();
        let spec = self.context.spec;
        let env = self.context.env;
        let tx_gas = *self.tx.gas();
        let gas_price = self.cost.gas_price;

        let message_gas = tx_gas - U256::from(self.cost.base_gas);
        let gas_left = match result.status {
            MessageStatus::ExceptionalHalt => U256::zero(),
            // Defend against an interpreter reporting more than it got.
            _ => min(result.gas_left, message_gas),
        };
        let success = result.status == MessageStatus::Success;

        if success {
            self.substate.accrue_message(&result);
            self.context.state.discard_checkpoint()?;
        } else {
            self.context.state.revert_to_checkpoint()?;
            // Touches inside the reverted message no longer count for the
            // cleanup sweep; the settlement below re-registers the sender
            // and the author.
            self.substate.touched.clear();
        }

        let gas_used_before_refund = tx_gas - gas_left;
        let refund = if success {
            min(
                U256::from(self.substate.creditable_refund()),
                gas_used_before_refund
                    / U256::from(spec.max_refund_quotient),
            )
        } else {
            U256::zero()
        };
        let gas_used = gas_used_before_refund - refund;

        if self.settings.charge_gas {
            // Unused and refunded gas flows back to the sender.
            let repayment = (tx_gas - gas_used) * gas_price;
            self.context.state.add_balance(
                &sender,
                &repayment,
                CleanupMode::TrackTouched(&mut self.substate.touched),
            )?;

            // The author earns the priority component; the base-fee
            // component is destroyed under the fee market.
            let author_price = if spec.eip1559 {
                gas_price.saturating_sub(env.base_fee)
            } else {
                gas_price
            };
            self.context.state.add_balance(
                &env.author,
                &(gas_used * author_price),
                CleanupMode::TrackTouched(&mut self.substate.touched),
            )?;
        }

        for address in self.substate.suicides.clone() {
            self.context.state.kill_account(&address);
        }
        if spec.eip158 {
            self.context.state.kill_garbage(&self.substate.touched)?;
        }
        self.context.state.clear_tx_scope();

        let fee = gas_used * gas_price;
        let burnt_fee = if spec.eip1559 {
            gas_used * env.base_fee
        } else {
            U256::zero()
        };
        let executed = Executed {
            gas_used,
            fee,
            burnt_fee,
            logs: std::mem::take(&mut self.substate.logs),
            contracts_created: std::mem::take(
                &mut self.substate.contracts_created,
            ),
            output: result.return_data.clone(),
        };

        let outcome = match result.status {
            MessageStatus::Success => ExecutionOutcome::Finished(executed),
            MessageStatus::Revert => ExecutionOutcome::ExecutionErrorBumpNonce(
                ExecutionError::Revert,
                executed,
            ),
            MessageStatus::ExceptionalHalt => {
                ExecutionOutcome::ExecutionErrorBumpNonce(
                    ExecutionError::ExceptionalHalt,
                    executed,
                )
            }
        };
        self.observer.on_transact_end(&outcome);
        Ok(outcome)
    }
}

/// Run one message against the environment facade, wrapped by the
/// configured environment layer when one is installed.
pub(super) fn exec_vm(
    context: &mut ExecutiveContext, substate: &mut Substate,
    params: ActionParams,
) -> DbResult<MessageResult> {
    let origin = OriginInfo::from(&params);
    let vm = Arc::clone(context.machine.vm());
    let layer = context.machine.environment_layer().cloned();
    let vm_context = Context::new(
        &mut *context.state,
        context.env,
        context.machine,
        context.spec,
        substate,
        origin,
    );
    let result = match layer {
        Some(layer) => {
            let mut wrapped = layer.wrap(Box::new(vm_context));
            vm.execute_message(params, &mut *wrapped)
        }
        None => {
            let mut vm_context = vm_context;
            vm.execute_message(params, &mut vm_context)
        }
    };
    result.map_err(|e| DbError::Msg(format!("interpreter failure: {}", e)))
}

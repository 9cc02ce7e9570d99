// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use super::{
    execution_outcome::{ExecutionOutcome, TxValidationError},
    gas_required_for,
    transact_options::{TransactOptions, TransactSettings},
    ExecutiveContext, PreCheckedExecutive,
};
use crate::{executive_observer::ExecutiveObserver, substate::Substate};

use ethereum_types::{U256, U512};
use onyx_statedb::Result as DbResult;
use primitives::{
    transaction::{
        ACCESS_LIST_TX_TYPE, FEE_MARKET_TX_TYPE, LEGACY_TX_TYPE,
    },
    Action, SignedTransaction,
};

macro_rules! early_return_on_err {
    ($e:expr) => {
        match $e {
            Ok(x) => x,
            Err(validation_error) => {
                return Ok(Err(ExecutionOutcome::NotExecuted(
                    validation_error,
                )));
            }
        }
    };
}

/// A transaction before its pre-execution checks. `check_all` either
/// rejects it with no state change at all, or promotes it to a
/// [`PreCheckedExecutive`].
pub struct FreshExecutive<'a, O: ExecutiveObserver> {
    context: ExecutiveContext<'a>,
    tx: &'a SignedTransaction,
    observer: O,
    settings: TransactSettings,
    base_gas: u64,
}

/// The cost sheet established by the pre-checks.
pub(super) struct CostInfo {
    /// The intrinsic gas (21000/53000 + tx data gas + access list gas).
    pub base_gas: u64,
    /// Effective gas price charged per unit.
    pub gas_price: U256,
    /// Up-front gas purchase, known to fit the sender balance.
    pub gas_cost: U256,
    /// Gas purchase plus transferred value.
    pub total_cost: U512,
}

impl<'a, O: ExecutiveObserver> FreshExecutive<'a, O> {
    pub fn new(
        context: ExecutiveContext<'a>, tx: &'a SignedTransaction,
        options: TransactOptions<O>,
    ) -> Self {
        let TransactOptions { observer, settings } = options;
        let base_gas = gas_required_for(
            tx.action() == &Action::Create,
            tx.data(),
            tx.access_list(),
            context.spec,
        );
        FreshExecutive {
            context,
            tx,
            observer,
            settings,
            base_gas,
        }
    }

    pub(super) fn check_all(
        self,
    ) -> DbResult<Result<PreCheckedExecutive<'a, O>, ExecutionOutcome>> {
        early_return_on_err!(self.check_signature());
        early_return_on_err!(self.check_tx_type());
        early_return_on_err!(self.check_block_gas_limit());
        early_return_on_err!(self.check_intrinsic_gas());
        early_return_on_err!(self.check_nonce()?);
        let cost = early_return_on_err!(self.compute_cost_info()?);

        Ok(Ok(self.into_pre_checked(cost)))
    }

    fn into_pre_checked(self, cost: CostInfo) -> PreCheckedExecutive<'a, O> {
        PreCheckedExecutive {
            context: self.context,
            tx: self.tx,
            observer: self.observer,
            settings: self.settings,
            cost,
            substate: Substate::new(),
        }
    }
}

impl<'a, O: ExecutiveObserver> FreshExecutive<'a, O> {
    fn check_signature(&self) -> Result<(), TxValidationError> {
        if let Some(chain_id) = self.tx.chain_id() {
            let expected = self.context.env.chain_id;
            if chain_id != expected {
                return Err(TxValidationError::WrongChainId {
                    expected,
                    got: chain_id,
                });
            }
        }
        if !self.settings.check_signature {
            return Ok(());
        }
        match self.tx.verify_public() {
            Ok(true) => Ok(()),
            _ => Err(TxValidationError::BadSignature),
        }
    }

    fn check_tx_type(&self) -> Result<(), TxValidationError> {
        let spec = self.context.spec;
        let tx_type = self.tx.unsigned.tx_type();
        let enabled = match tx_type {
            LEGACY_TX_TYPE => true,
            ACCESS_LIST_TX_TYPE => spec.eip2930,
            FEE_MARKET_TX_TYPE => spec.eip1559,
            _ => false,
        };
        if enabled {
            Ok(())
        } else {
            Err(TxValidationError::UnsupportedTxType { tx_type })
        }
    }

    fn check_block_gas_limit(&self) -> Result<(), TxValidationError> {
        if !self.settings.check_block_gas_limit {
            return Ok(());
        }
        let env = self.context.env;
        let remaining = env
            .gas_limit
            .saturating_sub(env.accumulated_gas_used);
        if *self.tx.gas() > remaining {
            Err(TxValidationError::BlockGasLimitExceeded {
                remaining,
                got: *self.tx.gas(),
            })
        } else {
            Ok(())
        }
    }

    fn check_intrinsic_gas(&self) -> Result<(), TxValidationError> {
        let spec = self.context.spec;
        let is_create = self.tx.action() == &Action::Create;
        if is_create
            && spec.eip3860
            && self.tx.data().len() > spec.init_code_data_limit
        {
            return Err(TxValidationError::InitCodeExceedsLimit {
                limit: spec.init_code_data_limit,
                got: self.tx.data().len(),
            });
        }
        if *self.tx.gas() < U256::from(self.base_gas) {
            return Err(TxValidationError::IntrinsicGasTooLow {
                required: self.base_gas,
                got: *self.tx.gas(),
            });
        }
        Ok(())
    }

    fn check_nonce(&self) -> DbResult<Result<(), TxValidationError>> {
        if !self.settings.check_nonce {
            return Ok(Ok(()));
        }
        let nonce = self.context.state.nonce(&self.tx.sender())?;
        Ok(if *self.tx.nonce() != nonce {
            Err(TxValidationError::NonceMismatch {
                expected: nonce,
                got: *self.tx.nonce(),
            })
        } else {
            Ok(())
        })
    }

    fn compute_cost_info(
        &self,
    ) -> DbResult<Result<CostInfo, TxValidationError>> {
        let tx = self.tx;
        let env = self.context.env;
        let spec = self.context.spec;

        let gas_price = if spec.eip1559 && self.settings.check_base_price {
            let fee_cap = *tx.gas_price();
            if fee_cap < env.base_fee {
                return Ok(Err(TxValidationError::FeeCapBelowBaseFee {
                    base_fee: env.base_fee,
                    fee_cap,
                }));
            }
            let priority_fee = *tx.unsigned.max_priority_gas_price();
            if priority_fee > fee_cap {
                return Ok(Err(TxValidationError::PriorityFeeAboveFeeCap {
                    fee_cap,
                    priority_fee,
                }));
            }
            tx.unsigned.effective_gas_price(&env.base_fee)
        } else {
            *tx.gas_price()
        };

        let gas_cost = if self.settings.charge_gas {
            tx.gas().full_mul(gas_price)
        } else {
            U512::zero()
        };
        let sender_balance = U512::from(
            self.context.state.balance(&tx.sender())?,
        );
        let total_cost = U512::from(*tx.unsigned.value()) + gas_cost;

        if sender_balance < total_cost {
            return Ok(Err(TxValidationError::InsufficientFunds {
                required: total_cost,
                balance: sender_balance,
            }));
        }

        // `gas_cost <= total_cost <= sender_balance`, which is a U256.
        let gas_cost = U256::try_from(gas_cost)
            .expect("gas cost checked against a U256 balance");

        Ok(Ok(CostInfo {
            base_gas: self.base_gas,
            gas_price,
            gas_cost,
            total_cost,
        }))
    }
}

// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use super::*;
use crate::{
    machine::Machine,
    spec::CommonParams,
    state::{get_state_for_genesis_write, CleanupMode, State},
};
use ethereum_types::{Address, H256, U512};
use onyx_vm_types::{
    ActionParams, Context as ContextTrait, Interpreter, MessageResult,
    MessageStatus,
};
use primitives::{
    transaction::{FeeMarketTransaction, LegacyTransaction},
    Action, Transaction,
};
use std::{collections::HashMap, sync::Arc};

/// A scripted interpreter: per-address behaviors, code-free messages
/// succeed with their full gas.
#[derive(Default)]
struct MockVm {
    behaviors: HashMap<Address, MockBehavior>,
}

#[derive(Clone)]
enum MockBehavior {
    /// Consume some gas, then succeed, optionally granting a refund.
    Consume { gas: u64, refund_delta: i64 },
    /// Consume some gas, then revert with the given payload.
    Revert { gas: u64, data: Vec<u8> },
    /// Halt exceptionally.
    Halt,
    /// Succeed returning the given deployed code (for creates).
    Deploy { gas: u64, code: Vec<u8> },
}

impl MockVm {
    fn with(mut self, address: Address, behavior: MockBehavior) -> Self {
        self.behaviors.insert(address, behavior);
        self
    }
}

impl Interpreter for MockVm {
    fn execute_message(
        &self, params: ActionParams, _context: &mut dyn ContextTrait,
    ) -> onyx_vm_types::Result<MessageResult> {
        let behavior = match self.behaviors.get(&params.code_address) {
            Some(behavior) => behavior.clone(),
            None => return Ok(MessageResult::success(params.gas)),
        };
        Ok(match behavior {
            MockBehavior::Consume { gas, refund_delta } => {
                let mut result =
                    MessageResult::success(params.gas - gas);
                result.refund_delta = refund_delta;
                result
            }
            MockBehavior::Revert { gas, data } => {
                MessageResult::reverted(params.gas - gas, data)
            }
            MockBehavior::Halt => MessageResult::exceptional_halt(),
            MockBehavior::Deploy { gas, code } => {
                let mut result =
                    MessageResult::success(params.gas - gas);
                result.return_data = code;
                result
            }
        })
    }
}

const GWEI: u64 = 1_000_000_000;
const ETHER: u64 = 1_000_000_000_000_000_000;

fn sender_address() -> Address { Address::repeat_byte(0x11) }

fn author_address() -> Address { Address::repeat_byte(0xcc) }

fn test_env(spec: &onyx_vm_types::Spec) -> onyx_vm_types::Env {
    onyx_vm_types::Env {
        number: 1,
        author: author_address(),
        gas_limit: 30_000_000.into(),
        base_fee: if spec.eip1559 { 50.into() } else { 0.into() },
        chain_id: 1,
        ..Default::default()
    }
}

fn funded_state(balance: u64) -> State {
    let mut state = get_state_for_genesis_write();
    state
        .add_balance(
            &sender_address(),
            &balance.into(),
            CleanupMode::ForceCreate,
        )
        .unwrap();
    state
}

fn transfer_tx(
    nonce: u64, to: Address, value: u64, gas: u64, gas_price: u64,
) -> primitives::SignedTransaction {
    Transaction::Legacy(LegacyTransaction {
        nonce: nonce.into(),
        gas_price: gas_price.into(),
        gas: gas.into(),
        action: Action::Call(to),
        value: value.into(),
        data: vec![],
        chain_id: Some(1),
    })
    .fake_sign(sender_address())
}

fn unchecked_options() -> TransactOptions<()> {
    TransactOptions {
        observer: (),
        settings: TransactSettings::unchecked_signature(),
    }
}

fn transact(
    state: &mut State, machine: &Machine,
    tx: &primitives::SignedTransaction,
) -> ExecutionOutcome {
    let spec = machine.spec_for_test(1);
    let env = test_env(&spec);
    ExecutiveContext::new(state, &env, machine, &spec)
        .transact(tx, unchecked_options())
        .expect("no db error")
}

#[test]
fn simple_transfer_settles_balances() {
    let machine = Machine::new_with_default_vm(CommonParams::default());
    let mut state = funded_state(ETHER);
    let recipient = Address::repeat_byte(0x22);

    let tx = transfer_tx(0, recipient, 1_000_000_000_000, 21000, GWEI);
    let outcome = transact(&mut state, &machine, &tx);

    let executed = outcome.successfully_executed().expect("must succeed");
    assert_eq!(executed.gas_used, U256::from(21000));
    assert_eq!(executed.fee, U256::from(21000u64) * U256::from(GWEI));

    let expected_sender = U256::from(ETHER)
        - U256::from(1_000_000_000_000u64)
        - U256::from(21000u64) * U256::from(GWEI);
    assert_eq!(state.balance(&sender_address()).unwrap(), expected_sender);
    assert_eq!(
        state.balance(&recipient).unwrap(),
        U256::from(1_000_000_000_000u64)
    );
    assert_eq!(state.nonce(&sender_address()).unwrap(), U256::one());
    // Pre-London the author earns the full fee.
    assert_eq!(state.balance(&author_address()).unwrap(), executed.fee);
    assert_eq!(state.checkpoint_depth(), 0);
}

#[test]
fn insufficient_funds_leaves_state_untouched() {
    let machine = Machine::new_with_default_vm(CommonParams::default());
    let mut state = funded_state(1_000_000);

    let tx = transfer_tx(0, Address::repeat_byte(0x22), 1_000_000_000_000, 21000, GWEI);
    let outcome = transact(&mut state, &machine, &tx);

    assert!(matches!(
        outcome,
        ExecutionOutcome::NotExecuted(TxValidationError::InsufficientFunds {
            ..
        })
    ));
    assert_eq!(state.balance(&sender_address()).unwrap(), U256::from(1_000_000));
    assert_eq!(state.nonce(&sender_address()).unwrap(), U256::zero());
    assert_eq!(state.checkpoint_depth(), 0);
}

#[test]
fn nonce_gap_is_rejected_without_state_change() {
    let machine = Machine::new_with_default_vm(CommonParams::default());
    let mut state = funded_state(ETHER);

    let tx = transfer_tx(1, Address::repeat_byte(0x22), 1, 21000, GWEI);
    let outcome = transact(&mut state, &machine, &tx);

    assert!(matches!(
        outcome,
        ExecutionOutcome::NotExecuted(TxValidationError::NonceMismatch {
            expected,
            got,
        }) if expected.is_zero() && got == U256::one()
    ));
    assert_eq!(state.nonce(&sender_address()).unwrap(), U256::zero());
}

#[test]
fn intrinsic_gas_too_low_is_rejected() {
    let machine = Machine::new_with_default_vm(CommonParams::default());
    let mut state = funded_state(ETHER);

    let tx = transfer_tx(0, Address::repeat_byte(0x22), 1, 20999, GWEI);
    let outcome = transact(&mut state, &machine, &tx);
    assert!(matches!(
        outcome,
        ExecutionOutcome::NotExecuted(
            TxValidationError::IntrinsicGasTooLow { required: 21000, .. }
        )
    ));
}

#[test]
fn reverting_call_charges_used_gas_and_bumps_nonce() {
    let contract = Address::repeat_byte(0x77);
    let vm = MockVm::default().with(
        contract,
        MockBehavior::Revert {
            gas: 30_000,
            data: vec![0xde, 0xad, 0xbe, 0xef],
        },
    );
    let machine =
        Machine::new_with_builtin(CommonParams::default(), Arc::new(vm));
    let mut state = funded_state(ETHER);
    state
        .new_contract(&contract, U256::zero(), U256::one())
        .unwrap();
    state.init_code(&contract, vec![0xfe]).unwrap();

    let tx = transfer_tx(0, contract, 0, 100_000, GWEI);
    let outcome = transact(&mut state, &machine, &tx);

    let executed = match &outcome {
        ExecutionOutcome::ExecutionErrorBumpNonce(
            ExecutionError::Revert,
            executed,
        ) => executed,
        other => panic!("expected revert outcome, got {:?}", other),
    };
    // 21000 intrinsic + 30000 consumed by the contract.
    assert_eq!(executed.gas_used, U256::from(51_000));
    assert_eq!(executed.output, vec![0xde, 0xad, 0xbe, 0xef]);
    assert!(executed.logs.is_empty());

    // Fee paid for used gas only; the unused portion returned.
    let expected_sender =
        U256::from(ETHER) - U256::from(51_000u64) * U256::from(GWEI);
    assert_eq!(state.balance(&sender_address()).unwrap(), expected_sender);
    assert_eq!(state.nonce(&sender_address()).unwrap(), U256::one());
    // The contract saw no lasting effect.
    assert_eq!(state.balance(&contract).unwrap(), U256::zero());
    assert_eq!(state.checkpoint_depth(), 0);
}

#[test]
fn exceptional_halt_consumes_all_gas() {
    let contract = Address::repeat_byte(0x78);
    let vm = MockVm::default().with(contract, MockBehavior::Halt);
    let machine =
        Machine::new_with_builtin(CommonParams::default(), Arc::new(vm));
    let mut state = funded_state(ETHER);
    state
        .new_contract(&contract, U256::zero(), U256::one())
        .unwrap();
    state.init_code(&contract, vec![0xfe]).unwrap();

    let tx = transfer_tx(0, contract, 0, 90_000, GWEI);
    let outcome = transact(&mut state, &machine, &tx);

    let executed = match &outcome {
        ExecutionOutcome::ExecutionErrorBumpNonce(
            ExecutionError::ExceptionalHalt,
            executed,
        ) => executed,
        other => panic!("expected halt outcome, got {:?}", other),
    };
    assert_eq!(executed.gas_used, U256::from(90_000));
    let expected_sender =
        U256::from(ETHER) - U256::from(90_000u64) * U256::from(GWEI);
    assert_eq!(state.balance(&sender_address()).unwrap(), expected_sender);
}

#[test]
fn create_deploys_returned_code() {
    let params = CommonParams::latest_at_genesis();
    let sender = sender_address();
    let init_code = vec![0x60, 0x00, 0x60, 0x00];
    let deployed = vec![0x60, 0x01];

    let (new_address, _) = contract_address(
        CreateContractAddress::FromSenderNonce,
        &sender,
        &U256::zero(),
        &init_code,
    );
    let vm = MockVm::default().with(
        new_address,
        MockBehavior::Deploy {
            gas: 20_000,
            code: deployed.clone(),
        },
    );
    let machine = Machine::new_with_builtin(params, Arc::new(vm));
    let mut state = funded_state(ETHER);

    let tx = Transaction::Legacy(LegacyTransaction {
        nonce: 0.into(),
        gas_price: GWEI.into(),
        gas: 200_000.into(),
        action: Action::Create,
        value: 7.into(),
        data: init_code,
        chain_id: Some(1),
    })
    .fake_sign(sender);
    let outcome = transact(&mut state, &machine, &tx);

    let executed = outcome.successfully_executed().expect("create succeeds");
    assert_eq!(executed.contracts_created, vec![new_address]);
    assert_eq!(
        state.code(&new_address).unwrap().as_deref(),
        Some(&deployed)
    );
    // Post-cleanup rule sets start contracts at nonce one.
    assert_eq!(state.nonce(&new_address).unwrap(), U256::one());
    assert_eq!(state.balance(&new_address).unwrap(), U256::from(7));
}

#[test]
fn refund_is_clamped_to_quotient_of_used_gas() {
    let contract = Address::repeat_byte(0x79);
    let vm = MockVm::default().with(
        contract,
        MockBehavior::Consume {
            gas: 40_000,
            refund_delta: 1_000_000,
        },
    );
    // Genesis rules: refund quotient of two.
    let machine =
        Machine::new_with_builtin(CommonParams::default(), Arc::new(vm));
    let mut state = funded_state(ETHER);
    state
        .new_contract(&contract, U256::zero(), U256::one())
        .unwrap();
    state.init_code(&contract, vec![0xfe]).unwrap();

    let tx = transfer_tx(0, contract, 0, 100_000, GWEI);
    let outcome = transact(&mut state, &machine, &tx);

    let executed = outcome.successfully_executed().expect("must succeed");
    // Used before refund: 61000; clamp: 61000 / 2 = 30500.
    assert_eq!(executed.gas_used, U256::from(61_000 - 30_500));
}

#[test]
fn fee_market_pays_author_priority_only() {
    let params = CommonParams::latest_at_genesis();
    let machine = Machine::new_with_default_vm(params);
    let mut state = funded_state(ETHER);
    let recipient = Address::repeat_byte(0x22);

    let tx = Transaction::FeeMarket(FeeMarketTransaction {
        chain_id: 1,
        nonce: 0.into(),
        max_priority_fee_per_gas: 10.into(),
        max_fee_per_gas: 100.into(),
        gas: 21000.into(),
        action: Action::Call(recipient),
        value: 1000.into(),
        data: vec![],
        access_list: vec![],
    })
    .fake_sign(sender_address());
    let outcome = transact(&mut state, &machine, &tx);

    let executed = outcome.successfully_executed().expect("must succeed");
    // base fee 50 + priority 10 = 60, below the cap of 100.
    assert_eq!(executed.fee, U256::from(21000u64 * 60));
    assert_eq!(executed.burnt_fee, U256::from(21000u64 * 50));
    assert_eq!(
        state.balance(&author_address()).unwrap(),
        U256::from(21000u64 * 10)
    );
    let expected_sender = U256::from(ETHER)
        - U256::from(1000u64)
        - U256::from(21000u64 * 60);
    assert_eq!(state.balance(&sender_address()).unwrap(), expected_sender);
}

#[test]
fn fee_cap_below_base_fee_is_rejected() {
    let params = CommonParams::latest_at_genesis();
    let machine = Machine::new_with_default_vm(params);
    let mut state = funded_state(ETHER);

    let tx = Transaction::FeeMarket(FeeMarketTransaction {
        chain_id: 1,
        nonce: 0.into(),
        max_priority_fee_per_gas: 1.into(),
        max_fee_per_gas: 49.into(),
        gas: 21000.into(),
        action: Action::Call(Address::repeat_byte(0x22)),
        value: 0.into(),
        data: vec![],
        access_list: vec![],
    })
    .fake_sign(sender_address());
    let outcome = transact(&mut state, &machine, &tx);

    assert!(matches!(
        outcome,
        ExecutionOutcome::NotExecuted(
            TxValidationError::FeeCapBelowBaseFee { .. }
        )
    ));
    assert_eq!(state.balance(&sender_address()).unwrap(), U256::from(ETHER));
}

#[test]
fn wrong_chain_id_is_rejected() {
    let machine = Machine::new_with_default_vm(CommonParams::default());
    let mut state = funded_state(ETHER);

    let tx = Transaction::Legacy(LegacyTransaction {
        nonce: 0.into(),
        gas_price: GWEI.into(),
        gas: 21000.into(),
        action: Action::Call(Address::repeat_byte(0x22)),
        value: 0.into(),
        data: vec![],
        chain_id: Some(5),
    })
    .fake_sign(sender_address());
    let outcome = transact(&mut state, &machine, &tx);

    assert!(matches!(
        outcome,
        ExecutionOutcome::NotExecuted(TxValidationError::WrongChainId {
            expected: 1,
            got: 5,
        })
    ));
}

#[test]
fn unsupported_tx_type_before_activation() {
    // Default params never activate the fee market.
    let machine = Machine::new_with_default_vm(CommonParams::default());
    let mut state = funded_state(ETHER);

    let tx = Transaction::FeeMarket(FeeMarketTransaction {
        chain_id: 1,
        nonce: 0.into(),
        max_priority_fee_per_gas: 1.into(),
        max_fee_per_gas: 100.into(),
        gas: 21000.into(),
        action: Action::Call(Address::repeat_byte(0x22)),
        value: 0.into(),
        data: vec![],
        access_list: vec![],
    })
    .fake_sign(sender_address());
    let outcome = transact(&mut state, &machine, &tx);

    assert!(matches!(
        outcome,
        ExecutionOutcome::NotExecuted(TxValidationError::UnsupportedTxType {
            tx_type: 2,
        })
    ));
}

#[test]
fn zero_value_transfer_sweeps_touched_empty_account() {
    let params = CommonParams::latest_at_genesis();
    let machine = Machine::new_with_default_vm(params);
    let mut state = funded_state(ETHER);
    let empty = Address::repeat_byte(0x33);
    state
        .add_balance(&empty, &U256::zero(), CleanupMode::ForceCreate)
        .unwrap();
    assert!(state.exists(&empty).unwrap());

    let tx = transfer_tx(0, empty, 0, 21000, GWEI);
    let outcome = transact(&mut state, &machine, &tx);
    assert!(outcome.successfully_executed().is_some());
    assert!(!state.exists(&empty).unwrap());
}

#[test]
fn access_list_is_pre_warmed() {
    #[derive(Default)]
    struct WarmProbe;
    // Succeeds only when the listed slot is already warm.
    impl Interpreter for WarmProbe {
        fn execute_message(
            &self, params: ActionParams, context: &mut dyn ContextTrait,
        ) -> onyx_vm_types::Result<MessageResult> {
            let listed = Address::repeat_byte(0x44);
            let key = H256::repeat_byte(0x01);
            let warm = context.is_warm_account(&listed)
                && context.is_warm_storage(&listed, &key)?
                && context.is_warm_account(&params.sender);
            Ok(if warm {
                MessageResult::success(params.gas)
            } else {
                MessageResult::exceptional_halt()
            })
        }
    }

    let params = CommonParams::latest_at_genesis();
    let machine = Machine::new_with_builtin(params, Arc::new(WarmProbe));
    let mut state = funded_state(ETHER);
    let contract = Address::repeat_byte(0x45);
    state
        .new_contract(&contract, U256::zero(), U256::one())
        .unwrap();
    state.init_code(&contract, vec![0xfe]).unwrap();

    let tx = Transaction::AccessList(primitives::transaction::AccessListTransaction {
        chain_id: 1,
        nonce: 0.into(),
        gas_price: 100.into(),
        gas: 100_000.into(),
        action: Action::Call(contract),
        value: 0.into(),
        data: vec![],
        access_list: vec![primitives::AccessListItem {
            address: Address::repeat_byte(0x44),
            storage_keys: vec![H256::repeat_byte(0x01)],
        }],
    })
    .fake_sign(sender_address());
    let outcome = transact(&mut state, &machine, &tx);
    assert!(outcome.successfully_executed().is_some());
    // The transaction scope was cleared afterwards.
    assert!(!state.is_warm_account(&Address::repeat_byte(0x44)));
}

#[test]
fn intrinsic_gas_covers_data_and_access_list() {
    let mut spec = onyx_vm_types::Spec::genesis_spec();
    assert_eq!(gas_required_for(false, &[], None, &spec), 21000);
    assert_eq!(gas_required_for(true, &[], None, &spec), 53000);
    assert_eq!(
        gas_required_for(false, &[0, 1, 0], None, &spec),
        21000 + 4 + 68 + 4
    );

    let access_list = vec![primitives::AccessListItem {
        address: Address::repeat_byte(0x01),
        storage_keys: vec![H256::zero(), H256::zero()],
    }];
    assert_eq!(
        gas_required_for(false, &[], Some(&access_list), &spec),
        21000 + 2400 + 2 * 1900
    );

    // Initcode metering adds two gas per word.
    spec.eip3860 = true;
    assert_eq!(
        gas_required_for(true, &[1u8; 33], None, &spec),
        53000 + 33 * 68 + 2 * 2
    );
}

#[test]
fn environment_layer_wraps_the_facade() {
    use onyx_vm_types::{Env, EnvironmentLayer, Spec};
    use primitives::bytes::Bytes;

    /// Serves a fixed hash for every blockhash query; everything else is
    /// delegated to the engine's facade.
    struct PinnedBlockhash<'a> {
        inner: Box<dyn ContextTrait + 'a>,
    }

    impl ContextTrait for PinnedBlockhash<'_> {
        fn env(&self) -> &Env { self.inner.env() }
        fn spec(&self) -> &Spec { self.inner.spec() }
        fn blockhash(&self, _number: &U256) -> H256 {
            H256::repeat_byte(0x42)
        }
        fn balance(&self, address: &Address) -> onyx_vm_types::Result<U256> {
            self.inner.balance(address)
        }
        fn code(
            &self, address: &Address,
        ) -> onyx_vm_types::Result<Option<Arc<Bytes>>> {
            self.inner.code(address)
        }
        fn code_hash(&self, address: &Address) -> onyx_vm_types::Result<H256> {
            self.inner.code_hash(address)
        }
        fn storage_at(&self, key: &H256) -> onyx_vm_types::Result<H256> {
            self.inner.storage_at(key)
        }
        fn set_storage(
            &mut self, key: H256, value: H256,
        ) -> onyx_vm_types::Result<()> {
            self.inner.set_storage(key, value)
        }
        fn original_storage_at(
            &self, key: &H256,
        ) -> onyx_vm_types::Result<H256> {
            self.inner.original_storage_at(key)
        }
        fn transient_storage_at(
            &self, key: &H256,
        ) -> onyx_vm_types::Result<H256> {
            self.inner.transient_storage_at(key)
        }
        fn set_transient_storage(
            &mut self, key: H256, value: H256,
        ) -> onyx_vm_types::Result<()> {
            self.inner.set_transient_storage(key, value)
        }
        fn is_warm_account(&self, address: &Address) -> bool {
            self.inner.is_warm_account(address)
        }
        fn is_warm_storage(
            &self, address: &Address, key: &H256,
        ) -> onyx_vm_types::Result<bool> {
            self.inner.is_warm_storage(address, key)
        }
        fn mark_warm_account(
            &mut self, address: Address,
        ) -> onyx_vm_types::Result<()> {
            self.inner.mark_warm_account(address)
        }
        fn mark_warm_storage(
            &mut self, address: Address, key: H256,
        ) -> onyx_vm_types::Result<()> {
            self.inner.mark_warm_storage(address, key)
        }
    }

    struct PinnedLayer;
    impl EnvironmentLayer for PinnedLayer {
        fn wrap<'a>(
            &self, inner: Box<dyn ContextTrait + 'a>,
        ) -> Box<dyn ContextTrait + 'a> {
            Box::new(PinnedBlockhash { inner })
        }
    }

    /// Succeeds only when the facade serves the pinned hash.
    struct BlockhashProbe;
    impl Interpreter for BlockhashProbe {
        fn execute_message(
            &self, params: ActionParams, context: &mut dyn ContextTrait,
        ) -> onyx_vm_types::Result<MessageResult> {
            Ok(if context.blockhash(&U256::zero())
                == H256::repeat_byte(0x42)
            {
                MessageResult::success(params.gas)
            } else {
                MessageResult::exceptional_halt()
            })
        }
    }

    let mut machine = Machine::new_with_builtin(
        CommonParams::default(),
        Arc::new(BlockhashProbe),
    );
    machine.set_environment_layer(Arc::new(PinnedLayer));
    let mut state = funded_state(ETHER);
    let contract = Address::repeat_byte(0x7a);
    state
        .new_contract(&contract, U256::zero(), U256::one())
        .unwrap();
    state.init_code(&contract, vec![0xfe]).unwrap();

    let tx = transfer_tx(0, contract, 0, 100_000, GWEI);
    let outcome = transact(&mut state, &machine, &tx);
    assert!(outcome.successfully_executed().is_some());
}

#[test]
fn gas_cost_overflow_is_insufficient_funds_not_panic() {
    let machine = Machine::new_with_default_vm(CommonParams::default());
    let mut state = funded_state(ETHER);

    let tx = Transaction::Legacy(LegacyTransaction {
        nonce: 0.into(),
        gas_price: U256::max_value(),
        gas: 21000.into(),
        action: Action::Call(Address::repeat_byte(0x22)),
        value: 0.into(),
        data: vec![],
        chain_id: Some(1),
    })
    .fake_sign(sender_address());
    let outcome = transact(&mut state, &machine, &tx);

    match outcome {
        ExecutionOutcome::NotExecuted(
            TxValidationError::InsufficientFunds { required, .. },
        ) => {
            assert!(required > U512::from(U256::max_value()));
        }
        other => panic!("expected insufficient funds, got {:?}", other),
    }
}

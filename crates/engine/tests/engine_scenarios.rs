// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! End-to-end scenarios: blocks over a materialized genesis, the builder
//! round trip, replica independence and the chain driver.

use ethereum_types::{Address, H256, U256};
use keccak_hash::KECCAK_EMPTY_LIST_RLP;
use onyx_engine::{
    BlockError, BuildBlockOpts, Engine, EngineError, EngineEvent,
    EngineOptions, RunBlockOpts, RunBlockchainOpts, RunTxOpts,
};
use onyx_executor::spec::{CommonParams, GenesisAccount};
use onyx_vm_types::{
    ActionParams, Context, Interpreter, MessageResult, Result as VmResult,
};
use primitives::{
    crypto::{public_from_secret, public_to_address},
    transaction::{FeeMarketTransaction, LegacyTransaction},
    Action, Block, BlockHeaderBuilder, SignedTransaction, Transaction,
};
use secp256k1::SecretKey;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

const ETHER: u64 = 1_000_000_000_000_000_000;
const GWEI: u64 = 1_000_000_000;

struct TestChain {
    secret: SecretKey,
    sender: Address,
}

impl TestChain {
    fn new() -> Self {
        let secret = SecretKey::new(&mut rand::thread_rng());
        let sender = public_to_address(&public_from_secret(&secret));
        TestChain { secret, sender }
    }

    fn params(&self, latest: bool) -> CommonParams {
        let mut params = if latest {
            CommonParams::latest_at_genesis()
        } else {
            CommonParams::default()
        };
        params.genesis.accounts.insert(
            self.sender,
            GenesisAccount {
                balance: ETHER.into(),
                ..Default::default()
            },
        );
        params
    }

    fn engine(&self, latest: bool) -> Engine {
        self.engine_with_vm(latest, None)
    }

    fn engine_with_vm(
        &self, latest: bool, vm: Option<Arc<dyn Interpreter>>,
    ) -> Engine {
        let mut engine = Engine::new(EngineOptions {
            common: self.params(latest),
            activate_genesis_state: true,
            activate_builtins: true,
            interpreter: vm,
            debug: Some(false),
            ..Default::default()
        })
        .expect("valid options");
        engine.init().expect("init");
        engine
    }

    fn transfer(
        &self, nonce: u64, to: Address, value: u64, gas_price: u64,
    ) -> Arc<SignedTransaction> {
        Arc::new(
            Transaction::Legacy(LegacyTransaction {
                nonce: nonce.into(),
                gas_price: gas_price.into(),
                gas: 21000.into(),
                action: Action::Call(to),
                value: value.into(),
                data: vec![],
                chain_id: Some(1),
            })
            .sign(&self.secret),
        )
    }

    fn fee_market_transfer(
        &self, nonce: u64, to: Address, value: u64, max_fee: u64,
        max_priority: u64, gas: u64,
    ) -> Arc<SignedTransaction> {
        Arc::new(
            Transaction::FeeMarket(FeeMarketTransaction {
                chain_id: 1,
                nonce: nonce.into(),
                max_priority_fee_per_gas: max_priority.into(),
                max_fee_per_gas: max_fee.into(),
                gas: gas.into(),
                action: Action::Call(to),
                value: value.into(),
                data: vec![],
                access_list: vec![],
            })
            .sign(&self.secret),
        )
    }
}

#[test]
fn empty_block_round_trip() {
    // S1: an empty block over an initialised genesis state.
    let chain = TestChain::new();
    let mut engine = chain.engine(false);
    let mut verifier = engine.copy();

    let author = Address::repeat_byte(0xaa);
    let block = {
        let mut builder = engine
            .build_block(BuildBlockOpts {
                author,
                ..Default::default()
            })
            .unwrap();
        builder.build().unwrap()
    };

    assert_eq!(*block.block_header.gas_used(), U256::zero());
    assert_eq!(*block.block_header.receipts_root(), KECCAK_EMPTY_LIST_RLP);
    assert_eq!(
        *block.block_header.transactions_root(),
        KECCAK_EMPTY_LIST_RLP
    );
    // The author collected the configured block reward.
    assert_eq!(
        engine.state().balance(&author).unwrap(),
        U256::from(2_000_000_000_000_000_000u64)
    );

    let result = verifier
        .run_block(&block, RunBlockOpts::default())
        .expect("replaying the sealed block validates");
    assert_eq!(result.state_root, *block.block_header.state_root());
    assert_eq!(result.gas_used, U256::zero());
    assert!(result.receipts.is_empty());
}

#[test]
fn uncle_rewards_settle_and_round_trip() {
    let chain = TestChain::new();
    let mut engine = chain.engine(false);
    let mut verifier = engine.copy();
    let mut tamper_verifier = engine.copy();

    let author = Address::repeat_byte(0xaa);
    let uncle_author = Address::repeat_byte(0xab);
    let uncle = BlockHeaderBuilder::new()
        .with_number(0)
        .with_author(uncle_author)
        .build();

    let block = {
        let mut builder = engine
            .build_block(BuildBlockOpts {
                author,
                uncles: vec![uncle],
                ..Default::default()
            })
            .unwrap();
        builder.build().unwrap()
    };
    assert_ne!(*block.block_header.uncles_hash(), KECCAK_EMPTY_LIST_RLP);

    // Author: base reward plus one inclusion bonus. Uncle at depth one:
    // seven eighths of the base reward.
    let reward = U256::from(2_000_000_000_000_000_000u64);
    assert_eq!(
        engine.state().balance(&author).unwrap(),
        reward + reward / U256::from(32)
    );
    assert_eq!(
        engine.state().balance(&uncle_author).unwrap(),
        reward * U256::from(7) / U256::from(8)
    );

    let result = verifier
        .run_block(&block, RunBlockOpts::default())
        .expect("uncle-bearing block validates");
    assert_eq!(result.state_root, *block.block_header.state_root());

    // A tampered uncle list no longer matches the header commitment.
    let mut tampered = block.clone();
    tampered.uncles.clear();
    assert!(matches!(
        tamper_verifier.run_block(&tampered, RunBlockOpts::default()),
        Err(EngineError::Block(BlockError::UnclesHashMismatch { .. }))
    ));
}

#[test]
fn builder_rejects_malformed_uncle_sets() {
    let chain = TestChain::new();
    let mut engine = chain.engine(false);

    // An uncle that does not sit below the block under construction.
    let future_uncle = BlockHeaderBuilder::new().with_number(5).build();
    assert!(matches!(
        engine.build_block(BuildBlockOpts {
            uncles: vec![future_uncle],
            ..Default::default()
        }),
        Err(EngineError::Block(BlockError::UncleOutOfRange { .. }))
    ));

    // More uncles than the chain parameters allow.
    let uncle = || BlockHeaderBuilder::new().with_number(0).build();
    assert!(matches!(
        engine.build_block(BuildBlockOpts {
            uncles: vec![uncle(), uncle(), uncle()],
            ..Default::default()
        }),
        Err(EngineError::Block(BlockError::TooManyUncles { max: 2, got: 3 }))
    ));

    // The failed attempts released the engine for a clean build.
    let mut builder = engine.build_block(BuildBlockOpts::default()).unwrap();
    builder.build().unwrap();
}

#[test]
fn value_transfer_block_settles_exactly() {
    // S2 inside a generated block, with a real signature.
    let chain = TestChain::new();
    let mut engine = chain.engine(false);
    let mut verifier = engine.copy();
    let recipient = Address::repeat_byte(0xbb);

    let tx = chain.transfer(0, recipient, 1_000_000_000_000, GWEI);
    let block = {
        let mut builder = engine.build_block(BuildBlockOpts::default()).unwrap();
        let receipt = builder.add_transaction(tx).unwrap();
        assert!(receipt.is_success());
        assert_eq!(receipt.gas_used, U256::from(21000));
        builder.build().unwrap()
    };

    assert_eq!(*block.block_header.gas_used(), U256::from(21000));
    let expected_sender = U256::from(ETHER)
        - U256::from(1_000_000_000_000u64)
        - U256::from(21000u64) * U256::from(GWEI);
    assert_eq!(
        engine.state().balance(&chain.sender).unwrap(),
        expected_sender
    );
    assert_eq!(
        engine.state().balance(&recipient).unwrap(),
        U256::from(1_000_000_000_000u64)
    );
    assert_eq!(engine.state().nonce(&chain.sender).unwrap(), U256::one());

    // Invariant 3/7: the verifier accepts the sealed block bit-for-bit.
    let result = verifier
        .run_block(&block, RunBlockOpts::default())
        .expect("sealed block validates");
    assert_eq!(result.state_root, *block.block_header.state_root());
    assert_eq!(result.gas_used, *block.block_header.gas_used());
    assert_eq!(result.logs_bloom, *block.block_header.logs_bloom());
}

/// An interpreter whose every contract call reverts with a fixed payload.
struct AlwaysRevertVm;

impl Interpreter for AlwaysRevertVm {
    fn execute_message(
        &self, params: ActionParams, _context: &mut dyn Context,
    ) -> VmResult<MessageResult> {
        let has_code = params.code.as_ref().map_or(false, |c| !c.is_empty());
        if has_code {
            Ok(MessageResult::reverted(
                params.gas / 2,
                vec![0xde, 0xad, 0xbe, 0xef],
            ))
        } else {
            Ok(MessageResult::success(params.gas))
        }
    }
}

#[test]
fn builder_round_trip_with_reverting_call() {
    // S7 over S2 + S5: a successful transfer and a reverting contract
    // call in one block; the sealed block re-validates on a replica.
    let chain = TestChain::new();
    let contract = Address::repeat_byte(0xcd);

    let make_engine = || {
        let mut params = chain.params(false);
        params.genesis.accounts.insert(
            contract,
            GenesisAccount {
                balance: U256::zero(),
                nonce: U256::one(),
                code: vec![0xfe],
                ..Default::default()
            },
        );
        let mut engine = Engine::new(EngineOptions {
            common: params,
            activate_genesis_state: true,
            interpreter: Some(Arc::new(AlwaysRevertVm)),
            debug: Some(false),
            ..Default::default()
        })
        .unwrap();
        engine.init().unwrap();
        engine
    };

    let mut engine = make_engine();
    let mut verifier = engine.copy();

    let transfer = chain.transfer(0, Address::repeat_byte(0xbb), 1000, GWEI);
    let reverting = Arc::new(
        Transaction::Legacy(LegacyTransaction {
            nonce: 1.into(),
            gas_price: GWEI.into(),
            gas: 100_000.into(),
            action: Action::Call(contract),
            value: 0.into(),
            data: vec![],
            chain_id: Some(1),
        })
        .sign(&chain.secret),
    );

    let block = {
        let mut builder = engine.build_block(BuildBlockOpts::default()).unwrap();
        let first = builder.add_transaction(transfer).unwrap();
        assert!(first.is_success());
        let second = builder.add_transaction(reverting).unwrap();
        assert!(!second.is_success());
        assert_eq!(second.output, vec![0xde, 0xad, 0xbe, 0xef]);
        builder.build().unwrap()
    };

    // Cumulative gas is monotonic and matches the header.
    let receipts_gas: Vec<U256> = {
        let result = verifier
            .run_block(&block, RunBlockOpts::default())
            .expect("round trip validates");
        assert_eq!(result.state_root, *block.block_header.state_root());
        result.receipts.iter().map(|r| r.gas_used).collect()
    };
    assert!(receipts_gas.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(receipts_gas.last().copied(), Some(*block.block_header.gas_used()));

    // The reverting call advanced the sender nonce and charged gas.
    assert_eq!(engine.state().nonce(&chain.sender).unwrap(), U256::from(2));
}

#[test]
fn fee_cap_below_base_fee_invalidates_the_block() {
    // S6: a fee-market block carrying a tx whose cap is under the base
    // fee is rejected as a whole, with no state change.
    let chain = TestChain::new();
    let mut engine = chain.engine(true);

    // Genesis base fee 1 gwei, first child 0.875 gwei; cap below that.
    let tx = chain.fee_market_transfer(
        0,
        Address::repeat_byte(0xbb),
        1,
        1_000,
        1,
        21000,
    );
    let mut builder = engine.build_block(BuildBlockOpts::default()).unwrap();
    let err = builder.add_transaction(tx).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Tx(
            onyx_executor::executive::TxValidationError::FeeCapBelowBaseFee { .. }
        )
    ));
    builder.revert().unwrap();
    drop(builder);

    // Nothing changed.
    let mut replay = engine.copy();
    let empty = {
        let mut builder =
            replay.build_block(BuildBlockOpts::default()).unwrap();
        builder.build().unwrap()
    };
    assert_eq!(
        *empty.block_header.parent_hash(),
        engine.block_store().canonical_head().unwrap().hash()
    );
    assert_eq!(
        engine.state().balance(&chain.sender).unwrap(),
        U256::from(ETHER)
    );
}

#[test]
fn replicas_evolve_identically_and_independently() {
    // Invariant 8: copy() then identical input gives identical roots;
    // divergent input diverges only the replica that ran it.
    let chain = TestChain::new();
    let mut engine = chain.engine(false);
    let mut replica = engine.copy();
    let recipient = Address::repeat_byte(0xbb);

    let tx = chain.transfer(0, recipient, 12345, GWEI);

    let block_a = {
        let mut builder = engine.build_block(BuildBlockOpts::default()).unwrap();
        builder.add_transaction(tx.clone()).unwrap();
        builder.build().unwrap()
    };
    let block_b = {
        let mut builder =
            replica.build_block(BuildBlockOpts::default()).unwrap();
        builder.add_transaction(tx).unwrap();
        builder.build().unwrap()
    };
    assert_eq!(
        block_a.block_header.state_root(),
        block_b.block_header.state_root()
    );
    assert_eq!(block_a.hash(), block_b.hash());

    // Further work on one replica does not leak into the other.
    engine.import_sealed_block(block_a).unwrap();
    let tx2 = chain.transfer(1, recipient, 1, GWEI);
    let mut builder = engine.build_block(BuildBlockOpts::default()).unwrap();
    builder.add_transaction(tx2).unwrap();
    builder.build().unwrap();
    drop(builder);

    assert_eq!(replica.state().nonce(&chain.sender).unwrap(), U256::one());
    assert_eq!(engine.state().nonce(&chain.sender).unwrap(), U256::from(2));
}

#[test]
fn chain_driver_advances_head_crash_consistently() {
    let chain = TestChain::new();
    let mut engine = chain.engine(false);
    let mut follower = engine.copy();
    let recipient = Address::repeat_byte(0xbb);

    // Produce two blocks on the leader.
    let mut blocks = Vec::new();
    for nonce in 0..2u64 {
        let tx = chain.transfer(nonce, recipient, 1000, GWEI);
        let block = {
            let mut builder =
                engine.build_block(BuildBlockOpts::default()).unwrap();
            builder.add_transaction(tx).unwrap();
            builder.build().unwrap()
        };
        engine.import_sealed_block(block.clone()).unwrap();
        blocks.push(block);
    }

    // Stage them on the follower and drive.
    for block in &blocks {
        follower.put_block(block.clone());
    }
    let result = follower
        .run_blockchain(RunBlockchainOpts::default())
        .unwrap();
    assert_eq!(result.blocks_run, 2);
    assert!(result.failure.is_none());
    assert_eq!(
        follower.block_store().canonical_head().unwrap().hash(),
        blocks[1].hash()
    );
    assert_eq!(
        follower.state().balance(&recipient).unwrap(),
        U256::from(2000)
    );

    // max_blocks bounds the run.
    let mut bounded = chain.engine(false);
    for block in &blocks {
        bounded.put_block(block.clone());
    }
    let result = bounded
        .run_blockchain(RunBlockchainOpts {
            max_blocks: Some(1),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(result.blocks_run, 1);
    assert_eq!(
        bounded.block_store().canonical_head().unwrap().hash(),
        blocks[0].hash()
    );
}

#[test]
fn chain_driver_stops_at_invalid_block() {
    let chain = TestChain::new();
    let mut engine = chain.engine(false);
    let mut follower = engine.copy();

    let good = {
        let mut builder = engine.build_block(BuildBlockOpts::default()).unwrap();
        builder
            .add_transaction(chain.transfer(0, Address::repeat_byte(0xbb), 1, GWEI))
            .unwrap();
        builder.build().unwrap()
    };
    engine.import_sealed_block(good.clone()).unwrap();

    // A tampered successor: declared state root cannot match.
    let bad = {
        let mut builder = engine.build_block(BuildBlockOpts::default()).unwrap();
        builder
            .add_transaction(chain.transfer(1, Address::repeat_byte(0xbb), 1, GWEI))
            .unwrap();
        let mut block = builder.build().unwrap();
        block.block_header.set_state_root(H256::repeat_byte(0x66));
        block.block_header.compute_hash();
        block
    };

    follower.put_block(good.clone());
    follower.put_block(bad);
    let result = follower
        .run_blockchain(RunBlockchainOpts::default())
        .unwrap();
    assert_eq!(result.blocks_run, 1);
    let (failed_number, error) = result.failure.expect("second block fails");
    assert_eq!(failed_number, 2);
    assert!(matches!(
        error,
        EngineError::Block(BlockError::StateRootMismatch { .. })
    ));
    // The head stayed on the last good block; its state is committed.
    assert_eq!(
        follower.block_store().canonical_head().unwrap().hash(),
        good.hash()
    );
}

#[test]
fn chain_driver_requires_linear_parent_linkage() {
    let chain = TestChain::new();
    let mut engine = chain.engine(false);

    // A block indexed at the right height but linking elsewhere.
    let orphan = Block::new(
        BlockHeaderBuilder::new()
            .with_number(1)
            .with_parent_hash(H256::repeat_byte(0x13))
            .with_timestamp(1)
            .with_gas_limit(30_000_000.into())
            .build(),
        vec![],
        vec![],
    );
    engine.put_block(orphan);

    let result = engine.run_blockchain(RunBlockchainOpts::default()).unwrap();
    assert_eq!(result.blocks_run, 0);
    assert!(matches!(
        result.failure,
        Some((1, EngineError::Block(BlockError::ParentHashMismatch { .. })))
    ));
}

#[test]
fn run_tx_persists_and_reports_receipt() {
    let chain = TestChain::new();
    let mut engine = chain.engine(false);
    let recipient = Address::repeat_byte(0xbb);

    let tx = chain.transfer(0, recipient, 777, GWEI);
    let result = engine.run_tx(&tx, RunTxOpts::default()).unwrap();
    assert!(result.receipt.is_success());
    assert_eq!(engine.state().balance(&recipient).unwrap(), U256::from(777));

    // A nonce replay is rejected with no state change.
    let replay = engine.run_tx(&tx, RunTxOpts::default()).unwrap_err();
    assert!(matches!(
        replay,
        EngineError::Tx(
            onyx_executor::executive::TxValidationError::NonceMismatch { .. }
        )
    ));
    assert_eq!(engine.state().balance(&recipient).unwrap(), U256::from(777));
}

#[test]
fn event_handlers_observe_but_cannot_revert() {
    let chain = TestChain::new();
    let mut engine = chain.engine(false);
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_in_handler = Arc::clone(&seen);
    engine.subscribe(Box::new(move |event| {
        match event {
            EngineEvent::BeforeTx { .. } | EngineEvent::AfterTx { .. } => {
                seen_in_handler.fetch_add(1, Ordering::SeqCst);
                Err("observer unhappy".to_owned())
            }
            _ => Ok(()),
        }
    }));

    let recipient = Address::repeat_byte(0xbb);
    let tx = chain.transfer(0, recipient, 5, GWEI);
    let result = engine.run_tx(&tx, RunTxOpts::default()).unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(result.event_warnings.len(), 2);
    // The handler's failure did not revert the transfer.
    assert_eq!(engine.state().balance(&recipient).unwrap(), U256::from(5));
}

#[test]
fn builder_rejects_overflow_and_closes_after_terminal_call() {
    let chain = TestChain::new();
    let mut engine = chain.engine(false);

    let mut builder = engine
        .build_block(BuildBlockOpts {
            gas_limit: Some(30_000.into()),
            ..Default::default()
        })
        .unwrap();

    let oversized = Arc::new(
        Transaction::Legacy(LegacyTransaction {
            nonce: 0.into(),
            gas_price: GWEI.into(),
            gas: 50_000.into(),
            action: Action::Call(Address::repeat_byte(0xbb)),
            value: 0.into(),
            data: vec![],
            chain_id: Some(1),
        })
        .sign(&chain.secret),
    );
    assert!(matches!(
        builder.add_transaction(oversized),
        Err(EngineError::TxGasLimitBlockOverflow)
    ));

    builder.add_transaction(chain.transfer(0, Address::repeat_byte(0xbb), 1, GWEI))
        .unwrap();
    builder.build().unwrap();

    // The builder is closed; further use must fail.
    assert!(matches!(
        builder.add_transaction(chain.transfer(1, Address::repeat_byte(0xbb), 1, GWEI)),
        Err(EngineError::BuilderClosed)
    ));
    assert!(matches!(builder.build(), Err(EngineError::BuilderClosed)));
}

#[test]
fn generated_block_matches_builder_output() {
    // run_block(generate=true) fills in the roots the builder would have
    // produced for the same transactions.
    let chain = TestChain::new();
    let mut generator = chain.engine(false);
    let mut builder_engine = generator.copy();
    let recipient = Address::repeat_byte(0xbb);
    let tx = chain.transfer(0, recipient, 4242, GWEI);

    let genesis_hash = generator.block_store().canonical_head().unwrap().hash();
    let skeleton = Block::new(
        BlockHeaderBuilder::new()
            .with_number(1)
            .with_parent_hash(genesis_hash)
            .with_timestamp(1)
            .with_gas_limit(30_000_000.into())
            .build(),
        vec![tx.clone()],
        vec![],
    );
    let generated = generator
        .run_block(
            &skeleton,
            RunBlockOpts {
                generate: true,
                ..Default::default()
            },
        )
        .unwrap();

    let built = {
        let mut builder = builder_engine
            .build_block(BuildBlockOpts::default())
            .unwrap();
        builder.add_transaction(tx).unwrap();
        builder.build().unwrap()
    };

    let generated_header = &generated.block.block_header;
    assert_eq!(generated_header.state_root(), built.block_header.state_root());
    assert_eq!(
        generated_header.receipts_root(),
        built.block_header.receipts_root()
    );
    assert_eq!(
        generated_header.transactions_root(),
        built.block_header.transactions_root()
    );
    assert_eq!(generated_header.gas_used(), built.block_header.gas_used());
}

#[test]
fn construction_rejects_bad_option_combinations() {
    // Conflicting hardfork selectors.
    let err = Engine::new(EngineOptions {
        hardfork_by_block_number: true,
        hardfork_by_td: Some(100.into()),
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Spec(
            onyx_executor::spec::SpecError::ConflictingHardforkSelectors
        )
    ));

    // Legacy option keys are rejected, not ignored.
    let mut options = EngineOptions::default();
    options
        .extra_options
        .insert("activatePrecompiles".into(), "true".into());
    assert!(matches!(
        Engine::new(options),
        Err(EngineError::LegacyOptionRejected(_))
    ));

    // Unknown amendment numbers are rejected.
    let mut params = CommonParams::default();
    params.extra_amendments.insert(4844);
    assert!(matches!(
        Engine::new(EngineOptions {
            common: params,
            ..Default::default()
        }),
        Err(EngineError::Spec(
            onyx_executor::spec::SpecError::UnsupportedAmendment(4844)
        ))
    ));

    // Execution before init is refused.
    let chain = TestChain::new();
    let mut engine = Engine::new(EngineOptions {
        common: chain.params(false),
        activate_genesis_state: true,
        ..Default::default()
    })
    .unwrap();
    let tx = chain.transfer(0, Address::repeat_byte(0xbb), 1, GWEI);
    assert!(matches!(
        engine.run_tx(&tx, RunTxOpts::default()),
        Err(EngineError::NotInitialized)
    ));

    // init is idempotent.
    engine.init().unwrap();
    engine.init().unwrap();
    engine.run_tx(&tx, RunTxOpts::default()).unwrap();
}

#[test]
fn genesis_materializes_code_and_storage() {
    let chain = TestChain::new();
    let contract = Address::repeat_byte(0x99);
    let mut params = chain.params(false);
    params.genesis.accounts.insert(
        contract,
        GenesisAccount {
            balance: 1.into(),
            nonce: 1.into(),
            code: vec![0x60, 0x00],
            storage: [(H256::repeat_byte(0x01), H256::repeat_byte(0x02))]
                .into_iter()
                .collect(),
        },
    );
    let mut engine = Engine::new(EngineOptions {
        common: params,
        activate_genesis_state: true,
        activate_builtins: true,
        debug: Some(false),
        ..Default::default()
    })
    .unwrap();
    engine.init().unwrap();

    let state = engine.state();
    assert_eq!(state.balance(&contract).unwrap(), U256::one());
    assert_eq!(state.nonce(&contract).unwrap(), U256::one());
    assert_eq!(
        state.code(&contract).unwrap().as_deref(),
        Some(&vec![0x60, 0x00])
    );
    assert_eq!(
        state
            .storage_at(&contract, &H256::repeat_byte(0x01))
            .unwrap(),
        H256::repeat_byte(0x02)
    );
    // Builtin accounts are primed with one unit of balance.
    assert_eq!(
        state
            .balance(&Address::from_low_u64_be(1))
            .unwrap(),
        U256::one()
    );
}

#[test]
fn panicking_handler_poisons_the_engine() {
    let chain = TestChain::new();
    let engine = Arc::new(Mutex::new(chain.engine(false)));
    {
        let mut guard = engine.lock().unwrap();
        guard.subscribe(Box::new(|event| {
            if matches!(event, EngineEvent::BeforeTx { .. }) {
                panic!("handler exploded");
            }
            Ok(())
        }));
    }

    let tx = chain.transfer(0, Address::repeat_byte(0xbb), 1, GWEI);
    let engine_for_panic = Arc::clone(&engine);
    let tx_for_panic = tx.clone();
    let outcome = std::panic::catch_unwind(move || {
        engine_for_panic
            .lock()
            .unwrap()
            .run_tx(&tx_for_panic, RunTxOpts::default())
            .ok();
    });
    assert!(outcome.is_err());

    // The interrupted run never released the busy flag: the engine is
    // poisoned and says so.
    let mut guard = match engine.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    assert!(matches!(
        guard.run_tx(&tx, RunTxOpts::default()),
        Err(EngineError::EngineBusy)
    ));
}

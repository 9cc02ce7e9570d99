// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    block_store::{BlockStore, InMemoryBlockStore},
    error::{BlockError, EngineError, Result},
    events::{EngineEvent, EventHandler, EventHub, StepInfo},
};
use ethereum_types::{H256, U256};
use onyx_executor::{
    executive::{
        ExecutionOutcome, ExecutiveContext, TransactOptions, TransactSettings,
    },
    machine::Machine,
    spec::{CommonParams, SpecError},
    state::{CleanupMode, State},
    transfer_vm::TransferVm,
};
use onyx_statedb::{StateDb, StorageTrait};
use onyx_vm_types::{EnvironmentLayer, Interpreter};
use primitives::{
    Block, BlockHeaderBuilder, Receipt, SignedTransaction,
};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Gas limit of a self-materialized genesis block.
pub(crate) const GENESIS_GAS_LIMIT: u64 = 30_000_000;

/// Option keys of earlier engine generations; passing any of them is an
/// error rather than a silent ignore.
const LEGACY_OPTION_KEYS: &[&str] =
    &["state", "vm", "chain", "hardfork", "activatePrecompiles"];

/// Construction surface of the engine.
pub struct EngineOptions {
    /// Chain parameters, including the rule-set transition table and the
    /// genesis allocation.
    pub common: CommonParams,
    /// External state store. When present, genesis materialization and
    /// builtin priming are disabled: the store owns its history.
    pub state_manager: Option<Box<dyn StorageTrait>>,
    /// External block store.
    pub block_store: Option<Box<dyn BlockStore>>,
    /// The bytecode interpreter. Defaults to the code-free [`TransferVm`].
    pub interpreter: Option<Arc<dyn Interpreter>>,
    /// Override of the environment facade handed to the interpreter.
    pub eei: Option<Arc<dyn EnvironmentLayer>>,
    /// Prime the builtin accounts with balance one so the first call does
    /// not pay new-account gas.
    pub activate_builtins: bool,
    /// Materialize the genesis allocation from `common` on `init`.
    pub activate_genesis_state: bool,
    /// Resolve the rule set by block number only.
    pub hardfork_by_block_number: bool,
    /// Resolve the rule set with this total difficulty. Mutually exclusive
    /// with `hardfork_by_block_number`.
    pub hardfork_by_td: Option<U256>,
    /// Emit per-opcode step events. `None` falls back to the `DEBUG`
    /// process environment variable.
    pub debug: Option<bool>,
    /// Catch-all for option keys of earlier engine generations; any entry
    /// is rejected at construction.
    pub extra_options: BTreeMap<String, String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            common: CommonParams::default(),
            state_manager: None,
            block_store: None,
            interpreter: None,
            eei: None,
            activate_builtins: false,
            activate_genesis_state: false,
            hardfork_by_block_number: false,
            hardfork_by_td: None,
            debug: None,
            extra_options: BTreeMap::new(),
        }
    }
}

pub struct RunTxOpts {
    pub skip_nonce: bool,
    pub skip_base_fee: bool,
}

impl Default for RunTxOpts {
    fn default() -> Self {
        RunTxOpts {
            skip_nonce: false,
            skip_base_fee: false,
        }
    }
}

#[derive(Debug)]
pub struct RunTxResult {
    pub receipt: Receipt,
    pub outcome: ExecutionOutcome,
    pub event_warnings: Vec<String>,
}

/// The engine shell: lifecycle, option validation, the busy guard and the
/// event hub. Block-level operations live in the sibling modules.
pub struct Engine {
    pub(crate) machine: Arc<Machine>,
    pub(crate) state: State,
    pub(crate) block_store: Box<dyn BlockStore>,
    pub(crate) events: EventHub,
    pub(crate) hardfork_td: Option<U256>,
    pub(crate) debug: bool,
    activate_builtins: bool,
    activate_genesis_state: bool,
    external_state: bool,
    initialized: bool,
    busy: AtomicBool,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("hardfork_td", &self.hardfork_td)
            .field("debug", &self.debug)
            .field("activate_builtins", &self.activate_builtins)
            .field("activate_genesis_state", &self.activate_genesis_state)
            .field("external_state", &self.external_state)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(options: EngineOptions) -> Result<Engine> {
        if let Some(key) = options.extra_options.keys().next() {
            let hint = if LEGACY_OPTION_KEYS.contains(&key.as_str()) {
                format!("{} (removed option)", key)
            } else {
                key.clone()
            };
            return Err(EngineError::LegacyOptionRejected(hint));
        }
        if options.hardfork_by_block_number && options.hardfork_by_td.is_some()
        {
            return Err(SpecError::ConflictingHardforkSelectors.into());
        }
        options.common.validate_support()?;

        let debug = options.debug.unwrap_or_else(|| {
            std::env::var("DEBUG").map_or(false, |v| !v.is_empty())
        });
        let external_state = options.state_manager.is_some();
        let statedb = match options.state_manager {
            Some(storage) => StateDb::new(storage),
            None => StateDb::new_in_memory(),
        };
        let vm: Arc<dyn Interpreter> = match options.interpreter {
            Some(vm) => vm,
            None => Arc::new(TransferVm),
        };
        let mut machine = Machine::new_with_builtin(options.common, vm);
        if let Some(layer) = options.eei {
            machine.set_environment_layer(layer);
        }
        let machine = Arc::new(machine);
        let block_store = options
            .block_store
            .unwrap_or_else(|| Box::new(InMemoryBlockStore::new()));

        Ok(Engine {
            machine,
            state: State::new(statedb),
            block_store,
            events: EventHub::default(),
            hardfork_td: options.hardfork_by_td,
            debug,
            activate_builtins: options.activate_builtins && !external_state,
            activate_genesis_state: options.activate_genesis_state
                && !external_state,
            external_state,
            initialized: false,
            busy: AtomicBool::new(false),
        })
    }

    /// One-shot initialization. Idempotent; must precede any execution
    /// method.
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.set_busy()?;
        let result = self.init_inner();
        self.release_busy();
        result?;
        self.initialized = true;
        Ok(())
    }

    fn init_inner(&mut self) -> Result<()> {
        if !self.external_state && !self.state.db_initialized() {
            if self.activate_genesis_state {
                self.materialize_genesis()?;
            }
            if self.activate_builtins {
                for address in self.machine.builtin_accounts(0) {
                    self.state.add_balance(
                        &address,
                        &U256::one(),
                        CleanupMode::ForceCreate,
                    )?;
                }
            }
            self.state.compute_state_root()?;
            self.state.persist()?;
            self.state.clear_tx_scope();
        }

        if self.block_store.canonical_head().is_none() {
            let state_root = self.state.compute_state_root()?;
            let spec = self.machine.spec(0, self.hardfork_td);
            let base_fee = if spec.eip1559 {
                Some(self.machine.params().initial_base_fee)
            } else {
                None
            };
            let header = BlockHeaderBuilder::new()
                .with_number(0)
                .with_gas_limit(GENESIS_GAS_LIMIT.into())
                .with_state_root(state_root)
                .with_base_fee(base_fee)
                .build();
            let genesis = Block::new(header, vec![], vec![]);
            let hash = genesis.hash();
            debug!("materialized genesis block: hash={:?}", hash);
            self.block_store.put_block(genesis);
            self.block_store.set_canonical_head(&hash);
        }
        Ok(())
    }

    fn materialize_genesis(&mut self) -> Result<()> {
        let genesis = self.machine.params().genesis.clone();
        for (address, account) in genesis.accounts {
            self.state.add_balance(
                &address,
                &account.balance,
                CleanupMode::ForceCreate,
            )?;
            if !account.nonce.is_zero() {
                self.state.set_nonce(&address, &account.nonce)?;
            }
            if !account.code.is_empty() {
                self.state.init_code(&address, account.code)?;
            }
            for (key, value) in &account.storage {
                self.state.set_storage(&address, key, value)?;
            }
        }
        Ok(())
    }

    /// A new engine over cloned state and block stores: independent
    /// mutability, identical current roots.
    pub fn copy(&self) -> Engine {
        Engine {
            machine: Arc::clone(&self.machine),
            state: State::new(StateDb::new(
                self.state.db().boxed_clone_storage(),
            )),
            block_store: self.block_store.boxed_clone(),
            events: EventHub::default(),
            hardfork_td: self.hardfork_td,
            debug: self.debug,
            activate_builtins: self.activate_builtins,
            activate_genesis_state: self.activate_genesis_state,
            external_state: self.external_state,
            initialized: self.initialized,
            busy: AtomicBool::new(false),
        }
    }

    pub fn machine(&self) -> &Machine { &self.machine }

    pub fn block_store(&self) -> &dyn BlockStore { &*self.block_store }

    /// Read access to the ledger state.
    pub fn state(&self) -> &State { &self.state }

    /// Store a block without running it or moving the canonical head; the
    /// chain driver picks it up from here.
    pub fn put_block(&mut self, block: Block) {
        self.block_store.put_block(block);
    }

    /// Import a block the builder already applied to this engine's state:
    /// store it and advance the canonical head, without re-running it.
    pub fn import_sealed_block(&mut self, block: Block) -> Result<()> {
        let hash = block.hash();
        self.block_store.put_block(block);
        self.block_store.set_canonical_head(&hash);
        Ok(())
    }

    pub fn subscribe(&mut self, handler: EventHandler) {
        self.events.subscribe(handler);
    }

    /// Forward a per-opcode step from an interpreter integration. A no-op
    /// unless the debug flag is on.
    pub fn notify_step(&self, info: &StepInfo) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.debug {
            self.events
                .notify(&EngineEvent::Step { info }, &mut warnings);
        }
        warnings
    }

    /// Execute one transaction against the canonical head context and
    /// persist its effects.
    pub fn run_tx(
        &mut self, tx: &SignedTransaction, opts: RunTxOpts,
    ) -> Result<RunTxResult> {
        self.ensure_ready()?;
        self.set_busy()?;
        let result = self.run_tx_inner(tx, opts);
        self.release_busy();
        result
    }

    fn run_tx_inner(
        &mut self, tx: &SignedTransaction, opts: RunTxOpts,
    ) -> Result<RunTxResult> {
        let head = self
            .block_store
            .canonical_head()
            .ok_or(BlockError::UnknownParent(H256::zero()))?;
        let env = crate::block_execution::env_after_parent(
            &head.block_header,
            self.machine.params(),
            &*self.block_store,
        );
        let spec = self.machine.spec(env.number, self.hardfork_td);
        let machine = Arc::clone(&self.machine);

        let mut event_warnings = Vec::new();
        self.events
            .notify(&EngineEvent::BeforeTx { tx }, &mut event_warnings);

        let settings = TransactSettings {
            check_nonce: !opts.skip_nonce,
            check_base_price: !opts.skip_base_fee,
            ..TransactSettings::all_checks()
        };
        let options = TransactOptions {
            observer: (),
            settings,
        };
        let outcome =
            ExecutiveContext::new(&mut self.state, &env, &machine, &spec)
                .transact(tx, options)?;

        let receipt = match outcome.make_receipt(U256::zero()) {
            Some(receipt) => receipt,
            None => {
                // Pre-execution rejection: the state is untouched.
                match outcome {
                    ExecutionOutcome::NotExecuted(e) => {
                        return Err(EngineError::Tx(e))
                    }
                    _ => unreachable!("receipt exists for executed outcomes"),
                }
            }
        };

        self.state.compute_state_root()?;
        self.state.persist()?;

        self.events.notify(
            &EngineEvent::AfterTx { receipt: &receipt },
            &mut event_warnings,
        );

        Ok(RunTxResult {
            receipt,
            outcome,
            event_warnings,
        })
    }

    pub(crate) fn ensure_ready(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(EngineError::NotInitialized)
        }
    }

    /// Mutating operations are serialized; an overlapping attempt (or a
    /// previous run torn down abnormally) reports the engine busy.
    pub(crate) fn set_busy(&self) -> Result<()> {
        if self.busy.swap(true, Ordering::SeqCst) {
            Err(EngineError::EngineBusy)
        } else {
            Ok(())
        }
    }

    pub(crate) fn release_busy(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    builtin::{builtin_address, Builtin, Linear},
    spec::{CommonParams, Fork},
    transfer_vm::TransferVm,
};
use ethereum_types::{Address, U256};
use onyx_vm_types::{EnvironmentLayer, Interpreter, Spec};
use primitives::BlockNumber;
use std::{collections::BTreeMap, sync::Arc};

pub type SpecCreationRules = dyn Fn(&mut Spec, BlockNumber) + Sync + Send;

/// The execution engine object: a factory for specs and builtin contracts,
/// and the holder of the two capability references of the execution seam
/// (the interpreter, and an optional override of the environment facade).
pub struct Machine {
    params: CommonParams,
    builtins: Arc<BTreeMap<Address, Builtin>>,
    vm: Arc<dyn Interpreter>,
    environment_layer: Option<Arc<dyn EnvironmentLayer>>,
    spec_rules: Option<Box<SpecCreationRules>>,
}

impl Machine {
    /// A machine with no builtin contracts registered.
    pub fn new(params: CommonParams, vm: Arc<dyn Interpreter>) -> Machine {
        Machine {
            params,
            builtins: Arc::new(BTreeMap::new()),
            vm,
            environment_layer: None,
            spec_rules: None,
        }
    }

    pub fn new_with_builtin(
        params: CommonParams, vm: Arc<dyn Interpreter>,
    ) -> Machine {
        let builtins = new_builtin_map(&params);
        Machine {
            params,
            builtins: Arc::new(builtins),
            vm,
            environment_layer: None,
            spec_rules: None,
        }
    }

    /// A machine over the default code-free interpreter.
    pub fn new_with_default_vm(params: CommonParams) -> Machine {
        Machine::new_with_builtin(params, Arc::new(TransferVm))
    }

    pub fn builtin(
        &self, address: &Address, block_number: BlockNumber,
    ) -> Option<&Builtin> {
        self.builtins.get(address).and_then(|b| {
            if b.is_active(block_number) {
                Some(b)
            } else {
                None
            }
        })
    }

    /// Addresses of the builtins active at `block_number`.
    pub fn builtin_accounts(
        &self, block_number: BlockNumber,
    ) -> Vec<Address> {
        self.builtins
            .iter()
            .filter(|(_, b)| b.is_active(block_number))
            .map(|(addr, _)| *addr)
            .collect()
    }

    /// Attach special rules to the creation of spec.
    pub fn set_spec_creation_rules(&mut self, rules: Box<SpecCreationRules>) {
        self.spec_rules = Some(rules);
    }

    /// Get the general parameters of the chain.
    pub fn params(&self) -> &CommonParams { &self.params }

    pub fn spec(&self, number: BlockNumber, td: Option<U256>) -> Spec {
        let mut spec = self.params.spec(number, td);
        if let Some(ref rules) = self.spec_rules {
            (rules)(&mut spec, number)
        }
        spec
    }

    /// The interpreter executing messages for this machine.
    pub fn vm(&self) -> &Arc<dyn Interpreter> { &self.vm }

    /// Replace the environment facade seen by the interpreter.
    pub fn set_environment_layer(&mut self, layer: Arc<dyn EnvironmentLayer>) {
        self.environment_layer = Some(layer);
    }

    pub fn environment_layer(&self) -> Option<&Arc<dyn EnvironmentLayer>> {
        self.environment_layer.as_ref()
    }

    #[cfg(any(test, feature = "testonly_code"))]
    pub fn spec_for_test(&self, number: u64) -> Spec {
        self.spec(number, None)
    }
}

/// The classic builtin table: addresses `0x1` through `0x9`, activated with
/// the rule-set version that introduced each.
fn new_builtin_map(params: &CommonParams) -> BTreeMap<Address, Builtin> {
    let byzantium = params.activation_block(Fork::Byzantium).unwrap_or(0);
    let istanbul = params.activation_block(Fork::Istanbul).unwrap_or(0);

    let mut btree = BTreeMap::new();
    btree.insert(
        builtin_address(1),
        Builtin::new(Box::new(Linear::new(3000, 0)), 0),
    );
    btree.insert(
        builtin_address(2),
        Builtin::new(Box::new(Linear::new(60, 12)), 0),
    );
    btree.insert(
        builtin_address(3),
        Builtin::new(Box::new(Linear::new(600, 120)), 0),
    );
    btree.insert(
        builtin_address(4),
        Builtin::new(Box::new(Linear::new(15, 3)), 0),
    );
    btree.insert(
        builtin_address(5),
        Builtin::new(Box::new(Linear::new(0, 0)), byzantium),
    );
    btree.insert(
        builtin_address(6),
        Builtin::new(Box::new(Linear::new(500, 0)), byzantium),
    );
    btree.insert(
        builtin_address(7),
        Builtin::new(Box::new(Linear::new(40_000, 0)), byzantium),
    );
    btree.insert(
        builtin_address(8),
        Builtin::new(Box::new(Linear::new(100_000, 80_000)), byzantium),
    );
    btree.insert(
        builtin_address(9),
        Builtin::new(Box::new(Linear::new(0, 0)), istanbul),
    );
    btree
}

// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Cost spec and other parameterisations for the VM.

/// Definition of the cost spec and the protocol amendments active for the
/// block being executed. Produced by the rule-set oracle; consumed by the
/// transaction runner and the interpreter.
#[derive(Debug, Clone)]
pub struct Spec {
    /// VM stack limit
    pub stack_limit: usize,
    /// Max number of nested calls/creates
    pub max_depth: usize,
    /// Transaction cost
    pub tx_gas: usize,
    /// `CREATE` transaction cost
    pub tx_create_gas: usize,
    /// Additional cost for each zero byte of transaction data
    pub tx_data_zero_gas: usize,
    /// Additional cost for each non-zero byte of transaction data
    pub tx_data_non_zero_gas: usize,
    /// Cost of an address entry in the transaction access list
    pub access_list_address_gas: usize,
    /// Cost of a storage-key entry in the transaction access list
    pub access_list_storage_key_gas: usize,
    /// Gas price for a cold storage load
    pub cold_sload_gas: usize,
    /// Gas price for a cold account access
    pub cold_account_access_cost: usize,
    /// Gas price for warm accesses of either kind
    pub warm_access_gas: usize,
    /// Gas price for setting new value to storage (`storage==0`, `new!=0`)
    pub sstore_set_gas: usize,
    /// Gas price for altering value in storage
    pub sstore_reset_gas: usize,
    /// Gas refund for `SSTORE` clearing (when `storage!=0`, `new==0`)
    pub sstore_refund_gas: usize,
    /// Refund for `SELFDESTRUCT` (zero once refunds were reduced)
    pub suicide_refund_gas: usize,
    /// Stipend for transfer for `CALL|CALLCODE` opcode when `value>0`
    pub call_stipend: usize,
    /// Cost per byte of deployed contract code
    pub create_data_gas: usize,
    /// Maximum code size when creating a contract
    pub create_data_limit: usize,
    /// Maximum init code size
    pub init_code_data_limit: usize,
    /// Cost per 32-byte word of init code when the initcode amendment is on
    pub init_code_word_gas: usize,
    /// Divisor of gas-used bounding the refund credited back to the sender
    pub max_refund_quotient: usize,

    /// Replay protection via chain id in legacy signatures
    pub eip155: bool,
    /// Empty-account cleanup: touched empty accounts are removed post-tx
    pub eip158: bool,
    /// Transient storage opcodes
    pub eip1153: bool,
    /// Fee market: per-block base fee, two-dimensional gas price
    pub eip1559: bool,
    /// Reduced calldata cost
    pub eip2028: bool,
    /// Warm/cold access tracking with the access-gas schedule
    pub eip2929: bool,
    /// Optional transaction access lists (tx type 1)
    pub eip2930: bool,
    /// Refund reduction (no selfdestruct refund, lower clear refund)
    pub eip3529: bool,
    /// EOF container format reserved (creation rejected)
    pub eip3540: bool,
    /// New code may not start with the 0xEF byte
    pub eip3541: bool,
    /// Coinbase is pre-warmed at transaction start
    pub eip3651: bool,
    /// Init code size limit and per-word charge
    pub eip3860: bool,
    /// Post-merge randomness beacon exposed in place of difficulty
    pub eip4399: bool,
}

impl Spec {
    /// The spec of the baseline rule set. Amendment flags are all off; the
    /// oracle raises them per the resolved rule-set version.
    pub const fn genesis_spec() -> Spec {
        Spec {
            stack_limit: 1024,
            max_depth: 1024,
            tx_gas: 21000,
            tx_create_gas: 53000,
            tx_data_zero_gas: 4,
            tx_data_non_zero_gas: 68,
            access_list_address_gas: 2400,
            access_list_storage_key_gas: 1900,
            cold_sload_gas: 2100,
            cold_account_access_cost: 2600,
            warm_access_gas: 100,
            sstore_set_gas: 20000,
            sstore_reset_gas: 5000,
            sstore_refund_gas: 15000,
            suicide_refund_gas: 24000,
            call_stipend: 2300,
            create_data_gas: 200,
            create_data_limit: 24576,
            init_code_data_limit: 49152,
            init_code_word_gas: 2,
            max_refund_quotient: 2,
            eip155: false,
            eip158: false,
            eip1153: false,
            eip1559: false,
            eip2028: false,
            eip2929: false,
            eip2930: false,
            eip3529: false,
            eip3540: false,
            eip3541: false,
            eip3651: false,
            eip3860: false,
            eip4399: false,
        }
    }

    /// Adjust the gas plan for the amendments that reprice operations.
    pub fn overwrite_gas_plan_by_amendments(&mut self) {
        if self.eip2028 {
            self.tx_data_non_zero_gas = 16;
        }
        if self.eip3529 {
            self.max_refund_quotient = 5;
            self.suicide_refund_gas = 0;
            self.sstore_refund_gas = 4800;
        }
    }

    #[cfg(any(test, feature = "testonly_code"))]
    pub fn new_spec_for_test() -> Spec { Self::genesis_spec() }
}

#[cfg(any(test, feature = "testonly_code"))]
impl Default for Spec {
    fn default() -> Self { Spec::new_spec_for_test() }
}

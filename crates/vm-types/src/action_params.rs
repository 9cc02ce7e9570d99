// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Message parameters for a call or create frame.

use ethereum_types::{Address, H256, U256};
use primitives::bytes::Bytes;
use std::sync::Arc;

/// The type of the call-like instruction that spawned this message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    /// Not a call (the message is a create).
    None,
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
}

/// The type of the create-like instruction that spawned this message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateType {
    /// Not a create (the message is a call).
    None,
    CREATE,
    CREATE2,
}

/// Transaction value: transferred, or only apparent (for call-code style
/// frames the balance does not move).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionValue {
    /// Value that should be transferred.
    Transfer(U256),
    /// Apparent value for transaction (not transferred).
    Apparent(U256),
}

impl ActionValue {
    /// Returns the value in any case.
    pub fn value(&self) -> U256 {
        match *self {
            ActionValue::Transfer(x) | ActionValue::Apparent(x) => x,
        }
    }

    /// Returns the value if transferrable.
    pub fn transfer_value(&self) -> Option<U256> {
        match *self {
            ActionValue::Transfer(x) => Some(x),
            _ => None,
        }
    }
}

/// The parameters of a single message: the unit of work handed to the
/// interpreter.
#[derive(Clone, Debug)]
pub struct ActionParams {
    /// The account this message executes as. For a create, the address of
    /// the account being created.
    pub address: Address,
    /// The account whose code runs, which delegate-call style frames may
    /// split from `address`.
    pub code_address: Address,
    /// The caller of this frame.
    pub sender: Address,
    /// The sender of the enclosing transaction.
    pub original_sender: Address,
    /// Gas available to the message.
    pub gas: U256,
    /// The per-gas price charged to the transaction.
    pub gas_price: U256,
    /// Transaction value.
    pub value: ActionValue,
    /// Code being executed (init code for creates).
    pub code: Option<Arc<Bytes>>,
    /// Hash of the code, when known.
    pub code_hash: Option<H256>,
    /// Input data.
    pub data: Option<Bytes>,
    /// The call instruction kind, `None` for creates.
    pub call_type: CallType,
    /// The create instruction kind, `None` for calls.
    pub create_type: CreateType,
    /// Salt of a deterministic create.
    pub salt: Option<H256>,
    /// State-modifying operations must fail inside a static frame.
    pub static_flag: bool,
}

impl Default for ActionParams {
    /// Returns default ActionParams initialized with zeros
    fn default() -> ActionParams {
        ActionParams {
            address: Address::zero(),
            code_address: Address::zero(),
            sender: Address::zero(),
            original_sender: Address::zero(),
            gas: U256::zero(),
            gas_price: U256::zero(),
            value: ActionValue::Transfer(U256::zero()),
            code: None,
            code_hash: None,
            data: None,
            call_type: CallType::None,
            create_type: CreateType::None,
            salt: None,
            static_flag: false,
        }
    }
}

impl ActionParams {
    pub fn is_create(&self) -> bool { self.create_type != CreateType::None }
}

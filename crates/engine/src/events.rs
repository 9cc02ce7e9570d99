// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Engine observer events. Handlers are read-only by contract: they
//! receive references, their errors never revert state, and whatever they
//! report is surfaced as warnings on the enclosing result.

use ethereum_types::U256;
use primitives::{BlockHeader, Receipt, SignedTransaction};

/// Per-opcode progress of the interpreter, emitted when the debug flag is
/// on and the injected interpreter reports steps.
#[derive(Debug, Clone)]
pub struct StepInfo {
    pub pc: u64,
    pub opcode: u8,
    pub depth: usize,
    pub gas_left: U256,
}

#[derive(Debug)]
pub enum EngineEvent<'a> {
    BeforeTx { tx: &'a SignedTransaction },
    AfterTx { receipt: &'a Receipt },
    BeforeBlock { header: &'a BlockHeader },
    AfterBlock { header: &'a BlockHeader, receipts: &'a [Receipt] },
    Step { info: &'a StepInfo },
}

pub type EventHandler =
    Box<dyn Fn(&EngineEvent) -> std::result::Result<(), String> + Send + Sync>;

/// Explicit subscribe/notify. Handlers fire in subscription order;
/// failures are collected, logged and reported, never propagated.
#[derive(Default)]
pub struct EventHub {
    handlers: Vec<EventHandler>,
}

impl EventHub {
    pub fn subscribe(&mut self, handler: EventHandler) {
        self.handlers.push(handler);
    }

    pub fn notify(&self, event: &EngineEvent, warnings: &mut Vec<String>) {
        for handler in &self.handlers {
            if let Err(message) = handler(event) {
                warn!("event handler failed: {}", message);
                warnings.push(message);
            }
        }
    }
}

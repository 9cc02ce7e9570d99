// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The tracing seam of the executive. Observers watch; they cannot touch
//! consensus state. The unit type is the production observer and observes
//! nothing.

use crate::executive::ExecutionOutcome;
use onyx_vm_types::MessageResult;
use primitives::SignedTransaction;

pub trait ExecutiveObserver {
    fn on_transact_begin(&mut self, _tx: &SignedTransaction) {}

    /// The raw interpreter report of the top-level message, before gas
    /// settlement.
    fn on_message_result(&mut self, _result: &MessageResult) {}

    fn on_transact_end(&mut self, _outcome: &ExecutionOutcome) {}
}

impl ExecutiveObserver for () {}

// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use onyx_vm_types::{
    ActionParams, Context, Interpreter, MessageResult, Result,
};

/// The default interpreter: executes code-free messages (plain transfers
/// and empty creates) and reports an exceptional halt for any actual
/// bytecode. A full interpreter is injected through the engine options.
pub struct TransferVm;

impl Interpreter for TransferVm {
    fn execute_message(
        &self, params: ActionParams, _context: &mut dyn Context,
    ) -> Result<MessageResult> {
        let has_code = params.code.as_ref().map_or(false, |c| !c.is_empty());
        if has_code {
            return Ok(MessageResult::exceptional_halt());
        }
        let mut result = MessageResult::success(params.gas);
        if params.is_create() {
            result.created_address = Some(params.address);
        }
        Ok(result)
    }
}

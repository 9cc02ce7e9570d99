// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{bytes::Bytes, log_entry::LogEntry};
use ethereum_types::{Bloom, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

pub const TRANSACTION_OUTCOME_SUCCESS: u8 = 1;
pub const TRANSACTION_OUTCOME_FAILURE: u8 = 0;

/// Information describing execution of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Transaction outcome.
    pub outcome_status: u8,
    /// The total gas used in the block up to and including this transaction.
    pub gas_used: U256,
    /// The OR-wide combination of all logs' blooms for this transaction.
    pub log_bloom: Bloom,
    /// The logs stemming from this transaction.
    pub logs: Vec<LogEntry>,
    /// Transaction output.
    pub output: Bytes,
}

impl Receipt {
    pub fn new(
        outcome: u8, gas_used: U256, logs: Vec<LogEntry>, output: Bytes,
    ) -> Self {
        Self {
            outcome_status: outcome,
            gas_used,
            log_bloom: logs.iter().fold(Bloom::default(), |mut b, l| {
                b.accrue_bloom(&l.bloom());
                b
            }),
            logs,
            output,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome_status == TRANSACTION_OUTCOME_SUCCESS
    }
}

impl Encodable for Receipt {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(5);
        s.append(&self.outcome_status);
        s.append(&self.gas_used);
        s.append(&self.log_bloom);
        s.append_list(&self.logs);
        s.append(&self.output);
    }
}

impl Decodable for Receipt {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 5 {
            return Err(DecoderError::RlpIncorrectListLen);
        }

        Ok(Receipt {
            outcome_status: rlp.val_at(0)?,
            gas_used: rlp.val_at(1)?,
            log_bloom: rlp.val_at(2)?,
            logs: rlp.list_at(3)?,
            output: rlp.val_at(4)?,
        })
    }
}

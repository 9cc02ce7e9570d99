// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Types shared between the execution engine and the bytecode interpreter.
//! The engine orchestrates blocks and transactions; the interpreter is an
//! external collaborator reached exclusively through the [`Interpreter`]
//! trait against the [`Context`] environment facade defined here.

mod action_params;
mod context;
mod env;
mod error;
mod messages;
mod spec;

pub use action_params::{ActionParams, ActionValue, CallType, CreateType};
pub use context::{Context, EnvironmentLayer, Interpreter};
pub use env::{Env, BLOCKHASH_WINDOW};
pub use error::{Error, Result};
pub use messages::{MessageResult, MessageStatus};
pub use spec::Spec;

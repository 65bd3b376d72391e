// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

mod call_params;
mod call_type;
mod context;
mod env;
mod error;
mod return_data;
mod spec;

pub use self::{
    call_params::CallParams,
    call_type::CallType,
    context::{Context, ContractCreateResult, MessageCallResult},
    env::Env,
    error::{Error, Maybe, Result},
    return_data::ReturnData,
    spec::{Spec, WasmConfig},
};

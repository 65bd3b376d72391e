// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

/// Gas schedule and execution limits.
#[derive(Debug, Clone)]
pub struct Spec {
    /// Base cost per instruction tier: Zero, Base, VeryLow, Low, Mid, High,
    /// Ext, Special.
    pub tier_step_gas: [u64; 8],
    /// Fixed cost charged before any cross-contract account lookup.
    pub get_account_gas: u64,
    pub exp_gas: u64,
    pub exp_byte_gas: u64,
    pub sha3_gas: u64,
    pub sha3_word_gas: u64,
    pub sload_gas: u64,
    pub sstore_set_gas: u64,
    pub sstore_reset_gas: u64,
    /// Refund granted when a storage write deletes an entry, subject to the
    /// refund cap.
    pub sstore_clears_refund: u64,
    /// Total refund is capped at gas_used / max_refund_quotient.
    pub max_refund_quotient: u64,
    pub jumpdest_gas: u64,
    pub log_gas: u64,
    pub log_data_gas: u64,
    pub log_topic_gas: u64,
    pub create_gas: u64,
    pub call_gas: u64,
    pub call_stipend: u64,
    pub call_value_transfer_gas: u64,
    pub call_new_account_gas: u64,
    pub suicide_gas: u64,
    pub suicide_to_new_account_cost: u64,
    pub memory_gas: u64,
    pub quad_coeff_div: u64,
    pub copy_gas: u64,
    pub balance_gas: u64,
    pub extcodesize_gas: u64,
    pub extcodecopy_base_gas: u64,
    pub extcodehash_gas: u64,
    pub blockhash_gas: u64,
    pub tx_gas: u64,
    pub tx_create_gas: u64,
    pub tx_data_zero_gas: u64,
    pub tx_data_non_zero_gas: u64,
    /// EIP-150: a sub-call may be handed at most
    /// remaining - remaining / sub_gas_cap_divisor.
    pub sub_gas_cap_divisor: u64,
    pub max_call_depth: u64,
    pub stack_limit: usize,
    pub wasm: WasmConfig,
}

/// Limits applied to the sandboxed WASM interpreter.
#[derive(Debug, Clone)]
pub struct WasmConfig {
    pub max_memory_pages: u32,
    pub max_call_stack_depth: usize,
    /// Deterministic float handling in the VM.
    pub canonicalize_nans: bool,
}

impl Default for WasmConfig {
    fn default() -> Self {
        WasmConfig {
            max_memory_pages: 16,
            max_call_stack_depth: 1024,
            canonicalize_nans: true,
        }
    }
}

impl Spec {
    pub fn genesis_spec() -> Spec {
        Spec {
            tier_step_gas: [0, 2, 3, 5, 8, 10, 20, 0],
            get_account_gas: 1,
            exp_gas: 10,
            exp_byte_gas: 50,
            sha3_gas: 30,
            sha3_word_gas: 6,
            sload_gas: 200,
            sstore_set_gas: 20_000,
            sstore_reset_gas: 5_000,
            sstore_clears_refund: 15_000,
            max_refund_quotient: 5,
            jumpdest_gas: 1,
            log_gas: 375,
            log_data_gas: 8,
            log_topic_gas: 375,
            create_gas: 32_000,
            call_gas: 700,
            call_stipend: 2_300,
            call_value_transfer_gas: 9_000,
            call_new_account_gas: 25_000,
            suicide_gas: 5_000,
            suicide_to_new_account_cost: 25_000,
            memory_gas: 3,
            quad_coeff_div: 512,
            copy_gas: 3,
            balance_gas: 400,
            extcodesize_gas: 700,
            extcodecopy_base_gas: 700,
            extcodehash_gas: 400,
            blockhash_gas: 20,
            tx_gas: 21_000,
            tx_create_gas: 53_000,
            tx_data_zero_gas: 4,
            tx_data_non_zero_gas: 68,
            sub_gas_cap_divisor: 64,
            max_call_depth: 1024,
            stack_limit: 1024,
            wasm: WasmConfig::default(),
        }
    }
}

impl Default for Spec {
    fn default() -> Self { Spec::genesis_spec() }
}

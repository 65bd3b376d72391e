// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

/// Read-only chain information handed to the executor alongside each
/// transaction.
#[derive(Debug, Clone, Default)]
pub struct Env {
    pub chain_id: u64,
    /// Height of the last committed block.
    pub number: u64,
    /// Unix timestamp of the last committed block.
    pub timestamp: u64,
}

//! System program instructions.

use solana_sdk::pubkey::Pubkey;

pub use solana_system_interface::instruction::create_account;

/// System program ID.
pub const SYSTEM_PROGRAM_ID: Pubkey = solana_system_interface::program::ID;

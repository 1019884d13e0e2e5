//! Token program instructions.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    sysvar,
};

/// SPL Token program ID.
pub const TOKEN_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// Associated token account program ID.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// InitializeAccount tag in the token program's instruction enum.
pub const INITIALIZE_ACCOUNT_TAG: u8 = 1;

/// Builds a token InitializeAccount instruction binding `account` to `mint`
/// with `owner` as its authority.
#[must_use]
pub fn initialize_account(account: &Pubkey, mint: &Pubkey, owner: &Pubkey) -> Instruction {
    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*account, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(sysvar::rent::ID, false),
        ],
        data: vec![INITIALIZE_ACCOUNT_TAG],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_account() {
        let account = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();

        let ix = initialize_account(&account, &mint, &owner);

        assert_eq!(ix.program_id, TOKEN_PROGRAM_ID);
        assert_eq!(ix.data, vec![1]);
        assert_eq!(ix.accounts.len(), 4);
        assert!(ix.accounts[0].is_writable);
        assert_eq!(ix.accounts[2].pubkey, owner);
        assert_eq!(ix.accounts[3].pubkey, sysvar::rent::ID);
    }
}

//! Proxy program administrative instructions.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    sysvar,
};

use crate::error::ProxyError;
use crate::pda::derive_permission_authority;

use super::system::SYSTEM_PROGRAM_ID;

/// First data byte selecting the proxy's own account-creation entrypoint
/// instead of the venue passthrough.
pub const CREATE_SIGNING_PDA_MARKER: u8 = 255;

/// Builds the instruction creating the proxy's permission authority account.
///
/// Data is `[255, bump]`; the payer funds the account.
///
/// # Errors
///
/// Propagates derivation failures.
pub fn create_signing_pda(
    proxy_program_id: &Pubkey,
    payer: &Pubkey,
) -> Result<Instruction, ProxyError> {
    let (pda, bump) = derive_permission_authority(proxy_program_id)?;

    Ok(Instruction {
        program_id: *proxy_program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(pda, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(sysvar::rent::ID, false),
        ],
        data: vec![CREATE_SIGNING_PDA_MARKER, bump],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_signing_pda() {
        let proxy = Pubkey::new_unique();
        let payer = Pubkey::new_unique();

        let ix = create_signing_pda(&proxy, &payer).expect("instruction");
        let (pda, bump) = derive_permission_authority(&proxy).expect("pda");

        assert_eq!(ix.program_id, proxy);
        assert_eq!(ix.accounts[1].pubkey, pda);
        assert_eq!(ix.data, vec![255, bump]);
    }
}

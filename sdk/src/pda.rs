//! PDA derivation utilities for the permissioned market.
//!
//! Provides the canonical address derivation used across the proxy and every
//! named address built on top of it: global market state, signing authority,
//! passes, identity credentials, proxy authorities and venue vault owners.

use solana_sdk::pubkey::Pubkey;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::instructions::{ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID};

/// Maximum number of seeds, bump included.
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed.
pub const MAX_SEED_LEN: usize = 32;

/// Seed suffix for pass PDA derivation.
pub const CREDIX_PASS_SEED: &[u8] = b"credix-pass";

/// Seed for the proxy's permission authority.
pub const SIGNING_AUTHORITY_SEED: &[u8] = b"signing-authority";

/// Domain seed for identity-credential derivation.
pub const GATEWAY_TOKEN_SEED: &[u8] = b"gateway";

/// Fixed credential index used by identity-credential derivation.
pub const GATEWAY_TOKEN_INDEX: [u8; 8] = [0u8; 8];

/// Seed for the venue market authority held by the proxy.
pub const MARKET_AUTHORITY_SEED: &[u8] = b"open-orders-init";

/// Seed for proxy-owned open orders accounts.
pub const OPEN_ORDERS_SEED: &[u8] = b"open-orders";

fn validate_seeds(seeds: &[&[u8]], reserved: usize) -> Result<(), ProxyError> {
    if seeds.len() + reserved > MAX_SEEDS {
        return Err(ProxyError::InvalidSeedInput(format!(
            "{} seeds exceed the maximum of {}",
            seeds.len() + reserved,
            MAX_SEEDS
        )));
    }
    if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(ProxyError::InvalidSeedInput(format!(
            "seed of {} bytes exceeds {} bytes",
            seed.len(),
            MAX_SEED_LEN
        )));
    }
    Ok(())
}

/// Derives the canonical program address for `seeds`.
///
/// Bumps are tried from 255 downwards; the first candidate
/// `hash(seeds ++ [bump] ++ program_id ++ marker)` that lies off the ed25519
/// curve is returned together with its bump.
///
/// # Errors
///
/// Returns `InvalidSeedInput` for too many or too long seeds and
/// `ExhaustedBumpSpace` if every bump yields an on-curve point.
pub fn derive(seeds: &[&[u8]], program_id: &Pubkey) -> Result<(Pubkey, u8), ProxyError> {
    validate_seeds(seeds, 1)?;

    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut candidate: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 1);
        candidate.extend_from_slice(seeds);
        candidate.push(&bump_seed);

        if let Ok(address) = Pubkey::create_program_address(&candidate, program_id) {
            return Ok((address, bump));
        }
    }

    Err(ProxyError::ExhaustedBumpSpace)
}

/// Derives the venue vault owner for `market`.
///
/// Nonces are tried from 0 upwards, each encoded as 8 little-endian bytes with
/// no bump byte appended. Returns the vault owner and the nonce.
///
/// # Errors
///
/// Returns `ExhaustedBumpSpace` if no nonce below 255 yields an off-curve
/// address.
pub fn derive_vault_owner(
    market: &Pubkey,
    dex_program_id: &Pubkey,
) -> Result<(Pubkey, u64), ProxyError> {
    for nonce in 0..u64::from(u8::MAX) {
        let nonce_bytes = nonce.to_le_bytes();
        let seeds: [&[u8]; 2] = [market.as_ref(), &nonce_bytes];
        if let Ok(owner) = Pubkey::create_program_address(&seeds, dex_program_id) {
            return Ok((owner, nonce));
        }
    }

    Err(ProxyError::ExhaustedBumpSpace)
}

/// Derives the global market state.
///
/// Seeds: `[seed]`
///
/// # Errors
///
/// Returns `InvalidSeedInput` if the seed is empty or too long.
pub fn derive_global_market_state(
    credix_program_id: &Pubkey,
    seed: &str,
) -> Result<(Pubkey, u8), ProxyError> {
    if seed.is_empty() {
        return Err(ProxyError::InvalidSeedInput(
            "global market seed is empty".to_string(),
        ));
    }
    derive(&[seed.as_bytes()], credix_program_id)
}

/// Derives the signing authority of the validating program.
///
/// Seeds: `[global_market_state]`
///
/// # Errors
///
/// Propagates derivation failures.
pub fn derive_signing_authority(
    credix_program_id: &Pubkey,
    global_market_state: &Pubkey,
) -> Result<(Pubkey, u8), ProxyError> {
    derive(&[global_market_state.as_ref()], credix_program_id)
}

/// Derives a participant's pass.
///
/// Seeds: `[global_market_state, participant, b"credix-pass"]`
///
/// # Errors
///
/// Propagates derivation failures.
pub fn derive_credix_pass(
    credix_program_id: &Pubkey,
    global_market_state: &Pubkey,
    participant: &Pubkey,
) -> Result<(Pubkey, u8), ProxyError> {
    derive(
        &[
            global_market_state.as_ref(),
            participant.as_ref(),
            CREDIX_PASS_SEED,
        ],
        credix_program_id,
    )
}

/// Derives a participant's identity credential.
///
/// Seeds: `[participant, b"gateway", [0; 8], gatekeeper_network]`
///
/// # Errors
///
/// Propagates derivation failures.
pub fn derive_gateway_token(
    gateway_program_id: &Pubkey,
    participant: &Pubkey,
    gatekeeper_network: &Pubkey,
) -> Result<(Pubkey, u8), ProxyError> {
    derive(
        &[
            participant.as_ref(),
            GATEWAY_TOKEN_SEED,
            &GATEWAY_TOKEN_INDEX,
            gatekeeper_network.as_ref(),
        ],
        gateway_program_id,
    )
}

/// Derives the proxy's permission authority. Its bump is the data prefix of
/// every proxied instruction.
///
/// Seeds: `[b"signing-authority"]`
///
/// # Errors
///
/// Propagates derivation failures.
pub fn derive_permission_authority(proxy_program_id: &Pubkey) -> Result<(Pubkey, u8), ProxyError> {
    derive(&[SIGNING_AUTHORITY_SEED], proxy_program_id)
}

/// Derives the venue market authority held by the proxy.
///
/// Seeds: `[b"open-orders-init", dex_program_id, market]`
///
/// # Errors
///
/// Propagates derivation failures.
pub fn derive_market_authority(
    proxy_program_id: &Pubkey,
    dex_program_id: &Pubkey,
    market: &Pubkey,
) -> Result<(Pubkey, u8), ProxyError> {
    derive(
        &[MARKET_AUTHORITY_SEED, dex_program_id.as_ref(), market.as_ref()],
        proxy_program_id,
    )
}

/// Derives a participant's proxy-owned open orders account.
///
/// Seeds: `[b"open-orders", dex_program_id, market, participant]`
///
/// # Errors
///
/// Propagates derivation failures.
pub fn derive_open_orders(
    proxy_program_id: &Pubkey,
    dex_program_id: &Pubkey,
    market: &Pubkey,
    participant: &Pubkey,
) -> Result<(Pubkey, u8), ProxyError> {
    derive(
        &[
            OPEN_ORDERS_SEED,
            dex_program_id.as_ref(),
            market.as_ref(),
            participant.as_ref(),
        ],
        proxy_program_id,
    )
}

/// Derives the associated token account of `owner` for `mint`. The owner may
/// itself be a PDA.
///
/// Seeds: `[owner, token_program, mint]`
///
/// # Errors
///
/// Propagates derivation failures.
pub fn derive_associated_token_address(
    owner: &Pubkey,
    mint: &Pubkey,
) -> Result<Pubkey, ProxyError> {
    derive(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _)| address)
}

/// Participant-independent addresses of a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredixPdas {
    /// Global market state.
    pub global_market_state: Pubkey,
    /// Global market state bump.
    pub global_market_state_bump: u8,
    /// Signing authority.
    pub signing_authority: Pubkey,
    /// Signing authority bump.
    pub signing_authority_bump: u8,
    /// Proxy permission authority.
    pub permission_authority: Pubkey,
    /// Proxy permission authority bump.
    pub permission_authority_bump: u8,
}

impl CredixPdas {
    /// Derives all deployment PDAs.
    ///
    /// # Errors
    ///
    /// Propagates derivation failures.
    pub fn derive(config: &ProxyConfig) -> Result<Self, ProxyError> {
        let (global_market_state, global_market_state_bump) =
            derive_global_market_state(&config.credix_program_id, &config.global_market_seed)?;
        let (signing_authority, signing_authority_bump) =
            derive_signing_authority(&config.credix_program_id, &global_market_state)?;
        let (permission_authority, permission_authority_bump) =
            derive_permission_authority(&config.proxy_program_id)?;

        Ok(Self {
            global_market_state,
            global_market_state_bump,
            signing_authority,
            signing_authority_bump,
            permission_authority,
            permission_authority_bump,
        })
    }

    /// Derives the pass of `participant` under this deployment.
    ///
    /// # Errors
    ///
    /// Propagates derivation failures.
    pub fn credix_pass(
        &self,
        config: &ProxyConfig,
        participant: &Pubkey,
    ) -> Result<(Pubkey, u8), ProxyError> {
        derive_credix_pass(&config.credix_program_id, &self.global_market_state, participant)
    }

    /// Derives the identity credential of `participant` under this deployment.
    ///
    /// # Errors
    ///
    /// Propagates derivation failures.
    pub fn gateway_token(
        &self,
        config: &ProxyConfig,
        participant: &Pubkey,
    ) -> Result<Pubkey, ProxyError> {
        derive_gateway_token(
            &config.gateway_program_id,
            participant,
            &config.gatekeeper_network,
        )
        .map(|(address, _)| address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CREDIX_PROGRAM_ID;
    use solana_sdk::hash::Hash;
    use solana_sdk::instruction::{AccountMeta, Instruction};
    use solana_sdk::signature::{Keypair, Signer};
    use solana_sdk::transaction::Transaction;

    fn test_program_id() -> Pubkey {
        Pubkey::new_unique()
    }

    #[test]
    fn test_derive_is_deterministic() {
        let program_id = test_program_id();
        let first = derive(&[b"credix-market"], &program_id).expect("derive");
        let second = derive(&[b"credix-market"], &program_id).expect("derive");
        assert_eq!(first, second);
    }

    #[test]
    fn test_derive_matches_runtime_derivation() {
        let program_id = CREDIX_PROGRAM_ID;
        let seeds: [&[u8]; 1] = [b"credix-market"];
        let ours = derive(&seeds, &program_id).expect("derive");
        let runtime = Pubkey::find_program_address(&seeds, &program_id);
        assert_eq!(ours, runtime);
    }

    #[test]
    fn test_derive_is_off_curve() {
        let program_id = test_program_id();
        for seed in [&b"a"[..], b"credix-market", b"signing-authority"] {
            let (address, _) = derive(&[seed], &program_id).expect("derive");
            assert!(!address.is_on_curve());
        }
    }

    #[test]
    fn test_derived_address_cannot_sign() {
        let program_id = test_program_id();
        let (address, _) = derive(&[SIGNING_AUTHORITY_SEED], &program_id).expect("derive");
        let payer = Keypair::new();
        let ix = Instruction::new_with_bytes(
            program_id,
            &[],
            vec![AccountMeta::new(address, true)],
        );

        let mut tx = Transaction::new_with_payer(&[ix.clone()], Some(&payer.pubkey()));
        assert!(tx.try_sign(&[&payer], Hash::default()).is_err());

        // No keypair holds the derived address, so any stand-in is a mismatch.
        let mut tx = Transaction::new_with_payer(&[ix], Some(&payer.pubkey()));
        assert!(tx.try_sign(&[&payer, &Keypair::new()], Hash::default()).is_err());
        assert!(!tx.is_signed());
    }

    #[test]
    fn test_derive_rejects_long_seed() {
        let program_id = test_program_id();
        let long = [7u8; 33];
        let result = derive(&[&long], &program_id);
        assert!(matches!(result, Err(ProxyError::InvalidSeedInput(_))));
    }

    #[test]
    fn test_derive_rejects_too_many_seeds() {
        let program_id = test_program_id();
        let seeds: Vec<&[u8]> = vec![b"s"; MAX_SEEDS];
        let result = derive(&seeds, &program_id);
        assert!(matches!(result, Err(ProxyError::InvalidSeedInput(_))));
    }

    #[test]
    fn test_derive_vault_owner() {
        let dex = test_program_id();
        let market = Pubkey::new_unique();

        let (owner, nonce) = derive_vault_owner(&market, &dex).expect("vault owner");
        assert!(!owner.is_on_curve());
        assert!(nonce < 255);

        let expected =
            Pubkey::create_program_address(&[market.as_ref(), &nonce.to_le_bytes()], &dex)
                .expect("same nonce must derive");
        assert_eq!(owner, expected);

        // Every smaller nonce must have landed on the curve.
        for smaller in 0..nonce {
            assert!(
                Pubkey::create_program_address(&[market.as_ref(), &smaller.to_le_bytes()], &dex)
                    .is_err()
            );
        }
    }

    #[test]
    fn test_end_to_end_chain() {
        let program_id = CREDIX_PROGRAM_ID;
        let participant = Pubkey::new_unique();

        let (gms, _) = derive_global_market_state(&program_id, "credix-market").expect("gms");
        let (signing, _) = derive_signing_authority(&program_id, &gms).expect("signing");
        let (pass, _) = derive_credix_pass(&program_id, &gms, &participant).expect("pass");

        assert_eq!(gms, Pubkey::find_program_address(&[b"credix-market"], &program_id).0);
        assert_eq!(signing, Pubkey::find_program_address(&[gms.as_ref()], &program_id).0);
        assert_eq!(
            pass,
            Pubkey::find_program_address(
                &[gms.as_ref(), participant.as_ref(), b"credix-pass"],
                &program_id
            )
            .0
        );
    }

    #[test]
    fn test_derive_global_market_state_empty_seed() {
        let result = derive_global_market_state(&test_program_id(), "");
        assert!(matches!(result, Err(ProxyError::InvalidSeedInput(_))));
    }

    #[test]
    fn test_derive_credix_pass_per_participant() {
        let program_id = test_program_id();
        let gms = Pubkey::new_unique();

        let (pass1, _) =
            derive_credix_pass(&program_id, &gms, &Pubkey::new_unique()).expect("pass");
        let (pass2, _) =
            derive_credix_pass(&program_id, &gms, &Pubkey::new_unique()).expect("pass");
        assert_ne!(pass1, pass2);
    }

    #[test]
    fn test_derive_gateway_token() {
        let gateway = test_program_id();
        let participant = Pubkey::new_unique();
        let network = Pubkey::new_unique();

        let (token, _) = derive_gateway_token(&gateway, &participant, &network).expect("token");
        let expected = Pubkey::find_program_address(
            &[participant.as_ref(), b"gateway", &[0u8; 8], network.as_ref()],
            &gateway,
        );
        assert_eq!(token, expected.0);

        let (other, _) =
            derive_gateway_token(&gateway, &participant, &Pubkey::new_unique()).expect("token");
        assert_ne!(token, other);
    }

    #[test]
    fn test_derive_market_authority_and_open_orders() {
        let proxy = test_program_id();
        let dex = test_program_id();
        let market = Pubkey::new_unique();
        let participant = Pubkey::new_unique();

        let (authority, _) = derive_market_authority(&proxy, &dex, &market).expect("authority");
        let (open_orders, _) =
            derive_open_orders(&proxy, &dex, &market, &participant).expect("open orders");
        assert_ne!(authority, open_orders);
    }

    #[test]
    fn test_derive_associated_token_address_allows_pda_owner() {
        let (owner, _) = derive(&[b"pool"], &test_program_id()).expect("pda");
        let mint = Pubkey::new_unique();

        let ata = derive_associated_token_address(&owner, &mint).expect("ata");
        let expected = Pubkey::find_program_address(
            &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
            &ASSOCIATED_TOKEN_PROGRAM_ID,
        );
        assert_eq!(ata, expected.0);
    }

    #[test]
    fn test_credix_pdas_derive() {
        let config = ProxyConfig::new(Pubkey::new_unique(), Pubkey::new_unique());
        let pdas = CredixPdas::derive(&config).expect("pdas");

        let addresses = [
            pdas.global_market_state,
            pdas.signing_authority,
            pdas.permission_authority,
        ];
        for i in 0..addresses.len() {
            for j in (i + 1)..addresses.len() {
                assert_ne!(addresses[i], addresses[j]);
            }
        }

        let participant = Pubkey::new_unique();
        let (pass, _) = pdas.credix_pass(&config, &participant).expect("pass");
        assert_ne!(pass, Pubkey::default());
    }
}

use anchor_lang::prelude::*;

use super::{decode, is_liquid, Adaptor, Holdings, Ledger};
use crate::errors::CellarError;

/// Tokens held directly by the vault authority
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenPosition {
    pub mint: Pubkey,
}

/// Idle holdings: the position is simply the vault's token balance.
pub struct TokenAdaptor;

impl TokenAdaptor {
    pub const NAME: &'static str = "Token Adaptor";
}

impl Adaptor for TokenAdaptor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn asset_of(&self, adaptor_data: &[u8]) -> Result<Pubkey> {
        Ok(decode::<TokenPosition>(adaptor_data)?.mint)
    }

    fn balance_of(&self, holdings: &Holdings, adaptor_data: &[u8]) -> Result<u64> {
        let position: TokenPosition = decode(adaptor_data)?;
        holdings.balance(&position.mint)
    }

    fn withdrawable_from(
        &self,
        holdings: &Holdings,
        adaptor_data: &[u8],
        configuration_data: &[u8],
    ) -> Result<u64> {
        if !is_liquid(configuration_data)? {
            return Ok(0);
        }
        self.balance_of(holdings, adaptor_data)
    }

    fn deposit(
        &self,
        _ledger: &mut Ledger,
        _assets: u64,
        adaptor_data: &[u8],
        _configuration_data: &[u8],
    ) -> Result<()> {
        // Assets already sit in the vault's token account
        decode::<TokenPosition>(adaptor_data).map(|_| ())
    }

    fn withdraw(
        &self,
        ledger: &mut Ledger,
        assets: u64,
        receiver: &Pubkey,
        adaptor_data: &[u8],
        configuration_data: &[u8],
    ) -> Result<()> {
        require!(is_liquid(configuration_data)?, CellarError::UserWithdrawsNotAllowed);
        let position: TokenPosition = decode(adaptor_data)?;
        ledger.pay(&position.mint, receiver, assets)
    }
}

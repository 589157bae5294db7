use anchor_lang::prelude::*;

use super::{
    decode, encode, is_liquid, resolve_amount, Adaptor, Holdings, Ledger,
    MarketCall,
};
use crate::{
    errors::CellarError,
    math::{mul_div_u64, Rounding},
};

/// Supply position in a lending market that issues receipt tokens.
///
/// The market keeps its underlying liquidity in a token account owned by
/// `market`; one receipt redeems for `reserve / receipt_supply` underlying.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LendingPosition {
    pub market_program: Pubkey,
    pub market: Pubkey,
    pub underlying: Pubkey,
    pub receipt: Pubkey,
}

/// Strategist functions of the lending adaptor
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LendingCall {
    /// Supply underlying; `u64::MAX` supplies the whole idle balance
    Supply { position: LendingPosition, amount: u64 },
    /// Redeem receipts; `u64::MAX` redeems all of them
    Redeem { position: LendingPosition, receipts: u64 },
}

pub struct LendingAdaptor;

impl LendingAdaptor {
    pub const NAME: &'static str = "Lending Supply Adaptor";

    fn reserve(holdings: &Holdings, position: &LendingPosition) -> Result<u64> {
        holdings.balance_of_owner(&position.market, &position.underlying)
    }

    fn supply(ledger: &mut Ledger, position: &LendingPosition, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        ledger.approve(&position.underlying, &position.market, amount)?;
        ledger.invoke_market(
            &position.market_program,
            &position.market,
            MarketCall::Supply { amount },
        )?;
        ledger.revoke(&position.underlying)
    }

    fn redeem(ledger: &mut Ledger, position: &LendingPosition, receipts: u64) -> Result<()> {
        if receipts == 0 {
            return Ok(());
        }
        ledger.invoke_market(
            &position.market_program,
            &position.market,
            MarketCall::Redeem { receipts },
        )
    }
}

impl Adaptor for LendingAdaptor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn asset_of(&self, adaptor_data: &[u8]) -> Result<Pubkey> {
        Ok(decode::<LendingPosition>(adaptor_data)?.underlying)
    }

    fn balance_of(&self, holdings: &Holdings, adaptor_data: &[u8]) -> Result<u64> {
        let position: LendingPosition = decode(adaptor_data)?;
        let receipts = holdings.balance(&position.receipt)?;
        if receipts == 0 {
            return Ok(0);
        }
        let supply = holdings.mint_supply(&position.receipt)?;
        let reserve = Self::reserve(holdings, &position)?;
        mul_div_u64(receipts, reserve, supply, Rounding::Down)
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
        let position: LendingPosition = decode(adaptor_data)?;
        let balance = self.balance_of(holdings, adaptor_data)?;
        Ok(balance.min(Self::reserve(holdings, &position)?))
    }

    fn deposit(
        &self,
        ledger: &mut Ledger,
        assets: u64,
        adaptor_data: &[u8],
        _configuration_data: &[u8],
    ) -> Result<()> {
        let position: LendingPosition = decode(adaptor_data)?;
        Self::supply(ledger, &position, assets)
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
        let position: LendingPosition = decode(adaptor_data)?;
        if assets == 0 {
            return Ok(());
        }

        let (receipts_needed, held) = {
            let holdings = ledger.holdings();
            let supply = holdings.mint_supply(&position.receipt)?;
            let reserve = Self::reserve(&holdings, &position)?;
            let held = holdings.balance(&position.receipt)?;
            (mul_div_u64(assets, supply, reserve, Rounding::Up)?, held)
        };

        let before = ledger.balance(&position.underlying)?;
        Self::redeem(ledger, &position, receipts_needed.min(held))?;
        let received = ledger
            .balance(&position.underlying)?
            .checked_sub(before)
            .ok_or(CellarError::MathOverflow)?;

        // Any market-side fee or rounding loss must not short the receiver
        require!(received >= assets, CellarError::InsufficientLiquidity);
        ledger.pay(&position.underlying, receiver, assets)
    }

    fn call(&self, ledger: &mut Ledger, data: &[u8]) -> Result<()> {
        match decode::<LendingCall>(data)? {
            LendingCall::Supply { position, amount } => {
                ledger.require_position_used(&encode(&position)?)?;
                let idle = ledger.balance(&position.underlying)?;
                Self::supply(ledger, &position, resolve_amount(amount, idle))
            }
            LendingCall::Redeem { position, receipts } => {
                ledger.require_position_used(&encode(&position)?)?;
                let held = ledger.balance(&position.receipt)?;
                Self::redeem(ledger, &position, resolve_amount(receipts, held))
            }
        }
    }
}

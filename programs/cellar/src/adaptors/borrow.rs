use anchor_lang::prelude::*;

use super::{decode, encode, resolve_amount, Adaptor, Holdings, Ledger, MarketCall};
use crate::errors::CellarError;

/// Debt owed to a lending market, tracked by a debt token held by the vault
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BorrowPosition {
    pub market_program: Pubkey,
    pub market: Pubkey,
    pub underlying: Pubkey,
    pub debt_mint: Pubkey,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BorrowCall {
    Borrow { position: BorrowPosition, amount: u64 },
    /// `u64::MAX` repays the whole debt, bounded by the idle balance
    Repay { position: BorrowPosition, amount: u64 },
}

/// Liability position. Only the strategist moves it.
pub struct BorrowAdaptor;

impl BorrowAdaptor {
    pub const NAME: &'static str = "Lending Borrow Adaptor";
}

impl Adaptor for BorrowAdaptor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_debt(&self) -> bool {
        true
    }

    fn asset_of(&self, adaptor_data: &[u8]) -> Result<Pubkey> {
        Ok(decode::<BorrowPosition>(adaptor_data)?.underlying)
    }

    fn balance_of(&self, holdings: &Holdings, adaptor_data: &[u8]) -> Result<u64> {
        let position: BorrowPosition = decode(adaptor_data)?;
        holdings.balance(&position.debt_mint)
    }

    fn withdrawable_from(
        &self,
        _holdings: &Holdings,
        _adaptor_data: &[u8],
        _configuration_data: &[u8],
    ) -> Result<u64> {
        Ok(0)
    }

    fn deposit(
        &self,
        _ledger: &mut Ledger,
        _assets: u64,
        _adaptor_data: &[u8],
        _configuration_data: &[u8],
    ) -> Result<()> {
        err!(CellarError::UserDepositsNotAllowed)
    }

    fn withdraw(
        &self,
        _ledger: &mut Ledger,
        _assets: u64,
        _receiver: &Pubkey,
        _adaptor_data: &[u8],
        _configuration_data: &[u8],
    ) -> Result<()> {
        err!(CellarError::UserWithdrawsNotAllowed)
    }

    fn call(&self, ledger: &mut Ledger, data: &[u8]) -> Result<()> {
        match decode::<BorrowCall>(data)? {
            BorrowCall::Borrow { position, amount } => {
                ledger.require_position_used(&encode(&position)?)?;
                require!(amount > 0, CellarError::ZeroAmount);
                ledger.invoke_market(
                    &position.market_program,
                    &position.market,
                    MarketCall::Borrow { amount },
                )
            }
            BorrowCall::Repay { position, amount } => {
                ledger.require_position_used(&encode(&position)?)?;
                let owed = ledger.balance(&position.debt_mint)?;
                let idle = ledger.balance(&position.underlying)?;
                let amount = resolve_amount(amount, owed).min(owed).min(idle);
                if amount == 0 {
                    return Ok(());
                }
                ledger.approve(&position.underlying, &position.market, amount)?;
                ledger.invoke_market(
                    &position.market_program,
                    &position.market,
                    MarketCall::Repay { amount },
                )?;
                ledger.revoke(&position.underlying)
            }
        }
    }

    // Debt positions carry no liquidity policy
    fn validate_configuration(&self, _configuration_data: &[u8]) -> Result<()> {
        Ok(())
    }
}

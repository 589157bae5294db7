use anchor_lang::prelude::*;

use crate::{
    adaptors::ProtocolHost,
    constants::*,
    errors::CellarError,
    math::{mul_div, pow10, to_u64, Rounding},
    state::cellar::{Cellar, CellarEnv},
};

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeConfig {
    /// Cut of share price gains above the high-water mark
    pub performance_fee_bps: u16,
    /// Annualized fee on total assets
    pub management_fee_bps: u16,
    /// Part of collected fees paid to the strategist; the rest goes to the platform
    pub strategist_cut_bps: u16,
    pub platform: Pubkey,
    pub strategist_payout: Pubkey,
}

impl FeeConfig {
    pub fn validate(&self) -> Result<()> {
        require!(
            self.performance_fee_bps <= MAX_PERFORMANCE_FEE_BPS,
            CellarError::InvalidFeeConfig
        );
        require!(
            self.management_fee_bps <= MAX_MANAGEMENT_FEE_BPS,
            CellarError::InvalidFeeConfig
        );
        require!(
            self.strategist_cut_bps as u64 <= BPS_DENOMINATOR,
            CellarError::InvalidFeeConfig
        );
        Ok(())
    }
}

/// Fee accrual state of one cellar.
///
/// Fees are taken by minting shares to the vault authority, which holds
/// them until `distribute` pays them out.
#[account]
#[derive(Debug)]
pub struct FeesAndReserves {
    pub cellar: Pubkey,
    pub config: FeeConfig,

    /// Best post-fee share price seen, never decreases
    pub high_water_mark: u64,

    /// Zero until the first accrual checkpoint
    pub last_accrual: i64,

    /// Fee shares minted and not yet distributed
    pub accrued_fee_shares: u64,

    pub total_distributed: u64,

    pub bump: u8,
}

/// Fee shares and where they went
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Distribution {
    pub strategist_shares: u64,
    pub platform_shares: u64,
}

impl FeesAndReserves {
    pub fn new(cellar: Pubkey, config: FeeConfig, bump: u8) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cellar,
            config,
            high_water_mark: 0,
            last_accrual: 0,
            accrued_fee_shares: 0,
            total_distributed: 0,
            bump,
        })
    }

    pub fn update_config(&mut self, config: FeeConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Fee shares owed at `now` for a cellar holding `total_assets` against
    /// `total_shares`. `share_unit` is one whole share.
    ///
    /// Updates the checkpoint and high-water mark; the caller mints the
    /// returned shares.
    pub fn accrue(&mut self, now: i64, total_assets: u64, total_shares: u64, share_unit: u64) -> Result<u64> {
        if self.last_accrual == 0 || total_shares == 0 || total_assets == 0 {
            self.last_accrual = now;
            if total_shares > 0 {
                let price = share_price(total_assets, total_shares, share_unit)?;
                self.high_water_mark = self.high_water_mark.max(price);
            }
            return Ok(0);
        }

        let elapsed = now.saturating_sub(self.last_accrual).max(0) as u128;
        let management = mul_div(
            total_assets as u128 * self.config.management_fee_bps as u128,
            elapsed,
            BPS_DENOMINATOR as u128 * SECONDS_PER_YEAR as u128,
            Rounding::Down,
        )?;

        let price = share_price(total_assets, total_shares, share_unit)?;
        let performance = if price > self.high_water_mark && self.high_water_mark > 0 {
            let gain = mul_div(
                (price - self.high_water_mark) as u128,
                total_shares as u128,
                share_unit as u128,
                Rounding::Down,
            )?;
            mul_div(
                gain,
                self.config.performance_fee_bps as u128,
                BPS_DENOMINATOR as u128,
                Rounding::Down,
            )?
        } else {
            0
        };

        // Keep strictly below total assets so dilution stays finite
        let fee_assets = (management + performance).min(total_assets as u128 - 1);
        let fee_shares = to_u64(mul_div(
            fee_assets,
            total_shares as u128,
            total_assets as u128 - fee_assets,
            Rounding::Down,
        )?)?;

        let post_fee_shares = total_shares
            .checked_add(fee_shares)
            .ok_or(CellarError::MathOverflow)?;
        let post_fee_price = share_price(total_assets, post_fee_shares, share_unit)?;
        self.high_water_mark = self.high_water_mark.max(post_fee_price);
        self.last_accrual = now;
        self.accrued_fee_shares = self
            .accrued_fee_shares
            .checked_add(fee_shares)
            .ok_or(CellarError::MathOverflow)?;
        Ok(fee_shares)
    }

    /// Split pending fee shares between strategist and platform
    pub fn take_distribution(&mut self) -> Result<Distribution> {
        require!(self.accrued_fee_shares > 0, CellarError::NoFeesToDistribute);
        let shares = self.accrued_fee_shares;
        let strategist_shares = to_u64(mul_div(
            shares as u128,
            self.config.strategist_cut_bps as u128,
            BPS_DENOMINATOR as u128,
            Rounding::Down,
        )?)?;
        self.accrued_fee_shares = 0;
        self.total_distributed = self
            .total_distributed
            .checked_add(shares)
            .ok_or(CellarError::MathOverflow)?;
        Ok(Distribution {
            strategist_shares,
            platform_shares: shares - strategist_shares,
        })
    }
}

fn share_price(total_assets: u64, total_shares: u64, share_unit: u64) -> Result<u64> {
    to_u64(mul_div(
        total_assets as u128,
        share_unit as u128,
        total_shares as u128,
        Rounding::Down,
    )?)
}

impl Cellar {
    /// Checkpoint fees and mint any owed fee shares to the vault authority
    pub fn accrue_fees(
        &mut self,
        env: &CellarEnv,
        host: &mut dyn ProtocolHost,
        fees: &mut FeesAndReserves,
    ) -> Result<u64> {
        require_keys_eq!(fees.cellar, self.address, CellarError::InvalidFeeConfig);
        let total_assets = self.total_assets(env, &*host)?;
        let share_unit = to_u64(pow10(self.asset_decimals)?)?;
        let fee_shares = fees.accrue(host.now(), total_assets, self.total_shares, share_unit)?;
        if fee_shares > 0 {
            host.mint_to(&self.share_mint, &self.vault_authority, fee_shares)?;
            self.total_shares = self
                .total_shares
                .checked_add(fee_shares)
                .ok_or(CellarError::MathOverflow)?;
        }
        Ok(fee_shares)
    }

    /// Pay pending fee shares out of the vault authority's share account
    pub fn distribute_fees(
        &self,
        host: &mut dyn ProtocolHost,
        fees: &mut FeesAndReserves,
    ) -> Result<Distribution> {
        require_keys_eq!(fees.cellar, self.address, CellarError::InvalidFeeConfig);
        let distribution = fees.take_distribution()?;
        let payout = [
            (fees.config.strategist_payout, distribution.strategist_shares),
            (fees.config.platform, distribution.platform_shares),
        ];
        for (recipient, shares) in payout {
            if shares > 0 {
                host.transfer(&self.share_mint, &self.vault_authority, &recipient, shares)?;
            }
        }
        Ok(distribution)
    }
}

use anchor_lang::prelude::*;

use crate::{
    constants::*,
    errors::CellarError,
    math::{deviation_bps, isqrt, mul_div, pow10, rescale, to_u64, Rounding},
};

/// Read-only window onto oracles and token state used for valuation
pub trait PriceSource {
    /// Current unix timestamp
    fn now(&self) -> i64;

    fn oracle_quote(&self, oracle: &Pubkey) -> Result<OracleQuote>;

    /// Balance of the `mint` token account owned by `owner`
    fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64>;

    fn mint_supply(&self, mint: &Pubkey) -> Result<u64>;
}

/// Oracle answer in the oracle's own fixed-point format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OracleQuote {
    pub feed_id: [u8; 32],
    pub price: i64,
    pub conf: u64,
    pub exponent: i32,
    pub publish_time: i64,
}

/// One side of a pool: reserves are the `mint` balance held by `vault_owner`
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolToken {
    pub mint: Pubkey,
    pub vault_owner: Pubkey,
}

/// How an asset is priced
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum Extension {
    /// Direct Pyth feed in USD. Zero bounds disable the check.
    Pyth {
        oracle: Pubkey,
        feed_id: [u8; 32],
        max_confidence_bps: u16,
        min_price: u64,
        max_price: u64,
    },
    /// Fixed USD price at `PRICE_DECIMALS`
    Pegged { usd_price: u64 },
    /// Feed denominated in another registered asset
    Quoted {
        oracle: Pubkey,
        feed_id: [u8; 32],
        reference: Pubkey,
    },
    /// Wrapper or receipt redeemable for `reserve / supply` underlying,
    /// where reserve is the underlying held by `reserve_owner`
    ExchangeRate {
        underlying: Pubkey,
        reserve_owner: Pubkey,
    },
    /// Stable pool LP token valued by the StableSwap invariant
    StablePool {
        constituents: Vec<PoolToken>,
        amplification: u64,
    },
    /// Constant product LP token valued at fair reserves
    ConstantProductPool { token0: PoolToken, token1: PoolToken },
}

impl Extension {
    /// Registered assets this extension prices through
    pub fn dependencies(&self) -> Vec<Pubkey> {
        match self {
            Extension::Pyth { .. } | Extension::Pegged { .. } => Vec::new(),
            Extension::Quoted { reference, .. } => vec![*reference],
            Extension::ExchangeRate { underlying, .. } => vec![*underlying],
            Extension::StablePool { constituents, .. } => {
                constituents.iter().map(|c| c.mint).collect()
            }
            Extension::ConstantProductPool { token0, token1 } => vec![token0.mint, token1.mint],
        }
    }

    fn validate(&self, asset: &Pubkey) -> Result<()> {
        match self {
            Extension::Pyth {
                min_price,
                max_price,
                max_confidence_bps,
                ..
            } => {
                require!(
                    *max_price == 0 || min_price <= max_price,
                    CellarError::InvalidExtension
                );
                require!(
                    (*max_confidence_bps as u64) <= BPS_DENOMINATOR,
                    CellarError::InvalidExtension
                );
            }
            Extension::Pegged { usd_price } => {
                require!(*usd_price > 0, CellarError::InvalidExtension);
            }
            Extension::StablePool {
                constituents,
                amplification,
            } => {
                require!(
                    (2..=MAX_POOL_CONSTITUENTS).contains(&constituents.len()),
                    CellarError::InvalidExtension
                );
                require!(*amplification > 0, CellarError::InvalidExtension);
            }
            Extension::Quoted { .. }
            | Extension::ExchangeRate { .. }
            | Extension::ConstantProductPool { .. } => {}
        }
        require!(
            !self.dependencies().contains(asset),
            CellarError::InvalidExtension
        );
        Ok(())
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct AssetSettings {
    pub asset: Pubkey,
    pub decimals: u8,
    /// Maximum oracle age in seconds; zero uses the router default
    pub max_age: u32,
    pub extension: Extension,
}

/// Common-denomination valuation service shared by every cellar.
///
/// Prices are USD with `PRICE_DECIMALS`. A missing or stale input is an
/// error, never a default.
#[account]
pub struct PriceRouter {
    pub authority: Pubkey,

    /// Oracle age bound for assets that do not set their own
    pub default_max_age: u32,

    pub assets: Vec<AssetSettings>,

    pub bump: u8,
}

impl PriceRouter {
    pub fn new(authority: Pubkey, default_max_age: u32, bump: u8) -> Self {
        Self {
            authority,
            default_max_age,
            assets: Vec::new(),
            bump,
        }
    }

    pub fn require_authority(&self, caller: &Pubkey) -> Result<()> {
        require_keys_eq!(*caller, self.authority, CellarError::Unauthorized);
        Ok(())
    }

    /// Register an asset, checking the live answer against `expected_price`
    pub fn add_asset<S: PriceSource + ?Sized>(
        &mut self,
        caller: &Pubkey,
        settings: AssetSettings,
        expected_price: u128,
        source: &S,
    ) -> Result<u128> {
        self.require_authority(caller)?;
        require!(
            !self.is_supported(&settings.asset),
            CellarError::AssetAlreadySupported
        );
        require!(self.assets.len() < MAX_ASSETS, CellarError::RegistryFull);
        settings.extension.validate(&settings.asset)?;
        for dependency in settings.extension.dependencies() {
            require!(self.is_supported(&dependency), CellarError::PriceNotAvailable);
        }

        let asset = settings.asset;
        self.assets.push(settings);
        let price = match self.get_price_in_usd(source, &asset) {
            Ok(price) => price,
            Err(e) => {
                self.assets.pop();
                return Err(e);
            }
        };
        if deviation_bps(price, expected_price)? > EXPECTED_PRICE_DEVIATION_BPS as u128 {
            self.assets.pop();
            return err!(CellarError::BadAnswer);
        }

        msg!("Asset {} added at price {}", asset, price);
        Ok(price)
    }

    pub fn remove_asset(&mut self, caller: &Pubkey, asset: &Pubkey) -> Result<()> {
        self.require_authority(caller)?;
        require!(self.is_supported(asset), CellarError::PriceNotAvailable);
        // Other extensions may still price through this asset
        require!(
            !self
                .assets
                .iter()
                .any(|a| a.extension.dependencies().contains(asset)),
            CellarError::InvalidExtension
        );
        self.assets.retain(|a| a.asset != *asset);
        Ok(())
    }

    pub fn set_default_max_age(&mut self, caller: &Pubkey, max_age: u32) -> Result<()> {
        self.require_authority(caller)?;
        require!(max_age > 0, CellarError::InvalidExtension);
        self.default_max_age = max_age;
        Ok(())
    }

    pub fn is_supported(&self, asset: &Pubkey) -> bool {
        self.assets.iter().any(|a| a.asset == *asset)
    }

    pub fn settings(&self, asset: &Pubkey) -> Result<&AssetSettings> {
        self.assets
            .iter()
            .find(|a| a.asset == *asset)
            .ok_or(error!(CellarError::PriceNotAvailable))
    }

    pub fn get_price_in_usd<S: PriceSource + ?Sized>(&self, source: &S, asset: &Pubkey) -> Result<u128> {
        self.price_at_depth(source, asset, 0)
    }

    /// Value of `amount` of `base` in `quote` units, rounded down
    pub fn get_value<S: PriceSource + ?Sized>(
        &self,
        source: &S,
        base: &Pubkey,
        amount: u64,
        quote: &Pubkey,
    ) -> Result<u64> {
        if base == quote || amount == 0 {
            return Ok(amount);
        }
        let base_settings = self.settings(base)?;
        let quote_settings = self.settings(quote)?;
        let base_price = self.get_price_in_usd(source, base)?;
        let quote_price = self.get_price_in_usd(source, quote)?;

        let numerator = (amount as u128)
            .checked_mul(base_price)
            .ok_or(error!(CellarError::MathOverflow))?;
        let value = if quote_settings.decimals >= base_settings.decimals {
            let scale = pow10(quote_settings.decimals - base_settings.decimals)?;
            mul_div(numerator, scale, quote_price, Rounding::Down)?
        } else {
            let scale = pow10(base_settings.decimals - quote_settings.decimals)?;
            let denominator = quote_price
                .checked_mul(scale)
                .ok_or(error!(CellarError::MathOverflow))?;
            numerator / denominator
        };
        to_u64(value)
    }

    /// Summed value of several assets in `quote` units
    pub fn get_values<S: PriceSource + ?Sized>(
        &self,
        source: &S,
        bases: &[Pubkey],
        amounts: &[u64],
        quote: &Pubkey,
    ) -> Result<u64> {
        require!(bases.len() == amounts.len(), CellarError::InvalidIndex);
        bases
            .iter()
            .zip(amounts)
            .try_fold(0u64, |total, (base, amount)| {
                let value = self.get_value(source, base, *amount, quote)?;
                total
                    .checked_add(value)
                    .ok_or(error!(CellarError::MathOverflow))
            })
    }

    /// Value of one whole `base` token in `quote` units
    pub fn get_exchange_rate<S: PriceSource + ?Sized>(
        &self,
        source: &S,
        base: &Pubkey,
        quote: &Pubkey,
    ) -> Result<u64> {
        let one = to_u64(pow10(self.settings(base)?.decimals)?)?;
        self.get_value(source, base, one, quote)
    }

    fn price_at_depth<S: PriceSource + ?Sized>(&self, source: &S, asset: &Pubkey, depth: u8) -> Result<u128> {
        require!(depth <= MAX_EXTENSION_DEPTH, CellarError::ExtensionDepthExceeded);
        let settings = self.settings(asset)?;

        let price = match &settings.extension {
            Extension::Pyth {
                oracle,
                feed_id,
                max_confidence_bps,
                min_price,
                max_price,
            } => {
                let price = self.read_feed(source, settings, oracle, feed_id, *max_confidence_bps)?;
                require!(
                    *min_price == 0 || price >= *min_price as u128,
                    CellarError::PriceOutOfBounds
                );
                require!(
                    *max_price == 0 || price <= *max_price as u128,
                    CellarError::PriceOutOfBounds
                );
                price
            }
            Extension::Pegged { usd_price } => *usd_price as u128,
            Extension::Quoted {
                oracle,
                feed_id,
                reference,
            } => {
                let ratio = self.read_feed(source, settings, oracle, feed_id, 0)?;
                let reference_price = self.price_at_depth(source, reference, depth + 1)?;
                mul_div(ratio, reference_price, ONE_USD, Rounding::Down)?
            }
            Extension::ExchangeRate {
                underlying,
                reserve_owner,
            } => self.exchange_rate_price(source, settings, underlying, reserve_owner, depth)?,
            Extension::StablePool {
                constituents,
                amplification,
            } => self.stable_pool_price(source, settings, constituents, *amplification, depth)?,
            Extension::ConstantProductPool { token0, token1 } => {
                self.constant_product_price(source, settings, token0, token1, depth)?
            }
        };

        require!(price > 0, CellarError::InvalidPrice);
        Ok(price)
    }

    /// Normalized feed price at `PRICE_DECIMALS` after freshness and
    /// confidence checks
    fn read_feed<S: PriceSource + ?Sized>(
        &self,
        source: &S,
        settings: &AssetSettings,
        oracle: &Pubkey,
        feed_id: &[u8; 32],
        max_confidence_bps: u16,
    ) -> Result<u128> {
        let quote = source.oracle_quote(oracle)?;
        require!(quote.feed_id == *feed_id, CellarError::PriceNotAvailable);

        let max_age = if settings.max_age == 0 {
            self.default_max_age
        } else {
            settings.max_age
        };
        let age = source.now().saturating_sub(quote.publish_time);
        require!(age <= max_age as i64, CellarError::StalePrice);
        require!(quote.price > 0, CellarError::InvalidPrice);

        if max_confidence_bps > 0 {
            let spread = (quote.conf as u128) * BPS_DENOMINATOR as u128;
            let allowed = (quote.price as u128) * max_confidence_bps as u128;
            require!(spread <= allowed, CellarError::PriceConfidenceTooWide);
        }

        normalize_price(quote.price as u128, quote.exponent)
    }

    fn exchange_rate_price<S: PriceSource + ?Sized>(
        &self,
        source: &S,
        settings: &AssetSettings,
        underlying: &Pubkey,
        reserve_owner: &Pubkey,
        depth: u8,
    ) -> Result<u128> {
        let underlying_settings = self.settings(underlying)?;
        let underlying_price = self.price_at_depth(source, underlying, depth + 1)?;
        let supply = source.mint_supply(&settings.asset)?;
        if supply == 0 {
            // Nothing issued yet: one whole wrapper redeems for one whole underlying
            return Ok(underlying_price);
        }
        let reserve = source.token_balance(reserve_owner, underlying)?;

        // underlying units per whole wrapper token
        let per_token = mul_div(
            reserve as u128,
            pow10(settings.decimals)?,
            supply as u128,
            Rounding::Down,
        )?;
        mul_div(
            per_token,
            underlying_price,
            pow10(underlying_settings.decimals)?,
            Rounding::Down,
        )
    }

    /// LP price = D / supply × min constituent price.
    ///
    /// Spot balances only enter through the invariant, so moving the pool
    /// along its curve cannot inflate the answer.
    fn stable_pool_price<S: PriceSource + ?Sized>(
        &self,
        source: &S,
        settings: &AssetSettings,
        constituents: &[PoolToken],
        amplification: u64,
        depth: u8,
    ) -> Result<u128> {
        let supply = source.mint_supply(&settings.asset)?;
        require!(supply > 0, CellarError::PriceNotAvailable);

        let mut reserves = Vec::with_capacity(constituents.len());
        let mut min_price = u128::MAX;
        for token in constituents {
            let token_settings = self.settings(&token.mint)?;
            let price = self.price_at_depth(source, &token.mint, depth + 1)?;
            min_price = min_price.min(price);
            let reserve = source.token_balance(&token.vault_owner, &token.mint)?;
            reserves.push(rescale(
                reserve as u128,
                token_settings.decimals,
                INVARIANT_DECIMALS,
            )?);
        }

        let invariant = stable_invariant(&reserves, amplification)?;
        let per_lp = mul_div(
            invariant,
            pow10(settings.decimals)?,
            supply as u128,
            Rounding::Down,
        )?;
        mul_div(per_lp, min_price, pow10(INVARIANT_DECIMALS)?, Rounding::Down)
    }

    /// LP price = 2·√(v0·v1) / supply with v the USD value of each reserve
    fn constant_product_price<S: PriceSource + ?Sized>(
        &self,
        source: &S,
        settings: &AssetSettings,
        token0: &PoolToken,
        token1: &PoolToken,
        depth: u8,
    ) -> Result<u128> {
        let supply = source.mint_supply(&settings.asset)?;
        require!(supply > 0, CellarError::PriceNotAvailable);

        let v0 = self.reserve_value(source, token0, depth)?;
        let v1 = self.reserve_value(source, token1, depth)?;
        let root = match v0.checked_mul(v1) {
            Some(product) => isqrt(product),
            None => isqrt(v0)
                .checked_mul(isqrt(v1))
                .ok_or(error!(CellarError::MathOverflow))?,
        };
        let fair_value = root.checked_mul(2).ok_or(error!(CellarError::MathOverflow))?;
        mul_div(
            fair_value,
            pow10(settings.decimals)?,
            supply as u128,
            Rounding::Down,
        )
    }

    fn reserve_value<S: PriceSource + ?Sized>(&self, source: &S, token: &PoolToken, depth: u8) -> Result<u128> {
        let token_settings = self.settings(&token.mint)?;
        let price = self.price_at_depth(source, &token.mint, depth + 1)?;
        let reserve = source.token_balance(&token.vault_owner, &token.mint)?;
        mul_div(
            reserve as u128,
            price,
            pow10(token_settings.decimals)?,
            Rounding::Down,
        )
    }
}

/// Bring a fixed-point `value × 10^exponent` to `PRICE_DECIMALS`
pub fn normalize_price(value: u128, exponent: i32) -> Result<u128> {
    let shift = exponent
        .checked_add(PRICE_DECIMALS as i32)
        .ok_or(error!(CellarError::MathOverflow))?;
    let magnitude = u8::try_from(shift.unsigned_abs()).map_err(|_| error!(CellarError::MathOverflow))?;
    if shift >= 0 {
        value
            .checked_mul(pow10(magnitude)?)
            .ok_or(error!(CellarError::MathOverflow))
    } else {
        Ok(value / pow10(magnitude)?)
    }
}

/// StableSwap invariant D for `reserves` (all at the same decimals)
pub fn stable_invariant(reserves: &[u128], amplification: u64) -> Result<u128> {
    let n = reserves.len() as u128;
    let sum = reserves
        .iter()
        .try_fold(0u128, |acc, r| acc.checked_add(*r))
        .ok_or(error!(CellarError::MathOverflow))?;
    if sum == 0 {
        return Ok(0);
    }
    require!(reserves.iter().all(|r| *r > 0), CellarError::PriceNotAvailable);

    let overflow = || error!(CellarError::MathOverflow);
    let ann = (amplification as u128).checked_mul(n).ok_or_else(overflow)?;
    let mut d = sum;
    for _ in 0..MAX_INVARIANT_ITERATIONS {
        let mut d_p = d;
        for reserve in reserves {
            let denominator = reserve.checked_mul(n).ok_or_else(overflow)?;
            d_p = mul_div(d_p, d, denominator, Rounding::Down)?;
        }
        let previous = d;
        let numerator = ann
            .checked_mul(sum)
            .and_then(|v| v.checked_add(d_p.checked_mul(n)?))
            .ok_or_else(overflow)?;
        let denominator = ann
            .checked_sub(1)
            .and_then(|v| v.checked_mul(d))
            .and_then(|v| v.checked_add((n + 1).checked_mul(d_p)?))
            .ok_or_else(overflow)?;
        d = mul_div(numerator, d, denominator, Rounding::Down)?;
        if d.abs_diff(previous) <= 1 {
            return Ok(d);
        }
    }
    err!(CellarError::PriceNotAvailable)
}

use anchor_lang::prelude::*;

use crate::{constants::*, errors::CellarError, math::deviation_bps};

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct OracleConfig {
    /// Maximum seconds between updates
    pub heartbeat: u32,
    /// Share price move that forces an update
    pub deviation_trigger_bps: u16,
    /// Extra seconds past the heartbeat before the answer is unsafe
    pub grace_period: u32,
    /// Observations the TWAP window spans
    pub observations: u8,
    /// Seconds each observation covers
    pub observation_duration: u32,
}

impl OracleConfig {
    pub fn validate(&self) -> Result<()> {
        require!(self.heartbeat > 0, CellarError::InvalidOracleConfig);
        require!(
            self.deviation_trigger_bps > 0 && self.deviation_trigger_bps as u64 <= BPS_DENOMINATOR,
            CellarError::InvalidOracleConfig
        );
        require!(
            (MIN_OBSERVATIONS..=MAX_OBSERVATIONS).contains(&(self.observations as usize)),
            CellarError::InvalidOracleConfig
        );
        require!(self.observation_duration > 0, CellarError::InvalidOracleConfig);
        Ok(())
    }
}

/// Start of one TWAP bucket
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Observation {
    pub timestamp: i64,
    /// Running price-seconds at `timestamp`
    pub cumulative: u128,
}

/// Keeper-updated share price feed for one cellar
#[account]
#[derive(Debug)]
pub struct SharePriceOracle {
    pub cellar: Pubkey,
    pub keeper: Pubkey,
    pub config: OracleConfig,

    /// Latest share price in cellar asset units
    pub answer: u64,
    pub last_update: i64,

    /// Σ answer × seconds held
    pub cumulative: u128,

    /// Ring buffer of bucket starts, at most `config.observations`
    pub observations: Vec<Observation>,
    pub current_index: u8,

    pub bump: u8,
}

/// What readers get back from the feed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LatestAnswer {
    pub answer: u64,
    pub twap: u64,
    /// Answer is stale or the TWAP window has not filled
    pub not_safe: bool,
}

impl SharePriceOracle {
    pub fn new(cellar: Pubkey, keeper: Pubkey, config: OracleConfig, bump: u8) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cellar,
            keeper,
            config,
            answer: 0,
            last_update: 0,
            cumulative: 0,
            observations: Vec::new(),
            current_index: 0,
            bump,
        })
    }

    pub fn check_upkeep(&self, now: i64, share_price: u64) -> Result<bool> {
        if self.last_update == 0 {
            return Ok(true);
        }
        if now.saturating_sub(self.last_update) >= self.config.heartbeat as i64 {
            return Ok(true);
        }
        let moved = deviation_bps(share_price as u128, self.answer as u128)?;
        Ok(moved >= self.config.deviation_trigger_bps as u128)
    }

    pub fn perform_upkeep(&mut self, caller: &Pubkey, now: i64, share_price: u64) -> Result<()> {
        require_keys_eq!(*caller, self.keeper, CellarError::Unauthorized);
        require!(self.check_upkeep(now, share_price)?, CellarError::UpkeepNotNeeded);
        require!(share_price > 0, CellarError::InvalidPrice);

        self.cumulative = self.cumulative_at(now)?;

        let bucket_elapsed = self
            .observations
            .get(self.current_index as usize)
            .map(|o| now.saturating_sub(o.timestamp) >= self.config.observation_duration as i64)
            .unwrap_or(true);
        if bucket_elapsed {
            let observation = Observation {
                timestamp: now,
                cumulative: self.cumulative,
            };
            if self.observations.is_empty() {
                self.observations.push(observation);
                self.current_index = 0;
            } else {
                let next = (self.current_index as usize + 1) % self.config.observations as usize;
                if next < self.observations.len() {
                    self.observations[next] = observation;
                } else {
                    self.observations.push(observation);
                }
                self.current_index = next as u8;
            }
        }

        self.answer = share_price;
        self.last_update = now;
        Ok(())
    }

    pub fn get_latest(&self, now: i64) -> Result<LatestAnswer> {
        let stale_after = self.config.heartbeat as i64 + self.config.grace_period as i64;
        let stale = self.last_update == 0 || now.saturating_sub(self.last_update) > stale_after;
        let filled = self.observations.len() >= self.config.observations as usize;
        Ok(LatestAnswer {
            answer: self.answer,
            twap: self.twap(now)?,
            not_safe: stale || !filled,
        })
    }

    /// Time-weighted average since the oldest retained observation
    pub fn twap(&self, now: i64) -> Result<u64> {
        let oldest = if self.observations.len() < self.config.observations as usize {
            self.observations.first()
        } else {
            let index = (self.current_index as usize + 1) % self.observations.len();
            self.observations.get(index)
        };
        let Some(oldest) = oldest else {
            return Ok(self.answer);
        };
        let span = now.saturating_sub(oldest.timestamp);
        if span <= 0 {
            return Ok(self.answer);
        }
        let accumulated = self
            .cumulative_at(now)?
            .checked_sub(oldest.cumulative)
            .ok_or(CellarError::MathOverflow)?;
        u64::try_from(accumulated / span as u128).map_err(|_| error!(CellarError::MathOverflow))
    }

    fn cumulative_at(&self, now: i64) -> Result<u128> {
        if self.last_update == 0 {
            return Ok(self.cumulative);
        }
        let held = now.saturating_sub(self.last_update).max(0) as u128;
        (self.answer as u128)
            .checked_mul(held)
            .and_then(|v| v.checked_add(self.cumulative))
            .ok_or(error!(CellarError::MathOverflow))
    }
}

use anchor_lang::prelude::*;

use crate::{adaptors::AdaptorKind, state::CellarSettings};

/// Event emitted when an adaptor is trusted or revoked
#[event]
pub struct AdaptorTrustChanged {
    pub registry: Pubkey,
    pub adaptor: Pubkey,
    pub kind: AdaptorKind,
    pub version: u16,
    pub trusted: bool,
    pub timestamp: i64,
}

#[event]
pub struct PositionTrusted {
    pub registry: Pubkey,
    pub position_id: u32,
    pub adaptor: Pubkey,
    pub is_debt: bool,
    pub timestamp: i64,
}

#[event]
pub struct PositionDistrusted {
    pub registry: Pubkey,
    pub position_id: u32,
    pub timestamp: i64,
}

#[event]
pub struct CellarPauseChanged {
    pub cellar: Pubkey,
    pub paused: bool,
    pub timestamp: i64,
}

#[event]
pub struct AuthorityTransferred {
    pub account: Pubkey,
    pub previous: Pubkey,
    pub new_authority: Pubkey,
    pub timestamp: i64,
}

/// Event emitted when the price router starts pricing an asset
#[event]
pub struct AssetAdded {
    pub asset: Pubkey,
    pub price: u128,
    pub timestamp: i64,
}

#[event]
pub struct AssetRemoved {
    pub asset: Pubkey,
    pub timestamp: i64,
}

/// Event emitted when a new cellar is initialized
#[event]
pub struct CellarInitialized {
    pub cellar: Pubkey,
    pub owner: Pubkey,
    pub strategist: Pubkey,
    pub asset_mint: Pubkey,
    pub share_mint: Pubkey,
    pub holding_position: u32,
    pub timestamp: i64,
}

#[event]
pub struct CellarSettingsUpdated {
    pub cellar: Pubkey,
    pub settings: CellarSettings,
    pub timestamp: i64,
}

#[event]
pub struct StrategistChanged {
    pub cellar: Pubkey,
    pub strategist: Pubkey,
    pub timestamp: i64,
}

#[event]
pub struct ShutdownChanged {
    pub cellar: Pubkey,
    pub is_shutdown: bool,
    pub timestamp: i64,
}

#[event]
pub struct CatalogueUpdated {
    pub cellar: Pubkey,
    pub adaptor: Option<Pubkey>,
    pub position_id: Option<u32>,
    pub added: bool,
    pub timestamp: i64,
}

#[event]
pub struct PositionAdded {
    pub cellar: Pubkey,
    pub position_id: u32,
    pub index: u32,
    pub timestamp: i64,
}

#[event]
pub struct PositionRemoved {
    pub cellar: Pubkey,
    pub position_id: u32,
    pub forced: bool,
    pub timestamp: i64,
}

#[event]
pub struct PositionsSwapped {
    pub cellar: Pubkey,
    pub first: u32,
    pub second: u32,
    pub timestamp: i64,
}

#[event]
pub struct HoldingPositionChanged {
    pub cellar: Pubkey,
    pub position_id: u32,
    pub timestamp: i64,
}

/// Event emitted when assets are deposited or shares minted
#[event]
pub struct Deposited {
    pub cellar: Pubkey,
    pub user: Pubkey,
    pub receiver: Pubkey,
    pub assets: u64,
    pub shares: u64,
    pub total_shares: u64,
    pub timestamp: i64,
}

/// Event emitted when shares are burned for assets
#[event]
pub struct Withdrawn {
    pub cellar: Pubkey,
    pub owner: Pubkey,
    pub receiver: Pubkey,
    pub assets: u64,
    pub shares: u64,
    pub total_shares: u64,
    pub timestamp: i64,
}

/// Event emitted after a strategist batch commits
#[event]
pub struct Rebalanced {
    pub cellar: Pubkey,
    pub strategist: Pubkey,
    pub calls: u32,
    pub total_assets_before: u64,
    pub total_assets_after: u64,
    pub timestamp: i64,
}

#[event]
pub struct FeesAccrued {
    pub cellar: Pubkey,
    pub fee_shares: u64,
    pub high_water_mark: u64,
    pub timestamp: i64,
}

#[event]
pub struct FeesDistributed {
    pub cellar: Pubkey,
    pub strategist_shares: u64,
    pub platform_shares: u64,
    pub timestamp: i64,
}

#[event]
pub struct SharePriceUpdated {
    pub cellar: Pubkey,
    pub answer: u64,
    pub twap: u64,
    pub timestamp: i64,
}

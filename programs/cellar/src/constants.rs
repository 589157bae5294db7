// Constants for the Cellar program

/// Seed for the registry PDA
pub const REGISTRY_SEED: &[u8] = b"registry";

/// Seed for the price router PDA
pub const PRICE_ROUTER_SEED: &[u8] = b"price_router";

/// Seed for cellar state PDA
pub const CELLAR_SEED: &[u8] = b"cellar";

/// Seed for share mint PDA
pub const SHARE_MINT_SEED: &[u8] = b"shares";

/// Seed for the vault authority PDA that owns every cellar holding
pub const VAULT_AUTHORITY_SEED: &[u8] = b"vault_authority";

/// Seed for fee state PDA
pub const FEES_SEED: &[u8] = b"fees";

/// Seed for share price oracle PDA
pub const SHARE_PRICE_ORACLE_SEED: &[u8] = b"share_price_oracle";

/// Basis point denominator
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Decimals of every USD price produced by the price router
pub const PRICE_DECIMALS: u8 = 8;

/// 1.0 USD at `PRICE_DECIMALS`
pub const ONE_USD: u128 = 100_000_000;

/// Composite extensions may nest this deep before pricing is refused
pub const MAX_EXTENSION_DEPTH: u8 = 3;

/// Allowed gap between `add_asset`'s expected price and the live answer
pub const EXPECTED_PRICE_DEVIATION_BPS: u64 = 200;

/// Decimals reserves are normalized to before solving the StableSwap invariant
pub const INVARIANT_DECIMALS: u8 = 6;

/// Newton iterations allowed for the StableSwap invariant
pub const MAX_INVARIANT_ITERATIONS: usize = 255;

/// Smallest non-zero share supply. The first deposit must mint at least
/// this many shares and exits may not leave fewer behind.
pub const MIN_SHARE_SUPPLY: u64 = 1_000_000;

pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

// Registry capacity
pub const MAX_ADAPTORS: usize = 16;
pub const MAX_REGISTERED_POSITIONS: usize = 32;
pub const MAX_PAUSED_CELLARS: usize = 16;

// Price router capacity
pub const MAX_ASSETS: usize = 24;
pub const MAX_POOL_CONSTITUENTS: usize = 4;

// Cellar capacity
pub const MAX_POSITIONS: usize = 16;
pub const MAX_CATALOGUE_ENTRIES: usize = 24;
pub const MAX_ADAPTOR_DATA_LEN: usize = 160;
pub const MAX_CONFIGURATION_DATA_LEN: usize = 16;

/// Upper bound governance may set for the rebalance deviation
pub const MAX_REBALANCE_DEVIATION_BPS: u16 = 1_000;

/// Default rebalance deviation (0.5%)
pub const DEFAULT_REBALANCE_DEVIATION_BPS: u16 = 50;

/// Default maximum oracle age in seconds
pub const DEFAULT_MAX_PRICE_AGE: u32 = 60 * 60;

// Fee bounds
pub const MAX_PERFORMANCE_FEE_BPS: u16 = 3_000;
pub const MAX_MANAGEMENT_FEE_BPS: u16 = 500;

// Share price oracle bounds
pub const MAX_OBSERVATIONS: usize = 16;
pub const MIN_OBSERVATIONS: usize = 2;

/// Space for the Registry account
pub const REGISTRY_SIZE: usize = 8 // discriminator
    + 32 // authority
    + 4 + MAX_ADAPTORS * (32 + 1 + 2 + 32 + 1) // adaptors
    + 4 + MAX_REGISTERED_POSITIONS * (4 + 32 + 4 + MAX_ADAPTOR_DATA_LEN + 1 + 1) // positions
    + 4 + MAX_PAUSED_CELLARS * 32 // paused
    + 1 // bump
    + 64; // padding

/// Space for the PriceRouter account
pub const PRICE_ROUTER_SIZE: usize = 8 // discriminator
    + 32 // authority
    + 4 // default_max_age
    + 4 + MAX_ASSETS * (32 + 1 + 4 + EXTENSION_SIZE) // assets
    + 1 // bump
    + 64; // padding

/// Largest serialized `Extension` variant (StablePool)
pub const EXTENSION_SIZE: usize = 1 + 4 + MAX_POOL_CONSTITUENTS * (32 + 32) + 8;

/// Space for the Cellar account
pub const CELLAR_SIZE: usize = 8 // discriminator
    + 32 // address
    + 8 // cellar_id
    + 32 * 7 // owner, strategist, registry, price_router, asset_mint, share_mint, vault_authority
    + 1 // asset_decimals
    + 8 // total_shares
    + 4 + MAX_POSITIONS * (4 + 32 + 1 + 4 + MAX_ADAPTOR_DATA_LEN + 4 + MAX_CONFIGURATION_DATA_LEN) // positions
    + 4 + MAX_CATALOGUE_ENTRIES * 32 // adaptor_catalogue
    + 4 + MAX_CATALOGUE_ENTRIES * 4 // position_catalogue
    + 1 + 4 // holding_position
    + 1 + 8 + 8 + 2 + 1 // settings
    + 1 // is_shutdown
    + 1 // locked
    + 1 + 1 + 1 // bumps
    + 128; // padding

/// Space for FeesAndReserves
pub const FEES_SIZE: usize = 8 + 32 + (2 + 2 + 2 + 32 + 32) + 8 + 8 + 8 + 8 + 1 + 64;

/// Space for SharePriceOracle
pub const SHARE_PRICE_ORACLE_SIZE: usize = 8
    + 32 // cellar
    + 32 // keeper
    + (4 + 2 + 4 + 1 + 4) // config
    + 8 // answer
    + 8 // last_update
    + 16 // cumulative
    + 4 + MAX_OBSERVATIONS * (8 + 16) // observations
    + 1 // current_index
    + 1 // bump
    + 64;

// Cellar vaults - strategist-managed ERC-4626-style vaults on Solana
// Architecture: Registry of trusted adaptors and positions, a USD PriceRouter,
// and per-cellar position lists driven through stateless adaptors

use anchor_lang::prelude::*;

pub mod adaptors;
pub mod constants;
pub mod errors;
pub mod events;
pub mod host;
pub mod instructions;
pub mod math;
pub mod state;

use adaptors::AdaptorKind;
use instructions::*;
use state::*;

declare_id!("CeLLarVau1tsAdaptorRegistryPriceRouter111111");

#[program]
pub mod cellar {
    use super::*;

    /// Create the registry of trusted adaptors and positions
    pub fn initialize_registry(ctx: Context<InitializeRegistry>, authority: Pubkey) -> Result<()> {
        instructions::registry_admin::initialize_registry(ctx, authority)
    }

    /// Trust or revoke an adaptor implementation
    ///
    /// Security considerations:
    /// - Registry authority only
    /// - Identifiers are never reused, even after revocation
    /// - A revoked kind returns under a new address and a higher version
    pub fn trust_adaptor(
        ctx: Context<ManageRegistry>,
        address: Pubkey,
        kind: AdaptorKind,
        version: u16,
        trusted: bool,
    ) -> Result<()> {
        instructions::registry_admin::trust_adaptor(ctx, address, kind, version, trusted)
    }

    /// Register a position under a trusted adaptor
    ///
    /// Security considerations:
    /// - Position asset must already be priced by the router
    /// - (adaptor, data) pairs are unique
    pub fn trust_position(
        ctx: Context<ManageRegistry>,
        id: u32,
        adaptor: Pubkey,
        adaptor_data: Vec<u8>,
    ) -> Result<()> {
        instructions::registry_admin::trust_position(ctx, id, adaptor, adaptor_data)
    }

    /// Revoke a position; cellars holding it may then force it out
    pub fn distrust_position(ctx: Context<ManageRegistry>, id: u32) -> Result<()> {
        instructions::registry_admin::distrust_position(ctx, id)
    }

    /// Emergency pause of a cellar's deposits, withdrawals and rebalances
    pub fn set_cellar_paused(
        ctx: Context<ManageRegistry>,
        cellar: Pubkey,
        paused: bool,
    ) -> Result<()> {
        instructions::registry_admin::set_cellar_paused(ctx, cellar, paused)
    }

    pub fn transfer_registry_authority(
        ctx: Context<ManageRegistry>,
        new_authority: Pubkey,
    ) -> Result<()> {
        instructions::registry_admin::transfer_registry_authority(ctx, new_authority)
    }

    /// Create the USD price router
    pub fn initialize_price_router(
        ctx: Context<InitializePriceRouter>,
        authority: Pubkey,
        default_max_age: u32,
    ) -> Result<()> {
        instructions::price_router_admin::initialize_price_router(ctx, authority, default_max_age)
    }

    /// Start pricing an asset
    ///
    /// Security considerations:
    /// - Router authority only
    /// - The live answer must sit near `expected_price`
    /// - Remaining accounts carry the oracle and token accounts the
    ///   extension reads
    pub fn add_asset(
        ctx: Context<ManagePriceRouter>,
        settings: AssetSettings,
        expected_price: u128,
    ) -> Result<()> {
        instructions::price_router_admin::add_asset(ctx, settings, expected_price)
    }

    pub fn remove_asset(ctx: Context<ManagePriceRouter>, asset: Pubkey) -> Result<()> {
        instructions::price_router_admin::remove_asset(ctx, asset)
    }

    pub fn set_default_max_age(ctx: Context<ManagePriceRouter>, max_age: u32) -> Result<()> {
        instructions::price_router_admin::set_default_max_age(ctx, max_age)
    }

    /// Initialize a cellar over an asset with its share mint and vault accounts
    ///
    /// Security considerations:
    /// - Share mint authority is the vault authority PDA
    /// - The holding position must be trusted and denominated in the asset
    pub fn initialize_cellar(
        ctx: Context<InitializeCellar>,
        cellar_id: u64,
        strategist: Pubkey,
        settings: CellarSettings,
        holding_position: u32,
        holding_configuration: Vec<u8>,
    ) -> Result<()> {
        instructions::cellar_admin::initialize_cellar(
            ctx,
            cellar_id,
            strategist,
            settings,
            holding_position,
            holding_configuration,
        )
    }

    /// Add or remove an adaptor or position from the cellar catalogue
    pub fn update_catalogue(
        ctx: Context<GovernCellar>,
        entry: CatalogueEntry,
        add: bool,
    ) -> Result<()> {
        instructions::cellar_admin::update_catalogue(ctx, entry, add)
    }

    pub fn set_strategist(ctx: Context<GovernCellar>, strategist: Pubkey) -> Result<()> {
        instructions::cellar_admin::set_strategist(ctx, strategist)
    }

    pub fn update_settings(ctx: Context<GovernCellar>, settings: CellarSettings) -> Result<()> {
        instructions::cellar_admin::update_settings(ctx, settings)
    }

    /// Stop new deposits while leaving withdrawals open
    pub fn set_shutdown(ctx: Context<GovernCellar>, shutdown: bool) -> Result<()> {
        instructions::cellar_admin::set_shutdown(ctx, shutdown)
    }

    pub fn add_position(
        ctx: Context<ManagePositions>,
        index: u32,
        position_id: u32,
        configuration_data: Vec<u8>,
    ) -> Result<()> {
        instructions::positions::add_position(ctx, index, position_id, configuration_data)
    }

    /// Remove an empty, non-holding position
    pub fn remove_position<'info>(
        ctx: Context<'_, '_, '_, 'info, ManagePositions<'info>>,
        index: u32,
    ) -> Result<()> {
        instructions::positions::remove_position(ctx, index)
    }

    pub fn swap_positions(ctx: Context<ManagePositions>, first: u32, second: u32) -> Result<()> {
        instructions::positions::swap_positions(ctx, first, second)
    }

    pub fn set_holding_position(ctx: Context<ManagePositions>, position_id: u32) -> Result<()> {
        instructions::positions::set_holding_position(ctx, position_id)
    }

    /// Drop a position the registry has distrusted, callable by anyone
    pub fn force_position_out(ctx: Context<ManagePositions>, index: u32) -> Result<()> {
        instructions::positions::force_position_out(ctx, index)
    }

    /// Deposit assets into the cellar and receive shares
    ///
    /// Security considerations:
    /// - Shares are priced against live total assets, rounded down
    /// - The first deposit must meet the minimum initial deposit and mint at
    ///   least `MIN_SHARE_SUPPLY` shares
    /// - Pending fees are checkpointed first once fees are initialized
    /// - Follows checks-effects-interactions pattern
    pub fn deposit<'info>(
        ctx: Context<'_, '_, '_, 'info, Deposit<'info>>,
        assets: u64,
        min_shares: u64,
    ) -> Result<()> {
        instructions::deposit::deposit(ctx, assets, min_shares)
    }

    /// Mint an exact share amount, paying at most `max_assets`
    pub fn mint<'info>(
        ctx: Context<'_, '_, '_, 'info, Deposit<'info>>,
        shares: u64,
        max_assets: u64,
    ) -> Result<()> {
        instructions::deposit::mint(ctx, shares, max_assets)
    }

    /// Withdraw an exact asset amount, burning at most `max_shares`
    ///
    /// Security considerations:
    /// - Pulls only from liquid positions with trusted adaptors
    /// - Fails before moving anything when liquidity is short
    pub fn withdraw<'info>(
        ctx: Context<'_, '_, '_, 'info, Withdraw<'info>>,
        assets: u64,
        max_shares: u64,
    ) -> Result<()> {
        instructions::withdraw::withdraw(ctx, assets, max_shares)
    }

    pub fn redeem<'info>(
        ctx: Context<'_, '_, '_, 'info, Withdraw<'info>>,
        shares: u64,
        min_assets: u64,
    ) -> Result<()> {
        instructions::withdraw::redeem(ctx, shares, min_assets)
    }

    /// Run a batch of strategist calls through trusted adaptors
    ///
    /// Security considerations:
    /// - Strategist only, adaptors must be catalogued and trusted
    /// - Share supply, total asset deviation and solvency are checked after
    ///   the batch
    pub fn rebalance<'info>(
        ctx: Context<'_, '_, '_, 'info, Rebalance<'info>>,
        calls: Vec<AdaptorCall>,
        min_total_assets: Option<u64>,
    ) -> Result<()> {
        instructions::rebalance::handler(ctx, calls, min_total_assets)
    }

    pub fn initialize_fees(ctx: Context<InitializeFees>, config: FeeConfig) -> Result<()> {
        instructions::fee_collection::initialize_fees(ctx, config)
    }

    pub fn update_fee_config(ctx: Context<UpdateFeeConfig>, config: FeeConfig) -> Result<()> {
        instructions::fee_collection::update_fee_config(ctx, config)
    }

    /// Checkpoint management and performance fees as fee shares
    pub fn accrue_fees<'info>(ctx: Context<'_, '_, '_, 'info, CollectFees<'info>>) -> Result<()> {
        instructions::fee_collection::accrue_fees(ctx)
    }

    /// Pay pending fee shares to the strategist and platform
    pub fn distribute_fees<'info>(ctx: Context<'_, '_, '_, 'info, CollectFees<'info>>) -> Result<()> {
        instructions::fee_collection::distribute_fees(ctx)
    }

    pub fn initialize_share_price_oracle(
        ctx: Context<InitializeSharePriceOracle>,
        keeper: Pubkey,
        config: OracleConfig,
    ) -> Result<()> {
        instructions::oracle_upkeep::initialize_share_price_oracle(ctx, keeper, config)
    }

    /// Record the cellar share price when the heartbeat or deviation trigger fires
    pub fn perform_upkeep<'info>(ctx: Context<'_, '_, '_, 'info, PerformUpkeep<'info>>) -> Result<()> {
        instructions::oracle_upkeep::perform_upkeep(ctx)
    }
}

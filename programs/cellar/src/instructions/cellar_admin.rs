use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token::{Mint, Token, TokenAccount},
};

use crate::{constants::*, errors::*, events::*, state::*};

/// Create a cellar over `asset_mint` with its share mint and vault accounts
#[derive(Accounts)]
#[instruction(cellar_id: u64)]
pub struct InitializeCellar<'info> {
    /// Governance of the new cellar
    #[account(mut)]
    pub owner: Signer<'info>,

    #[account(
        init,
        payer = owner,
        space = CELLAR_SIZE,
        seeds = [CELLAR_SEED, asset_mint.key().as_ref(), &cellar_id.to_le_bytes()],
        bump
    )]
    pub cellar: Account<'info, Cellar>,

    #[account(
        seeds = [REGISTRY_SEED],
        bump = registry.bump,
    )]
    pub registry: Account<'info, Registry>,

    #[account(
        seeds = [PRICE_ROUTER_SEED],
        bump = price_router.bump,
    )]
    pub price_router: Account<'info, PriceRouter>,

    pub asset_mint: Account<'info, Mint>,

    /// Share mint PDA, decimals follow the asset
    #[account(
        init,
        payer = owner,
        seeds = [SHARE_MINT_SEED, cellar.key().as_ref()],
        bump,
        mint::decimals = asset_mint.decimals,
        mint::authority = vault_authority,
    )]
    pub share_mint: Account<'info, Mint>,

    /// CHECK: PDA that owns every cellar holding, validated by seeds
    #[account(
        seeds = [VAULT_AUTHORITY_SEED, cellar.key().as_ref()],
        bump,
    )]
    pub vault_authority: UncheckedAccount<'info>,

    /// Idle asset account backing the token holding position
    #[account(
        init,
        payer = owner,
        associated_token::mint = asset_mint,
        associated_token::authority = vault_authority,
    )]
    pub vault_asset_account: Account<'info, TokenAccount>,

    /// Pot fee shares are minted into before distribution
    #[account(
        init,
        payer = owner,
        associated_token::mint = share_mint,
        associated_token::authority = vault_authority,
    )]
    pub vault_share_account: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
    pub associated_token_program: Program<'info, AssociatedToken>,
    pub system_program: Program<'info, System>,
}

/// Owner-only cellar configuration
#[derive(Accounts)]
pub struct GovernCellar<'info> {
    pub owner: Signer<'info>,

    #[account(
        mut,
        seeds = [CELLAR_SEED, cellar.asset_mint.as_ref(), &cellar.cellar_id.to_le_bytes()],
        bump = cellar.bump,
        has_one = owner @ CellarError::Unauthorized,
    )]
    pub cellar: Account<'info, Cellar>,

    #[account(address = cellar.registry)]
    pub registry: Account<'info, Registry>,

    #[account(address = cellar.price_router)]
    pub price_router: Account<'info, PriceRouter>,
}

pub fn initialize_cellar(
    ctx: Context<InitializeCellar>,
    cellar_id: u64,
    strategist: Pubkey,
    settings: CellarSettings,
    holding_position: u32,
    holding_configuration: Vec<u8>,
) -> Result<()> {
    let accounts = &mut *ctx.accounts;
    let keys = CellarKeys {
        address: accounts.cellar.key(),
        owner: accounts.owner.key(),
        strategist,
        registry: accounts.registry.key(),
        price_router: accounts.price_router.key(),
        asset_mint: accounts.asset_mint.key(),
        share_mint: accounts.share_mint.key(),
        vault_authority: accounts.vault_authority.key(),
    };
    let mut cellar = Cellar::new(cellar_id, keys, accounts.asset_mint.decimals, settings)?;
    cellar.bump = ctx.bumps.cellar;
    cellar.authority_bump = ctx.bumps.vault_authority;
    cellar.share_bump = ctx.bumps.share_mint;

    let env = CellarEnv {
        registry: &accounts.registry,
        price_router: &accounts.price_router,
    };
    cellar.install_holding_position(&env, holding_position, holding_configuration)?;
    accounts.cellar.set_inner(cellar);

    emit!(CellarInitialized {
        cellar: keys.address,
        owner: keys.owner,
        strategist,
        asset_mint: keys.asset_mint,
        share_mint: keys.share_mint,
        holding_position,
        timestamp: Clock::get()?.unix_timestamp,
    });
    Ok(())
}

pub fn update_catalogue(ctx: Context<GovernCellar>, entry: CatalogueEntry, add: bool) -> Result<()> {
    let owner = ctx.accounts.owner.key();
    let accounts = &mut *ctx.accounts;
    let env = CellarEnv {
        registry: &accounts.registry,
        price_router: &accounts.price_router,
    };
    accounts.cellar.update_catalogue(&owner, &env, entry, add)?;

    let (adaptor, position_id) = match entry {
        CatalogueEntry::Adaptor(address) => (Some(address), None),
        CatalogueEntry::Position(id) => (None, Some(id)),
    };
    emit!(CatalogueUpdated {
        cellar: accounts.cellar.key(),
        adaptor,
        position_id,
        added: add,
        timestamp: Clock::get()?.unix_timestamp,
    });
    Ok(())
}

pub fn set_strategist(ctx: Context<GovernCellar>, strategist: Pubkey) -> Result<()> {
    let owner = ctx.accounts.owner.key();
    ctx.accounts.cellar.set_strategist(&owner, strategist)?;

    emit!(StrategistChanged {
        cellar: ctx.accounts.cellar.key(),
        strategist,
        timestamp: Clock::get()?.unix_timestamp,
    });
    Ok(())
}

pub fn update_settings(ctx: Context<GovernCellar>, settings: CellarSettings) -> Result<()> {
    let owner = ctx.accounts.owner.key();
    ctx.accounts.cellar.update_settings(&owner, settings)?;

    emit!(CellarSettingsUpdated {
        cellar: ctx.accounts.cellar.key(),
        settings,
        timestamp: Clock::get()?.unix_timestamp,
    });
    Ok(())
}

pub fn set_shutdown(ctx: Context<GovernCellar>, shutdown: bool) -> Result<()> {
    let owner = ctx.accounts.owner.key();
    ctx.accounts.cellar.set_shutdown(&owner, shutdown)?;

    emit!(ShutdownChanged {
        cellar: ctx.accounts.cellar.key(),
        is_shutdown: shutdown,
        timestamp: Clock::get()?.unix_timestamp,
    });
    Ok(())
}

use anchor_lang::prelude::*;

use crate::{adaptors::AdaptorKind, constants::*, errors::*, events::*, state::*};

/// Create the deployment-wide registry
#[derive(Accounts)]
pub struct InitializeRegistry<'info> {
    #[account(mut)]
    pub payer: Signer<'info>,

    #[account(
        init,
        payer = payer,
        space = REGISTRY_SIZE,
        seeds = [REGISTRY_SEED],
        bump
    )]
    pub registry: Account<'info, Registry>,

    pub system_program: Program<'info, System>,
}

/// Governance mutation of the registry
#[derive(Accounts)]
pub struct ManageRegistry<'info> {
    pub authority: Signer<'info>,

    #[account(
        mut,
        seeds = [REGISTRY_SEED],
        bump = registry.bump,
        has_one = authority @ CellarError::Unauthorized,
    )]
    pub registry: Account<'info, Registry>,

    /// Position assets must be priced before they can be trusted
    #[account(
        seeds = [PRICE_ROUTER_SEED],
        bump = price_router.bump,
    )]
    pub price_router: Account<'info, PriceRouter>,
}

pub fn initialize_registry(ctx: Context<InitializeRegistry>, authority: Pubkey) -> Result<()> {
    let bump = ctx.bumps.registry;
    ctx.accounts.registry.set_inner(Registry::new(authority, bump));
    msg!("Registry initialized with authority {}", authority);
    Ok(())
}

pub fn trust_adaptor(
    ctx: Context<ManageRegistry>,
    address: Pubkey,
    kind: AdaptorKind,
    version: u16,
    trusted: bool,
) -> Result<()> {
    let authority = ctx.accounts.authority.key();
    ctx.accounts
        .registry
        .trust_adaptor(&authority, address, kind, version, trusted)?;

    emit!(AdaptorTrustChanged {
        registry: ctx.accounts.registry.key(),
        adaptor: address,
        kind,
        version,
        trusted,
        timestamp: Clock::get()?.unix_timestamp,
    });
    Ok(())
}

pub fn trust_position(
    ctx: Context<ManageRegistry>,
    id: u32,
    adaptor: Pubkey,
    adaptor_data: Vec<u8>,
) -> Result<()> {
    let authority = ctx.accounts.authority.key();
    let accounts = &mut *ctx.accounts;
    let is_debt = accounts
        .registry
        .trust_position(&authority, id, adaptor, adaptor_data, &accounts.price_router)?
        .is_debt;

    emit!(PositionTrusted {
        registry: accounts.registry.key(),
        position_id: id,
        adaptor,
        is_debt,
        timestamp: Clock::get()?.unix_timestamp,
    });
    Ok(())
}

pub fn distrust_position(ctx: Context<ManageRegistry>, id: u32) -> Result<()> {
    let authority = ctx.accounts.authority.key();
    ctx.accounts.registry.distrust_position(&authority, id)?;

    emit!(PositionDistrusted {
        registry: ctx.accounts.registry.key(),
        position_id: id,
        timestamp: Clock::get()?.unix_timestamp,
    });
    Ok(())
}

pub fn set_cellar_paused(ctx: Context<ManageRegistry>, cellar: Pubkey, paused: bool) -> Result<()> {
    let authority = ctx.accounts.authority.key();
    ctx.accounts.registry.set_paused(&authority, cellar, paused)?;

    emit!(CellarPauseChanged {
        cellar,
        paused,
        timestamp: Clock::get()?.unix_timestamp,
    });
    Ok(())
}

pub fn transfer_registry_authority(
    ctx: Context<ManageRegistry>,
    new_authority: Pubkey,
) -> Result<()> {
    let authority = ctx.accounts.authority.key();
    ctx.accounts
        .registry
        .transfer_authority(&authority, new_authority)?;

    emit!(AuthorityTransferred {
        account: ctx.accounts.registry.key(),
        previous: authority,
        new_authority,
        timestamp: Clock::get()?.unix_timestamp,
    });
    Ok(())
}

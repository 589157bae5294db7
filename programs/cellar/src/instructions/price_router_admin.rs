use anchor_lang::prelude::*;

use crate::{constants::*, errors::*, events::*, host::AccountReader, state::*};

#[derive(Accounts)]
pub struct InitializePriceRouter<'info> {
    #[account(mut)]
    pub payer: Signer<'info>,

    #[account(
        init,
        payer = payer,
        space = PRICE_ROUTER_SIZE,
        seeds = [PRICE_ROUTER_SEED],
        bump
    )]
    pub price_router: Account<'info, PriceRouter>,

    pub system_program: Program<'info, System>,
}

/// Governance mutation of the price router.
///
/// `add_asset` reads oracles and pool accounts from the remaining accounts.
#[derive(Accounts)]
pub struct ManagePriceRouter<'info> {
    pub authority: Signer<'info>,

    #[account(
        mut,
        seeds = [PRICE_ROUTER_SEED],
        bump = price_router.bump,
        has_one = authority @ CellarError::Unauthorized,
    )]
    pub price_router: Account<'info, PriceRouter>,
}

pub fn initialize_price_router(
    ctx: Context<InitializePriceRouter>,
    authority: Pubkey,
    default_max_age: u32,
) -> Result<()> {
    require!(default_max_age > 0, CellarError::InvalidExtension);
    let bump = ctx.bumps.price_router;
    ctx.accounts
        .price_router
        .set_inner(PriceRouter::new(authority, default_max_age, bump));
    Ok(())
}

pub fn add_asset(
    ctx: Context<ManagePriceRouter>,
    settings: AssetSettings,
    expected_price: u128,
) -> Result<()> {
    let authority = ctx.accounts.authority.key();
    let asset = settings.asset;
    let source = AccountReader::new(ctx.remaining_accounts.to_vec())?;
    let price = ctx
        .accounts
        .price_router
        .add_asset(&authority, settings, expected_price, &source)?;

    emit!(AssetAdded {
        asset,
        price,
        timestamp: source.now(),
    });
    Ok(())
}

pub fn remove_asset(ctx: Context<ManagePriceRouter>, asset: Pubkey) -> Result<()> {
    let authority = ctx.accounts.authority.key();
    ctx.accounts.price_router.remove_asset(&authority, &asset)?;

    emit!(AssetRemoved {
        asset,
        timestamp: Clock::get()?.unix_timestamp,
    });
    Ok(())
}

pub fn set_default_max_age(ctx: Context<ManagePriceRouter>, max_age: u32) -> Result<()> {
    let authority = ctx.accounts.authority.key();
    ctx.accounts
        .price_router
        .set_default_max_age(&authority, max_age)?;
    msg!("Default max price age set to {}s", max_age);
    Ok(())
}

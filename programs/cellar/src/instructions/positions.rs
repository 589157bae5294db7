use anchor_lang::prelude::*;
use anchor_spl::token::Token;

use crate::{constants::*, events::*, host::CpiHost, state::*};

/// Strategist position management.
///
/// `force_position_out` is open to any signer once the registry has
/// distrusted the position. Remaining accounts carry the token accounts
/// `remove_position` reads balances from.
#[derive(Accounts)]
pub struct ManagePositions<'info> {
    pub caller: Signer<'info>,

    #[account(
        mut,
        seeds = [CELLAR_SEED, cellar.asset_mint.as_ref(), &cellar.cellar_id.to_le_bytes()],
        bump = cellar.bump,
    )]
    pub cellar: Account<'info, Cellar>,

    #[account(address = cellar.registry)]
    pub registry: Account<'info, Registry>,

    #[account(address = cellar.price_router)]
    pub price_router: Account<'info, PriceRouter>,

    /// CHECK: PDA used as authority, validated by seeds
    #[account(
        seeds = [VAULT_AUTHORITY_SEED, cellar.key().as_ref()],
        bump = cellar.authority_bump,
    )]
    pub vault_authority: UncheckedAccount<'info>,

    pub token_program: Program<'info, Token>,
}

pub fn add_position(
    ctx: Context<ManagePositions>,
    index: u32,
    position_id: u32,
    configuration_data: Vec<u8>,
) -> Result<()> {
    let caller = ctx.accounts.caller.key();
    let accounts = &mut *ctx.accounts;
    let env = CellarEnv {
        registry: &accounts.registry,
        price_router: &accounts.price_router,
    };
    accounts
        .cellar
        .add_position(&caller, &env, index as usize, position_id, configuration_data)?;

    emit!(PositionAdded {
        cellar: accounts.cellar.key(),
        position_id,
        index,
        timestamp: Clock::get()?.unix_timestamp,
    });
    Ok(())
}

pub fn remove_position<'info>(
    ctx: Context<'_, '_, '_, 'info, ManagePositions<'info>>,
    index: u32,
) -> Result<()> {
    let caller = ctx.accounts.caller.key();
    let cellar_key = ctx.accounts.cellar.key();
    let authority_bump = [ctx.accounts.cellar.authority_bump];
    let signer_seeds: &[&[u8]] = &[VAULT_AUTHORITY_SEED, cellar_key.as_ref(), &authority_bump];

    let accounts = &mut *ctx.accounts;
    let host = CpiHost::new(
        accounts.token_program.to_account_info(),
        accounts.vault_authority.to_account_info(),
        signer_seeds,
        ctx.remaining_accounts.to_vec(),
    )?;
    let env = CellarEnv {
        registry: &accounts.registry,
        price_router: &accounts.price_router,
    };
    let position_id = accounts
        .cellar
        .remove_position(&caller, &env, &host, index as usize)?;

    emit!(PositionRemoved {
        cellar: cellar_key,
        position_id,
        forced: false,
        timestamp: host.now(),
    });
    Ok(())
}

pub fn swap_positions(ctx: Context<ManagePositions>, first: u32, second: u32) -> Result<()> {
    let caller = ctx.accounts.caller.key();
    ctx.accounts
        .cellar
        .swap_positions(&caller, first as usize, second as usize)?;

    emit!(PositionsSwapped {
        cellar: ctx.accounts.cellar.key(),
        first,
        second,
        timestamp: Clock::get()?.unix_timestamp,
    });
    Ok(())
}

pub fn set_holding_position(ctx: Context<ManagePositions>, position_id: u32) -> Result<()> {
    let caller = ctx.accounts.caller.key();
    let accounts = &mut *ctx.accounts;
    let env = CellarEnv {
        registry: &accounts.registry,
        price_router: &accounts.price_router,
    };
    accounts
        .cellar
        .set_holding_position(&caller, &env, position_id)?;

    emit!(HoldingPositionChanged {
        cellar: accounts.cellar.key(),
        position_id,
        timestamp: Clock::get()?.unix_timestamp,
    });
    Ok(())
}

pub fn force_position_out(ctx: Context<ManagePositions>, index: u32) -> Result<()> {
    let accounts = &mut *ctx.accounts;
    let env = CellarEnv {
        registry: &accounts.registry,
        price_router: &accounts.price_router,
    };
    let position_id = accounts.cellar.force_position_out(&env, index as usize)?;

    emit!(PositionRemoved {
        cellar: accounts.cellar.key(),
        position_id,
        forced: true,
        timestamp: Clock::get()?.unix_timestamp,
    });
    Ok(())
}

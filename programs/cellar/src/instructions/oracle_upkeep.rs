use anchor_lang::prelude::*;
use anchor_spl::token::Token;

use crate::{constants::*, errors::*, events::*, host::CpiHost, state::*};

#[derive(Accounts)]
pub struct InitializeSharePriceOracle<'info> {
    #[account(mut)]
    pub owner: Signer<'info>,

    #[account(
        seeds = [CELLAR_SEED, cellar.asset_mint.as_ref(), &cellar.cellar_id.to_le_bytes()],
        bump = cellar.bump,
        has_one = owner @ CellarError::Unauthorized,
    )]
    pub cellar: Account<'info, Cellar>,

    #[account(
        init,
        payer = owner,
        space = SHARE_PRICE_ORACLE_SIZE,
        seeds = [SHARE_PRICE_ORACLE_SEED, cellar.key().as_ref()],
        bump
    )]
    pub oracle: Account<'info, SharePriceOracle>,

    pub system_program: Program<'info, System>,
}

/// Keeper update of the share price feed.
///
/// Remaining accounts: every account position valuation reads.
#[derive(Accounts)]
pub struct PerformUpkeep<'info> {
    pub keeper: Signer<'info>,

    #[account(
        seeds = [CELLAR_SEED, cellar.asset_mint.as_ref(), &cellar.cellar_id.to_le_bytes()],
        bump = cellar.bump,
    )]
    pub cellar: Account<'info, Cellar>,

    #[account(address = cellar.registry)]
    pub registry: Account<'info, Registry>,

    #[account(address = cellar.price_router)]
    pub price_router: Account<'info, PriceRouter>,

    #[account(
        mut,
        seeds = [SHARE_PRICE_ORACLE_SEED, cellar.key().as_ref()],
        bump = oracle.bump,
    )]
    pub oracle: Account<'info, SharePriceOracle>,

    /// CHECK: PDA holding the cellar positions, validated by seeds
    #[account(
        seeds = [VAULT_AUTHORITY_SEED, cellar.key().as_ref()],
        bump = cellar.authority_bump,
    )]
    pub vault_authority: UncheckedAccount<'info>,

    pub token_program: Program<'info, Token>,
}

pub fn initialize_share_price_oracle(
    ctx: Context<InitializeSharePriceOracle>,
    keeper: Pubkey,
    config: OracleConfig,
) -> Result<()> {
    let oracle = SharePriceOracle::new(ctx.accounts.cellar.key(), keeper, config, ctx.bumps.oracle)?;
    ctx.accounts.oracle.set_inner(oracle);
    Ok(())
}

pub fn perform_upkeep<'info>(ctx: Context<'_, '_, '_, 'info, PerformUpkeep<'info>>) -> Result<()> {
    let keeper = ctx.accounts.keeper.key();
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

    let now = host.now();
    let share_price = accounts.cellar.share_price(&env, &host)?;
    accounts.oracle.perform_upkeep(&keeper, now, share_price)?;

    emit!(SharePriceUpdated {
        cellar: cellar_key,
        answer: share_price,
        twap: accounts.oracle.twap(now)?,
        timestamp: now,
    });
    Ok(())
}

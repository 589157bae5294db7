use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token};

use crate::{
    constants::*, events::*, host::CpiHost, instructions::fee_collection::checkpoint_fees,
    state::*,
};

/// Deposit into a cellar, or mint an exact share amount.
///
/// Remaining accounts: the user's asset and share token accounts, the
/// vault's token accounts, and every account position valuation reads. The
/// vault's share account is needed whenever the fee checkpoint mints.
#[derive(Accounts)]
pub struct Deposit<'info> {
    #[account(mut)]
    pub user: Signer<'info>,

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

    #[account(
        mut,
        address = cellar.share_mint,
    )]
    pub share_mint: Account<'info, Mint>,

    /// CHECK: fee state PDA, checkpointed before the flow once initialized
    #[account(
        mut,
        seeds = [FEES_SEED, cellar.key().as_ref()],
        bump,
    )]
    pub fees: UncheckedAccount<'info>,

    pub token_program: Program<'info, Token>,
}

pub fn deposit<'info>(
    ctx: Context<'_, '_, '_, 'info, Deposit<'info>>,
    assets: u64,
    min_shares: u64,
) -> Result<()> {
    enter(ctx, |cellar, env, host, user| {
        let shares = cellar.deposit(env, host, user, user, assets, min_shares)?;
        Ok((assets, shares))
    })
}

pub fn mint<'info>(
    ctx: Context<'_, '_, '_, 'info, Deposit<'info>>,
    shares: u64,
    max_assets: u64,
) -> Result<()> {
    enter(ctx, |cellar, env, host, user| {
        let assets = cellar.mint(env, host, user, user, shares, max_assets)?;
        Ok((assets, shares))
    })
}

fn enter<'info>(
    ctx: Context<'_, '_, '_, 'info, Deposit<'info>>,
    op: impl FnOnce(&mut Cellar, &CellarEnv, &mut CpiHost<'_, 'info>, &Pubkey) -> Result<(u64, u64)>,
) -> Result<()> {
    let user = ctx.accounts.user.key();
    let cellar_key = ctx.accounts.cellar.key();
    let authority_bump = [ctx.accounts.cellar.authority_bump];
    let signer_seeds: &[&[u8]] = &[VAULT_AUTHORITY_SEED, cellar_key.as_ref(), &authority_bump];

    let accounts = &mut *ctx.accounts;
    let mut host_accounts = ctx.remaining_accounts.to_vec();
    host_accounts.push(accounts.share_mint.to_account_info());
    let mut host = CpiHost::new(
        accounts.token_program.to_account_info(),
        accounts.vault_authority.to_account_info(),
        signer_seeds,
        host_accounts,
    )?
    .with_user(accounts.user.to_account_info());
    let env = CellarEnv {
        registry: &accounts.registry,
        price_router: &accounts.price_router,
    };

    checkpoint_fees(&accounts.fees.to_account_info(), &mut accounts.cellar, &env, &mut host)?;
    let (assets, shares) = op(&mut accounts.cellar, &env, &mut host, &user)?;

    emit!(Deposited {
        cellar: cellar_key,
        user,
        receiver: user,
        assets,
        shares,
        total_shares: accounts.cellar.total_shares,
        timestamp: host.now(),
    });
    Ok(())
}

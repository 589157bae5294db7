use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token};

use crate::{constants::*, events::*, host::CpiHost, state::*};

/// Strategist batch over trusted adaptors.
///
/// Remaining accounts: every token account, mint, oracle and market account
/// the batch and the post-batch valuation touch, plus the market programs.
#[derive(Accounts)]
pub struct Rebalance<'info> {
    pub strategist: Signer<'info>,

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

    /// Read to prove the batch left share supply untouched
    #[account(address = cellar.share_mint)]
    pub share_mint: Account<'info, Mint>,

    pub token_program: Program<'info, Token>,
}

pub fn handler<'info>(
    ctx: Context<'_, '_, '_, 'info, Rebalance<'info>>,
    calls: Vec<AdaptorCall>,
    min_total_assets: Option<u64>,
) -> Result<()> {
    let strategist = ctx.accounts.strategist.key();
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
    )?;
    let env = CellarEnv {
        registry: &accounts.registry,
        price_router: &accounts.price_router,
    };

    let outcome = accounts
        .cellar
        .rebalance(&strategist, &env, &mut host, &calls, min_total_assets)?;

    emit!(Rebalanced {
        cellar: cellar_key,
        strategist,
        calls: calls.len() as u32,
        total_assets_before: outcome.total_assets_before,
        total_assets_after: outcome.total_assets_after,
        timestamp: host.now(),
    });
    Ok(())
}

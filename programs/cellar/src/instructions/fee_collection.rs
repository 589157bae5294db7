use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token};

use crate::{constants::*, errors::*, events::*, host::CpiHost, state::*};

#[derive(Accounts)]
pub struct InitializeFees<'info> {
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
        space = FEES_SIZE,
        seeds = [FEES_SEED, cellar.key().as_ref()],
        bump
    )]
    pub fees: Account<'info, FeesAndReserves>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct UpdateFeeConfig<'info> {
    pub owner: Signer<'info>,

    #[account(
        seeds = [CELLAR_SEED, cellar.asset_mint.as_ref(), &cellar.cellar_id.to_le_bytes()],
        bump = cellar.bump,
        has_one = owner @ CellarError::Unauthorized,
    )]
    pub cellar: Account<'info, Cellar>,

    #[account(
        mut,
        seeds = [FEES_SEED, cellar.key().as_ref()],
        bump = fees.bump,
    )]
    pub fees: Account<'info, FeesAndReserves>,
}

/// Permissionless fee checkpoint and payout.
///
/// Remaining accounts: the vault's token accounts, the share accounts of
/// both payout recipients, and every account position valuation reads.
#[derive(Accounts)]
pub struct CollectFees<'info> {
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

    #[account(
        mut,
        seeds = [FEES_SEED, cellar.key().as_ref()],
        bump = fees.bump,
    )]
    pub fees: Account<'info, FeesAndReserves>,

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

    pub token_program: Program<'info, Token>,
}

pub fn initialize_fees(ctx: Context<InitializeFees>, config: FeeConfig) -> Result<()> {
    let fees = FeesAndReserves::new(ctx.accounts.cellar.key(), config, ctx.bumps.fees)?;
    ctx.accounts.fees.set_inner(fees);
    msg!("Fees initialized for cellar {}", ctx.accounts.cellar.key());
    Ok(())
}

pub fn update_fee_config(ctx: Context<UpdateFeeConfig>, config: FeeConfig) -> Result<()> {
    ctx.accounts.fees.update_config(config)
}

pub fn accrue_fees<'info>(ctx: Context<'_, '_, '_, 'info, CollectFees<'info>>) -> Result<()> {
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

    let fee_shares = accounts
        .cellar
        .accrue_fees(&env, &mut host, &mut accounts.fees)?;

    emit!(FeesAccrued {
        cellar: cellar_key,
        fee_shares,
        high_water_mark: accounts.fees.high_water_mark,
        timestamp: host.now(),
    });
    Ok(())
}

pub fn distribute_fees<'info>(ctx: Context<'_, '_, '_, 'info, CollectFees<'info>>) -> Result<()> {
    let cellar_key = ctx.accounts.cellar.key();
    let authority_bump = [ctx.accounts.cellar.authority_bump];
    let signer_seeds: &[&[u8]] = &[VAULT_AUTHORITY_SEED, cellar_key.as_ref(), &authority_bump];

    let accounts = &mut *ctx.accounts;
    let mut host = CpiHost::new(
        accounts.token_program.to_account_info(),
        accounts.vault_authority.to_account_info(),
        signer_seeds,
        ctx.remaining_accounts.to_vec(),
    )?;

    let distribution = accounts
        .cellar
        .distribute_fees(&mut host, &mut accounts.fees)?;

    emit!(FeesDistributed {
        cellar: cellar_key,
        strategist_shares: distribution.strategist_shares,
        platform_shares: distribution.platform_shares,
        timestamp: host.now(),
    });
    Ok(())
}

/// Accrue fees ahead of a user flow once the cellar's fee account exists,
/// so shares entering or leaving are priced against post-fee supply.
pub(crate) fn checkpoint_fees<'info>(
    fees: &AccountInfo<'info>,
    cellar: &mut Cellar,
    env: &CellarEnv,
    host: &mut CpiHost<'_, 'info>,
) -> Result<()> {
    if *fees.owner != crate::ID || fees.data_is_empty() {
        return Ok(());
    }
    let mut state = {
        let data = fees.try_borrow_data()?;
        FeesAndReserves::try_deserialize(&mut &data[..])?
    };
    let fee_shares = cellar.accrue_fees(env, host, &mut state)?;
    {
        let mut data = fees.try_borrow_mut_data()?;
        state.try_serialize(&mut &mut data[..])?;
    }

    if fee_shares > 0 {
        emit!(FeesAccrued {
            cellar: cellar.address,
            fee_shares,
            high_water_mark: state.high_water_mark,
            timestamp: host.now(),
        });
    }
    Ok(())
}

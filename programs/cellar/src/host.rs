//! On-chain binding of the engine's collaborator traits.
//!
//! Every account an operation touches arrives through the instruction's
//! remaining accounts. The token account of an (owner, mint) pair is always
//! its associated token account, so an adaptor never needs to know account
//! addresses and a caller cannot substitute another account for it.

use anchor_lang::{
    prelude::*,
    solana_program::{
        hash::hash,
        instruction::{AccountMeta, Instruction},
        program::invoke_signed,
    },
};
use anchor_spl::{
    associated_token::get_associated_token_address,
    token::{self, Approve, Burn, Mint, MintTo, Revoke, TokenAccount, Transfer},
};
use pyth_solana_receiver_sdk::price_update::{PriceUpdateV2, VerificationLevel};

use crate::{
    adaptors::{MarketCall, ProtocolHost},
    errors::CellarError,
    state::price_router::{OracleQuote, PriceSource},
};

/// Read-only view over an instruction's accounts
pub struct AccountReader<'info> {
    accounts: Vec<AccountInfo<'info>>,
    now: i64,
}

impl<'info> AccountReader<'info> {
    pub fn new(accounts: Vec<AccountInfo<'info>>) -> Result<Self> {
        Ok(Self {
            accounts,
            now: Clock::get()?.unix_timestamp,
        })
    }

    fn find(&self, key: &Pubkey) -> Result<AccountInfo<'info>> {
        self.accounts
            .iter()
            .find(|info| info.key == key)
            .cloned()
            .ok_or(error!(CellarError::MissingAccount))
    }

    fn token_account(&self, owner: &Pubkey, mint: &Pubkey) -> Result<(AccountInfo<'info>, u64)> {
        let address = get_associated_token_address(owner, mint);
        let info = self.find(&address).map_err(|err| {
            msg!("No {} token account for owner {}", mint, owner);
            err
        })?;
        require_keys_eq!(*info.owner, token::ID, CellarError::InvalidTokenAccount);
        let account = {
            let data = info.try_borrow_data()?;
            TokenAccount::try_deserialize(&mut &data[..])?
        };
        require!(
            account.owner == *owner && account.mint == *mint,
            CellarError::InvalidTokenAccount
        );
        Ok((info, account.amount))
    }
}

impl PriceSource for AccountReader<'_> {
    fn now(&self) -> i64 {
        self.now
    }

    fn oracle_quote(&self, oracle: &Pubkey) -> Result<OracleQuote> {
        let info = self.find(oracle)?;
        require_keys_eq!(*info.owner, PriceUpdateV2::owner(), CellarError::InvalidPrice);
        let data = info.try_borrow_data()?;
        let update = PriceUpdateV2::try_deserialize(&mut &data[..])?;
        require!(
            matches!(update.verification_level, VerificationLevel::Full),
            CellarError::InvalidPrice
        );
        let message = update.price_message;
        Ok(OracleQuote {
            feed_id: message.feed_id,
            price: message.price,
            conf: message.conf,
            exponent: message.exponent,
            publish_time: message.publish_time,
        })
    }

    fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64> {
        self.token_account(owner, mint).map(|(_, amount)| amount)
    }

    fn mint_supply(&self, mint: &Pubkey) -> Result<u64> {
        let info = self.find(mint)?;
        require_keys_eq!(*info.owner, token::ID, CellarError::MissingAccount);
        let data = info.try_borrow_data()?;
        Ok(Mint::try_deserialize(&mut &data[..])?.supply)
    }
}

/// Value-moving host: SPL token CPI signed by the vault authority PDA
pub struct CpiHost<'a, 'info> {
    reader: AccountReader<'info>,
    token_program: AccountInfo<'info>,
    vault_authority: AccountInfo<'info>,
    signer_seeds: &'a [&'a [u8]],
    /// External signer allowed to move its own tokens and shares
    user: Option<AccountInfo<'info>>,
}

impl<'a, 'info> CpiHost<'a, 'info> {
    pub fn new(
        token_program: AccountInfo<'info>,
        vault_authority: AccountInfo<'info>,
        signer_seeds: &'a [&'a [u8]],
        accounts: Vec<AccountInfo<'info>>,
    ) -> Result<Self> {
        Ok(Self {
            reader: AccountReader::new(accounts)?,
            token_program,
            vault_authority,
            signer_seeds,
            user: None,
        })
    }

    pub fn with_user(mut self, user: AccountInfo<'info>) -> Self {
        self.user = Some(user);
        self
    }

    fn find(&self, key: &Pubkey) -> Result<AccountInfo<'info>> {
        if self.is_vault(key) {
            return Ok(self.vault_authority.clone());
        }
        self.reader.find(key)
    }

    fn token_account(&self, owner: &Pubkey, mint: &Pubkey) -> Result<(AccountInfo<'info>, u64)> {
        self.reader.token_account(owner, mint)
    }

    fn is_vault(&self, key: &Pubkey) -> bool {
        key == self.vault_authority.key
    }

    /// Signing authority for tokens owned by `owner`
    fn authority(&self, owner: &Pubkey) -> Result<AccountInfo<'info>> {
        if self.is_vault(owner) {
            return Ok(self.vault_authority.clone());
        }
        self.user
            .as_ref()
            .filter(|user| user.key == owner && user.is_signer)
            .cloned()
            .ok_or(error!(CellarError::Unauthorized))
    }

    fn signer(&self) -> [&'a [&'a [u8]]; 1] {
        [self.signer_seeds]
    }
}

impl PriceSource for CpiHost<'_, '_> {
    fn now(&self) -> i64 {
        self.reader.now()
    }

    fn oracle_quote(&self, oracle: &Pubkey) -> Result<OracleQuote> {
        self.reader.oracle_quote(oracle)
    }

    fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64> {
        self.reader.token_balance(owner, mint)
    }

    fn mint_supply(&self, mint: &Pubkey) -> Result<u64> {
        self.reader.mint_supply(mint)
    }
}

impl ProtocolHost for CpiHost<'_, '_> {
    fn transfer(&mut self, mint: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        let (source, _) = self.token_account(from, mint)?;
        let (destination, _) = self.token_account(to, mint)?;
        let accounts = Transfer {
            from: source,
            to: destination,
            authority: self.authority(from)?,
        };
        let signer = self.signer();
        let ctx = CpiContext::new(self.token_program.clone(), accounts);
        if self.is_vault(from) {
            token::transfer(ctx.with_signer(&signer), amount)
        } else {
            token::transfer(ctx, amount)
        }
    }

    fn approve(
        &mut self,
        mint: &Pubkey,
        owner: &Pubkey,
        delegate: &Pubkey,
        amount: u64,
    ) -> Result<()> {
        require!(self.is_vault(owner), CellarError::Unauthorized);
        let (source, _) = self.token_account(owner, mint)?;
        let signer = self.signer();
        let ctx = CpiContext::new_with_signer(
            self.token_program.clone(),
            Approve {
                to: source,
                delegate: self.find(delegate)?,
                authority: self.vault_authority.clone(),
            },
            &signer,
        );
        token::approve(ctx, amount)
    }

    fn revoke(&mut self, mint: &Pubkey, owner: &Pubkey) -> Result<()> {
        require!(self.is_vault(owner), CellarError::Unauthorized);
        let (source, _) = self.token_account(owner, mint)?;
        let signer = self.signer();
        let ctx = CpiContext::new_with_signer(
            self.token_program.clone(),
            Revoke {
                source,
                authority: self.vault_authority.clone(),
            },
            &signer,
        );
        token::revoke(ctx)
    }

    fn mint_to(&mut self, mint: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        let (destination, _) = self.token_account(to, mint)?;
        let signer = self.signer();
        let ctx = CpiContext::new_with_signer(
            self.token_program.clone(),
            MintTo {
                mint: self.find(mint)?,
                to: destination,
                authority: self.vault_authority.clone(),
            },
            &signer,
        );
        token::mint_to(ctx, amount)
    }

    fn burn(&mut self, mint: &Pubkey, from: &Pubkey, amount: u64) -> Result<()> {
        let (source, _) = self.token_account(from, mint)?;
        let accounts = Burn {
            mint: self.find(mint)?,
            from: source,
            authority: self.authority(from)?,
        };
        let signer = self.signer();
        let ctx = CpiContext::new(self.token_program.clone(), accounts);
        if self.is_vault(from) {
            token::burn(ctx.with_signer(&signer), amount)
        } else {
            token::burn(ctx, amount)
        }
    }

    /// Anchor-style instruction: `sha256("global:<name>")[..8]` then the
    /// little-endian amount. Accounts are `[market, vault_authority, ..rest]`.
    fn invoke_market(
        &mut self,
        program: &Pubkey,
        market: &Pubkey,
        vault: &Pubkey,
        call: MarketCall,
    ) -> Result<()> {
        require!(self.is_vault(vault), CellarError::Unauthorized);
        let preimage = format!("global:{}", call.instruction_name());
        let mut data = hash(preimage.as_bytes()).to_bytes()[..8].to_vec();
        data.extend_from_slice(&call.amount().to_le_bytes());

        let market_info = self.find(market)?;
        let mut metas = vec![
            AccountMeta {
                pubkey: *market,
                is_signer: false,
                is_writable: market_info.is_writable,
            },
            AccountMeta::new_readonly(*vault, true),
        ];
        let mut infos = vec![market_info, self.vault_authority.clone()];
        for info in self
            .reader
            .accounts
            .iter()
            .filter(|info| info.key != program && info.key != market && info.key != vault)
        {
            metas.push(AccountMeta {
                pubkey: *info.key,
                is_signer: info.is_signer,
                is_writable: info.is_writable,
            });
            infos.push(info.clone());
        }
        infos.push(self.find(program)?);

        let instruction = Instruction {
            program_id: *program,
            accounts: metas,
            data,
        };
        invoke_signed(&instruction, &infos, &self.signer())?;
        Ok(())
    }
}

#![allow(dead_code)]

use std::collections::HashMap;

use anchor_lang::prelude::*;
use ::cellar::{
    adaptors::{
        encode, AdaptorKind, BorrowPosition, LendingPosition, MarketCall, PositionConfig,
        ProtocolHost, TokenPosition,
    },
    constants::*,
    errors::CellarError,
    state::*,
};

pub const USDC_DECIMALS: u8 = 6;
pub const USDC: u64 = 1_000_000;

/// Market programs the in-memory chain knows how to execute
#[derive(Clone, Copy, Debug)]
pub enum MarketKind {
    /// Receipt-issuing supply market keeping `fee_bps` of every supply
    Supply { fee_bps: u64, treasury: Pubkey },
    Borrow,
}

#[derive(Clone, Copy, Debug)]
pub struct Market {
    pub program: Pubkey,
    pub underlying: Pubkey,
    /// Receipt mint for supply markets, debt mint for borrow markets
    pub token: Pubkey,
    pub kind: MarketKind,
}

/// In-memory token ledger, oracle board and market programs.
///
/// Cloning snapshots the whole chain.
#[derive(Clone, Default)]
pub struct Chain {
    pub now: i64,
    balances: HashMap<(Pubkey, Pubkey), u64>,
    supplies: HashMap<Pubkey, u64>,
    allowances: HashMap<(Pubkey, Pubkey), (Pubkey, u64)>,
    quotes: HashMap<Pubkey, OracleQuote>,
    markets: HashMap<Pubkey, Market>,
    /// Cut a supply market keeps out of every redemption
    redeem_fees: HashMap<Pubkey, u64>,
}

impl Chain {
    pub fn balance(&self, owner: &Pubkey, mint: &Pubkey) -> u64 {
        self.balances.get(&(*owner, *mint)).copied().unwrap_or(0)
    }

    pub fn supply(&self, mint: &Pubkey) -> u64 {
        self.supplies.get(mint).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Pubkey, mint: &Pubkey) -> Option<(Pubkey, u64)> {
        self.allowances.get(&(*owner, *mint)).copied()
    }

    pub fn set_quote(&mut self, oracle: Pubkey, quote: OracleQuote) {
        self.quotes.insert(oracle, quote);
    }

    pub fn add_market(&mut self, address: Pubkey, market: Market) {
        self.markets.insert(address, market);
    }

    pub fn set_redeem_fee(&mut self, market: Pubkey, fee_bps: u64) {
        self.redeem_fees.insert(market, fee_bps);
    }

    /// Move tokens without any authority, like a donation or an airdrop
    pub fn credit(&mut self, owner: &Pubkey, mint: &Pubkey, amount: u64) {
        *self.balances.entry((*owner, *mint)).or_default() += amount;
        *self.supplies.entry(*mint).or_default() += amount;
    }

    fn debit(&mut self, owner: &Pubkey, mint: &Pubkey, amount: u64) -> Result<()> {
        let balance = self.balances.entry((*owner, *mint)).or_default();
        if *balance < amount {
            return Err(ProgramError::InsufficientFunds.into());
        }
        *balance -= amount;
        Ok(())
    }

    fn move_tokens(&mut self, mint: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        self.debit(from, mint, amount)?;
        *self.balances.entry((*to, *mint)).or_default() += amount;
        Ok(())
    }

    fn spend_allowance(&mut self, owner: &Pubkey, mint: &Pubkey, delegate: &Pubkey, amount: u64) -> Result<()> {
        match self.allowances.get_mut(&(*owner, *mint)) {
            Some((approved, remaining)) if approved == delegate && *remaining >= amount => {
                *remaining -= amount;
                Ok(())
            }
            _ => Err(ProgramError::MissingRequiredSignature.into()),
        }
    }
}

impl PriceSource for Chain {
    fn now(&self) -> i64 {
        self.now
    }

    fn oracle_quote(&self, oracle: &Pubkey) -> Result<OracleQuote> {
        self.quotes
            .get(oracle)
            .copied()
            .ok_or(error!(CellarError::MissingAccount))
    }

    fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64> {
        Ok(self.balance(owner, mint))
    }

    fn mint_supply(&self, mint: &Pubkey) -> Result<u64> {
        Ok(self.supply(mint))
    }
}

impl ProtocolHost for Chain {
    fn transfer(&mut self, mint: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        self.move_tokens(mint, from, to, amount)
    }

    fn approve(&mut self, mint: &Pubkey, owner: &Pubkey, delegate: &Pubkey, amount: u64) -> Result<()> {
        self.allowances.insert((*owner, *mint), (*delegate, amount));
        Ok(())
    }

    fn revoke(&mut self, mint: &Pubkey, owner: &Pubkey) -> Result<()> {
        self.allowances.remove(&(*owner, *mint));
        Ok(())
    }

    fn mint_to(&mut self, mint: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        self.credit(to, mint, amount);
        Ok(())
    }

    fn burn(&mut self, mint: &Pubkey, from: &Pubkey, amount: u64) -> Result<()> {
        self.debit(from, mint, amount)?;
        *self.supplies.entry(*mint).or_default() -= amount;
        Ok(())
    }

    fn invoke_market(
        &mut self,
        program: &Pubkey,
        market: &Pubkey,
        vault: &Pubkey,
        call: MarketCall,
    ) -> Result<()> {
        let m = *self
            .markets
            .get(market)
            .ok_or(error!(CellarError::MissingAccount))?;
        require_keys_eq!(m.program, *program, CellarError::MissingAccount);

        match (m.kind, call) {
            (MarketKind::Supply { fee_bps, treasury }, MarketCall::Supply { amount }) => {
                self.spend_allowance(vault, &m.underlying, market, amount)?;
                let reserve = self.balance(market, &m.underlying);
                let supply = self.supply(&m.token);
                let fee = amount * fee_bps / BPS_DENOMINATOR;
                let net = amount - fee;
                let receipts = if supply == 0 || reserve == 0 {
                    net
                } else {
                    (net as u128 * supply as u128 / reserve as u128) as u64
                };
                self.move_tokens(&m.underlying, vault, market, net)?;
                self.move_tokens(&m.underlying, vault, &treasury, fee)?;
                self.credit(vault, &m.token, receipts);
                Ok(())
            }
            (MarketKind::Supply { treasury, .. }, MarketCall::Redeem { receipts }) => {
                let reserve = self.balance(market, &m.underlying);
                let supply = self.supply(&m.token);
                let out = (receipts as u128 * reserve as u128 / supply as u128) as u64;
                let fee = out * self.redeem_fees.get(market).copied().unwrap_or(0) / BPS_DENOMINATOR;
                self.burn(&m.token, vault, receipts)?;
                self.move_tokens(&m.underlying, market, &treasury, fee)?;
                self.move_tokens(&m.underlying, market, vault, out - fee)
            }
            (MarketKind::Borrow, MarketCall::Borrow { amount }) => {
                self.move_tokens(&m.underlying, market, vault, amount)?;
                self.credit(vault, &m.token, amount);
                Ok(())
            }
            (MarketKind::Borrow, MarketCall::Repay { amount }) => {
                self.spend_allowance(vault, &m.underlying, market, amount)?;
                self.move_tokens(&m.underlying, vault, market, amount)?;
                self.burn(&m.token, vault, amount)
            }
            _ => err!(CellarError::UnsupportedAdaptorCall),
        }
    }
}

pub fn liquid() -> Vec<u8> {
    PositionConfig { liquid: true }.encode().unwrap()
}

pub fn illiquid() -> Vec<u8> {
    PositionConfig { liquid: false }.encode().unwrap()
}

pub fn pegged(asset: Pubkey, decimals: u8, usd_price: u64) -> AssetSettings {
    AssetSettings {
        asset,
        decimals,
        max_age: 0,
        extension: Extension::Pegged { usd_price },
    }
}

/// A USDC cellar with governance, a strategist and the three adaptors
/// trusted and catalogued. Position 1 is idle USDC and the holding position.
pub struct Harness {
    pub chain: Chain,
    pub registry: Registry,
    pub router: PriceRouter,
    pub cellar: Cellar,

    pub governance: Pubkey,
    pub owner: Pubkey,
    pub strategist: Pubkey,

    pub usdc: Pubkey,
    pub token_adaptor: Pubkey,
    pub lending_adaptor: Pubkey,
    pub borrow_adaptor: Pubkey,

    next_position_id: u32,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(CellarSettings::default())
    }

    pub fn with_settings(settings: CellarSettings) -> Self {
        let chain = Chain {
            now: 1_700_000_000,
            ..Default::default()
        };
        let governance = Pubkey::new_unique();
        let usdc = Pubkey::new_unique();

        let mut router = PriceRouter::new(governance, DEFAULT_MAX_PRICE_AGE, 255);
        router
            .add_asset(&governance, pegged(usdc, USDC_DECIMALS, ONE_USD as u64), ONE_USD, &chain)
            .unwrap();

        let mut registry = Registry::new(governance, 255);
        let token_adaptor = Pubkey::new_unique();
        let lending_adaptor = Pubkey::new_unique();
        let borrow_adaptor = Pubkey::new_unique();
        for (address, kind) in [
            (token_adaptor, AdaptorKind::Token),
            (lending_adaptor, AdaptorKind::Lending),
            (borrow_adaptor, AdaptorKind::Borrow),
        ] {
            registry.trust_adaptor(&governance, address, kind, 1, true).unwrap();
        }
        registry
            .trust_position(
                &governance,
                1,
                token_adaptor,
                encode(&TokenPosition { mint: usdc }).unwrap(),
                &router,
            )
            .unwrap();

        let owner = Pubkey::new_unique();
        let strategist = Pubkey::new_unique();
        let keys = CellarKeys {
            address: Pubkey::new_unique(),
            owner,
            strategist,
            registry: Pubkey::new_unique(),
            price_router: Pubkey::new_unique(),
            asset_mint: usdc,
            share_mint: Pubkey::new_unique(),
            vault_authority: Pubkey::new_unique(),
        };
        let mut cellar = Cellar::new(1, keys, USDC_DECIMALS, settings).unwrap();
        let env = CellarEnv {
            registry: &registry,
            price_router: &router,
        };
        cellar.install_holding_position(&env, 1, liquid()).unwrap();
        for adaptor in [lending_adaptor, borrow_adaptor] {
            cellar
                .update_catalogue(&owner, &env, CatalogueEntry::Adaptor(adaptor), true)
                .unwrap();
        }

        Self {
            chain,
            registry,
            router,
            cellar,
            governance,
            owner,
            strategist,
            usdc,
            token_adaptor,
            lending_adaptor,
            borrow_adaptor,
            next_position_id: 2,
        }
    }

    pub fn vault(&self) -> Pubkey {
        self.cellar.vault_authority
    }

    pub fn share_mint(&self) -> Pubkey {
        self.cellar.share_mint
    }

    /// A user holding `usdc` whole dollars
    pub fn user(&mut self, usdc: u64) -> Pubkey {
        let user = Pubkey::new_unique();
        let mint = self.usdc;
        self.chain.credit(&user, &mint, usdc * USDC);
        user
    }

    pub fn shares_of(&self, owner: &Pubkey) -> u64 {
        self.chain.balance(owner, &self.share_mint())
    }

    pub fn usdc_of(&self, owner: &Pubkey) -> u64 {
        self.chain.balance(owner, &self.usdc)
    }

    /// Run `f` as one transaction: on error every write is discarded
    pub fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut Cellar, &CellarEnv, &mut Chain) -> Result<T>,
    ) -> Result<T> {
        let chain = self.chain.clone();
        let cellar = self.cellar.clone();
        let env = CellarEnv {
            registry: &self.registry,
            price_router: &self.router,
        };
        let result = f(&mut self.cellar, &env, &mut self.chain);
        if result.is_err() {
            self.chain = chain;
            self.cellar = cellar;
        }
        result
    }

    pub fn view<T>(&self, f: impl FnOnce(&Cellar, &CellarEnv, &Chain) -> Result<T>) -> Result<T> {
        let env = CellarEnv {
            registry: &self.registry,
            price_router: &self.router,
        };
        f(&self.cellar, &env, &self.chain)
    }

    pub fn deposit(&mut self, user: &Pubkey, assets: u64) -> Result<u64> {
        self.transact(|cellar, env, chain| cellar.deposit(env, chain, user, user, assets, 0))
    }

    pub fn mint(&mut self, user: &Pubkey, shares: u64) -> Result<u64> {
        self.transact(|cellar, env, chain| cellar.mint(env, chain, user, user, shares, u64::MAX))
    }

    pub fn withdraw(&mut self, user: &Pubkey, assets: u64) -> Result<u64> {
        self.transact(|cellar, env, chain| cellar.withdraw(env, chain, user, user, assets, u64::MAX))
    }

    pub fn redeem(&mut self, user: &Pubkey, shares: u64) -> Result<u64> {
        self.transact(|cellar, env, chain| cellar.redeem(env, chain, user, user, shares, 0))
    }

    pub fn rebalance(&mut self, calls: Vec<AdaptorCall>, min_total_assets: Option<u64>) -> Result<RebalanceOutcome> {
        let strategist = self.strategist;
        self.transact(|cellar, env, chain| {
            cellar.rebalance(&strategist, env, chain, &calls, min_total_assets)
        })
    }

    pub fn total_assets(&self) -> u64 {
        self.view(|cellar, env, chain| cellar.total_assets(env, chain)).unwrap()
    }

    pub fn share_price(&self) -> u64 {
        self.view(|cellar, env, chain| cellar.share_price(env, chain)).unwrap()
    }

    /// Register a position, catalogue it and append it to the cellar
    pub fn add_position(&mut self, adaptor: Pubkey, adaptor_data: Vec<u8>, configuration: Vec<u8>) -> u32 {
        let id = self.next_position_id;
        self.next_position_id += 1;
        self.registry
            .trust_position(&self.governance, id, adaptor, adaptor_data, &self.router)
            .unwrap();
        let (owner, strategist) = (self.owner, self.strategist);
        let index = self.cellar.positions.len();
        self.transact(|cellar, env, _| {
            cellar.update_catalogue(&owner, env, CatalogueEntry::Position(id), true)?;
            cellar.add_position(&strategist, env, index, id, configuration)
        })
        .unwrap();
        id
    }

    /// USDC supply market with a fee kept on every supply
    pub fn add_lending_market(&mut self, fee_bps: u64, configuration: Vec<u8>) -> (LendingPosition, u32) {
        let position = LendingPosition {
            market_program: Pubkey::new_unique(),
            market: Pubkey::new_unique(),
            underlying: self.usdc,
            receipt: Pubkey::new_unique(),
        };
        self.chain.add_market(
            position.market,
            Market {
                program: position.market_program,
                underlying: position.underlying,
                token: position.receipt,
                kind: MarketKind::Supply {
                    fee_bps,
                    treasury: Pubkey::new_unique(),
                },
            },
        );
        let id = self.add_position(self.lending_adaptor, encode(&position).unwrap(), configuration);
        (position, id)
    }

    /// USDC borrow market seeded with `liquidity` whole dollars
    pub fn add_borrow_market(&mut self, liquidity: u64) -> (BorrowPosition, u32) {
        let position = BorrowPosition {
            market_program: Pubkey::new_unique(),
            market: Pubkey::new_unique(),
            underlying: self.usdc,
            debt_mint: Pubkey::new_unique(),
        };
        self.chain.add_market(
            position.market,
            Market {
                program: position.market_program,
                underlying: position.underlying,
                token: position.debt_mint,
                kind: MarketKind::Borrow,
            },
        );
        let usdc = self.usdc;
        self.chain.credit(&position.market, &usdc, liquidity * USDC);
        let id = self.add_position(self.borrow_adaptor, encode(&position).unwrap(), Vec::new());
        (position, id)
    }
}

pub fn call<T: AnchorSerialize>(adaptor: Pubkey, data: &T) -> AdaptorCall {
    AdaptorCall {
        adaptor,
        data: encode(data).unwrap(),
    }
}

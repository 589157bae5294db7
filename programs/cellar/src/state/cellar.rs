use anchor_lang::prelude::*;

use crate::{
    adaptors::{Adaptor, Holdings, Ledger, PositionConfig, ProtocolHost, UsedPosition},
    constants::*,
    errors::CellarError,
    math::{deviation_bps, mul_div_u64, pow10, to_u64, Rounding},
    state::{price_router::PriceRouter, registry::Registry},
};

/// Shared accounts every cellar operation reads
#[derive(Clone, Copy)]
pub struct CellarEnv<'a> {
    pub registry: &'a Registry,
    pub price_router: &'a PriceRouter,
}

/// A position as tracked by one cellar
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct CellarPosition {
    /// Registry position id
    pub id: u32,
    pub adaptor: Pubkey,
    pub is_debt: bool,
    pub adaptor_data: Vec<u8>,
    /// Per-cellar policy, Borsh `PositionConfig` for credit positions
    pub configuration_data: Vec<u8>,
}

/// Governance-tunable limits of a cellar
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellarSettings {
    pub max_positions: u8,
    pub share_supply_cap: u64,
    /// Smallest deposit accepted while no shares exist
    pub min_initial_deposit: u64,
    /// Largest total assets move a rebalance may cause, either direction
    pub rebalance_deviation_bps: u16,
    /// Whether illiquid credit backs debt in the solvency check
    pub illiquid_counts_toward_solvency: bool,
}

impl Default for CellarSettings {
    fn default() -> Self {
        Self {
            max_positions: MAX_POSITIONS as u8,
            share_supply_cap: u64::MAX,
            min_initial_deposit: 0,
            rebalance_deviation_bps: DEFAULT_REBALANCE_DEVIATION_BPS,
            illiquid_counts_toward_solvency: false,
        }
    }
}

impl CellarSettings {
    pub fn validate(&self) -> Result<()> {
        require!(
            self.max_positions > 0 && self.max_positions as usize <= MAX_POSITIONS,
            CellarError::InvalidSettings
        );
        require!(
            self.rebalance_deviation_bps <= MAX_REBALANCE_DEVIATION_BPS,
            CellarError::InvalidSettings
        );
        require!(self.share_supply_cap > 0, CellarError::InvalidSettings);
        Ok(())
    }
}

/// Entry governance can allow a strategist to use
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogueEntry {
    Adaptor(Pubkey),
    Position(u32),
}

/// One step of a rebalance batch
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct AdaptorCall {
    pub adaptor: Pubkey,
    /// Borsh-encoded call understood by the adaptor
    pub data: Vec<u8>,
}

/// Addresses a cellar is created with
#[derive(Clone, Copy, Debug)]
pub struct CellarKeys {
    pub address: Pubkey,
    pub owner: Pubkey,
    pub strategist: Pubkey,
    pub registry: Pubkey,
    pub price_router: Pubkey,
    pub asset_mint: Pubkey,
    pub share_mint: Pubkey,
    pub vault_authority: Pubkey,
}

/// Position values in cellar asset units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Valuation {
    pub credit: u64,
    /// Part of `credit` ordinary withdrawals cannot reach
    pub illiquid_credit: u64,
    pub debt: u64,
}

impl Valuation {
    pub fn total_assets(&self) -> u64 {
        self.credit.saturating_sub(self.debt)
    }

    pub fn solvency_assets(&self, illiquid_counts: bool) -> u64 {
        if illiquid_counts {
            self.credit
        } else {
            self.credit.saturating_sub(self.illiquid_credit)
        }
    }
}

/// Outcome of a rebalance batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RebalanceOutcome {
    pub total_assets_before: u64,
    pub total_assets_after: u64,
}

/// Multi-position vault.
///
/// All holdings sit in token accounts owned by `vault_authority`; the
/// cellar itself only records which positions make up its NAV.
#[account]
#[derive(Debug)]
pub struct Cellar {
    pub address: Pubkey,
    pub cellar_id: u64,

    /// Governance
    pub owner: Pubkey,
    pub strategist: Pubkey,

    pub registry: Pubkey,
    pub price_router: Pubkey,

    pub asset_mint: Pubkey,
    pub share_mint: Pubkey,
    pub vault_authority: Pubkey,
    pub asset_decimals: u8,

    /// Mirrors the share mint supply
    pub total_shares: u64,

    /// Ordered positions; withdrawals drain credit positions in this order
    pub positions: Vec<CellarPosition>,

    pub adaptor_catalogue: Vec<Pubkey>,
    pub position_catalogue: Vec<u32>,

    /// Credit position user deposits flow into
    pub holding_position: Option<u32>,

    pub settings: CellarSettings,
    pub is_shutdown: bool,

    /// Reentrancy lock
    pub locked: bool,

    pub bump: u8,
    pub authority_bump: u8,
    pub share_bump: u8,
}

impl Cellar {
    pub fn new(cellar_id: u64, keys: CellarKeys, asset_decimals: u8, settings: CellarSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            address: keys.address,
            cellar_id,
            owner: keys.owner,
            strategist: keys.strategist,
            registry: keys.registry,
            price_router: keys.price_router,
            asset_mint: keys.asset_mint,
            share_mint: keys.share_mint,
            vault_authority: keys.vault_authority,
            asset_decimals,
            total_shares: 0,
            positions: Vec::new(),
            adaptor_catalogue: Vec::new(),
            position_catalogue: Vec::new(),
            holding_position: None,
            settings,
            is_shutdown: false,
            locked: false,
            bump: 0,
            authority_bump: 0,
            share_bump: 0,
        })
    }

    /// Run `f` with the reentrancy lock held, releasing it on every exit
    fn non_reentrant<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        require!(!self.locked, CellarError::Reentrancy);
        self.locked = true;
        let result = f(self);
        self.locked = false;
        result
    }

    pub fn require_owner(&self, caller: &Pubkey) -> Result<()> {
        require_keys_eq!(*caller, self.owner, CellarError::Unauthorized);
        Ok(())
    }

    pub fn require_strategist(&self, caller: &Pubkey) -> Result<()> {
        require_keys_eq!(*caller, self.strategist, CellarError::Unauthorized);
        Ok(())
    }

    fn require_not_paused(&self, env: &CellarEnv) -> Result<()> {
        require!(!env.registry.is_paused(&self.address), CellarError::Paused);
        Ok(())
    }

    pub fn position_index(&self, id: u32) -> Option<usize> {
        self.positions.iter().position(|p| p.id == id)
    }

    pub fn used_positions(&self) -> Vec<UsedPosition> {
        self.positions
            .iter()
            .map(|p| UsedPosition {
                adaptor: p.adaptor,
                adaptor_data: p.adaptor_data.clone(),
            })
            .collect()
    }

    pub fn update_catalogue(
        &mut self,
        caller: &Pubkey,
        env: &CellarEnv,
        entry: CatalogueEntry,
        add: bool,
    ) -> Result<()> {
        self.require_owner(caller)?;
        match entry {
            CatalogueEntry::Adaptor(address) if add => {
                env.registry.trusted_adaptor(&address)?;
                if !self.adaptor_catalogue.contains(&address) {
                    require!(
                        self.adaptor_catalogue.len() < MAX_CATALOGUE_ENTRIES,
                        CellarError::CatalogueFull
                    );
                    self.adaptor_catalogue.push(address);
                }
            }
            CatalogueEntry::Adaptor(address) => self.adaptor_catalogue.retain(|a| *a != address),
            CatalogueEntry::Position(id) if add => {
                env.registry.trusted_position(id)?;
                if !self.position_catalogue.contains(&id) {
                    require!(
                        self.position_catalogue.len() < MAX_CATALOGUE_ENTRIES,
                        CellarError::CatalogueFull
                    );
                    self.position_catalogue.push(id);
                }
            }
            CatalogueEntry::Position(id) => self.position_catalogue.retain(|p| *p != id),
        }
        Ok(())
    }

    pub fn set_strategist(&mut self, caller: &Pubkey, strategist: Pubkey) -> Result<()> {
        self.require_owner(caller)?;
        self.strategist = strategist;
        Ok(())
    }

    pub fn update_settings(&mut self, caller: &Pubkey, settings: CellarSettings) -> Result<()> {
        self.require_owner(caller)?;
        settings.validate()?;
        require!(
            settings.max_positions as usize >= self.positions.len(),
            CellarError::InvalidSettings
        );
        require!(
            settings.share_supply_cap >= self.total_shares,
            CellarError::InvalidSettings
        );
        self.settings = settings;
        Ok(())
    }

    pub fn set_shutdown(&mut self, caller: &Pubkey, shutdown: bool) -> Result<()> {
        self.require_owner(caller)?;
        self.is_shutdown = shutdown;
        Ok(())
    }

    /// Catalogue and install the first holding position at creation
    pub fn install_holding_position(
        &mut self,
        env: &CellarEnv,
        id: u32,
        configuration_data: Vec<u8>,
    ) -> Result<()> {
        let owner = self.owner;
        let adaptor = env.registry.trusted_position(id)?.adaptor;
        self.update_catalogue(&owner, env, CatalogueEntry::Adaptor(adaptor), true)?;
        self.update_catalogue(&owner, env, CatalogueEntry::Position(id), true)?;
        self.insert_position(env, 0, id, configuration_data)?;
        self.assign_holding_position(env, id)
    }

    pub fn add_position(
        &mut self,
        caller: &Pubkey,
        env: &CellarEnv,
        index: usize,
        id: u32,
        configuration_data: Vec<u8>,
    ) -> Result<()> {
        self.require_strategist(caller)?;
        self.insert_position(env, index, id, configuration_data)
    }

    fn insert_position(
        &mut self,
        env: &CellarEnv,
        index: usize,
        id: u32,
        configuration_data: Vec<u8>,
    ) -> Result<()> {
        require!(!self.is_shutdown, CellarError::Shutdown);
        require!(
            self.position_catalogue.contains(&id),
            CellarError::PositionNotInCatalogue
        );
        require!(self.position_index(id).is_none(), CellarError::PositionAlreadyUsed);
        require!(
            self.positions.len() < self.settings.max_positions as usize,
            CellarError::PositionArrayFull
        );
        require!(index <= self.positions.len(), CellarError::InvalidIndex);
        require!(
            configuration_data.len() <= MAX_CONFIGURATION_DATA_LEN,
            CellarError::InvalidConfigurationData
        );

        let entry = env.registry.trusted_position(id)?;
        let implementation = env.registry.implementation(&entry.adaptor)?;
        implementation.validate_configuration(&configuration_data)?;

        self.positions.insert(
            index,
            CellarPosition {
                id,
                adaptor: entry.adaptor,
                is_debt: entry.is_debt,
                adaptor_data: entry.adaptor_data.clone(),
                configuration_data,
            },
        );
        msg!("Position {} added at index {}", id, index);
        Ok(())
    }

    /// Remove an empty position
    pub fn remove_position(
        &mut self,
        caller: &Pubkey,
        env: &CellarEnv,
        host: &dyn ProtocolHost,
        index: usize,
    ) -> Result<u32> {
        self.require_strategist(caller)?;
        let position = self.positions.get(index).ok_or(CellarError::InvalidIndex)?;
        require!(
            self.holding_position != Some(position.id),
            CellarError::RemovingHoldingPosition
        );
        let implementation = env.registry.implementation(&position.adaptor)?;
        let holdings = Holdings::new(host, self.vault_authority);
        require!(
            implementation.balance_of(&holdings, &position.adaptor_data)? == 0,
            CellarError::PositionNotEmpty
        );
        Ok(self.positions.remove(index).id)
    }

    pub fn swap_positions(&mut self, caller: &Pubkey, a: usize, b: usize) -> Result<()> {
        self.require_strategist(caller)?;
        require!(
            a < self.positions.len() && b < self.positions.len(),
            CellarError::InvalidIndex
        );
        self.positions.swap(a, b);
        Ok(())
    }

    pub fn set_holding_position(&mut self, caller: &Pubkey, env: &CellarEnv, id: u32) -> Result<()> {
        self.require_strategist(caller)?;
        self.assign_holding_position(env, id)
    }

    fn assign_holding_position(&mut self, env: &CellarEnv, id: u32) -> Result<()> {
        let index = self.position_index(id).ok_or(CellarError::PositionNotUsed)?;
        let position = &self.positions[index];
        require!(!position.is_debt, CellarError::DebtMismatch);
        env.registry.trusted_position(id)?;
        let implementation = env.registry.implementation(&position.adaptor)?;
        require_keys_eq!(
            implementation.asset_of(&position.adaptor_data)?,
            self.asset_mint,
            CellarError::AssetMismatch
        );
        self.holding_position = Some(id);
        Ok(())
    }

    /// Drop a position the registry has distrusted. Anyone may call this.
    ///
    /// Whatever the position still holds leaves the NAV with it.
    pub fn force_position_out(&mut self, env: &CellarEnv, index: usize) -> Result<u32> {
        let position = self.positions.get(index).ok_or(CellarError::InvalidIndex)?;
        let id = position.id;
        require!(
            !env.registry.is_position_trusted(id),
            CellarError::PositionStillTrusted
        );
        require!(
            self.holding_position != Some(id),
            CellarError::RemovingHoldingPosition
        );
        self.positions.remove(index);
        self.position_catalogue.retain(|p| *p != id);
        msg!("Position {} forced out", id);
        Ok(id)
    }

    /// Live value of every position in cellar asset units
    pub fn valuation(&self, env: &CellarEnv, host: &dyn ProtocolHost) -> Result<Valuation> {
        let holdings = Holdings::new(host, self.vault_authority);
        let mut valuation = Valuation::default();
        for position in &self.positions {
            let implementation = env.registry.implementation(&position.adaptor)?;
            let balance = implementation.balance_of(&holdings, &position.adaptor_data)?;
            if balance == 0 {
                continue;
            }
            let asset = implementation.asset_of(&position.adaptor_data)?;
            let value = env
                .price_router
                .get_value(host, &asset, balance, &self.asset_mint)?;

            let add = |total: u64| total.checked_add(value).ok_or(CellarError::MathOverflow);
            if position.is_debt {
                valuation.debt = add(valuation.debt)?;
            } else {
                valuation.credit = add(valuation.credit)?;
                if !PositionConfig::decode(&position.configuration_data)?.liquid {
                    valuation.illiquid_credit = add(valuation.illiquid_credit)?;
                }
            }
        }
        Ok(valuation)
    }

    pub fn total_assets(&self, env: &CellarEnv, host: &dyn ProtocolHost) -> Result<u64> {
        Ok(self.valuation(env, host)?.total_assets())
    }

    /// Value the ordinary withdrawal flow can reach right now
    pub fn total_assets_withdrawable(&self, env: &CellarEnv, host: &dyn ProtocolHost) -> Result<u64> {
        let holdings = Holdings::new(host, self.vault_authority);
        let mut total = 0u64;
        for position in self.positions.iter().filter(|p| !p.is_debt) {
            if env.registry.trusted_position(position.id).is_err() {
                continue;
            }
            let implementation = env.registry.implementation(&position.adaptor)?;
            let withdrawable = implementation.withdrawable_from(
                &holdings,
                &position.adaptor_data,
                &position.configuration_data,
            )?;
            if withdrawable == 0 {
                continue;
            }
            let asset = implementation.asset_of(&position.adaptor_data)?;
            let value = env
                .price_router
                .get_value(host, &asset, withdrawable, &self.asset_mint)?;
            total = total.checked_add(value).ok_or(CellarError::MathOverflow)?;
        }
        Ok(total)
    }

    fn shares_for(&self, assets: u64, total_assets: u64, rounding: Rounding) -> Result<u64> {
        if self.total_shares == 0 {
            return Ok(assets);
        }
        mul_div_u64(assets, self.total_shares, total_assets, rounding)
    }

    fn assets_for(&self, shares: u64, total_assets: u64, rounding: Rounding) -> Result<u64> {
        if self.total_shares == 0 {
            return Ok(shares);
        }
        mul_div_u64(shares, total_assets, self.total_shares, rounding)
    }

    pub fn convert_to_shares(&self, env: &CellarEnv, host: &dyn ProtocolHost, assets: u64) -> Result<u64> {
        let total_assets = self.total_assets(env, host)?;
        self.shares_for(assets, total_assets, Rounding::Down)
    }

    pub fn convert_to_assets(&self, env: &CellarEnv, host: &dyn ProtocolHost, shares: u64) -> Result<u64> {
        let total_assets = self.total_assets(env, host)?;
        self.assets_for(shares, total_assets, Rounding::Down)
    }

    pub fn preview_deposit(&self, env: &CellarEnv, host: &dyn ProtocolHost, assets: u64) -> Result<u64> {
        self.convert_to_shares(env, host, assets)
    }

    pub fn preview_mint(&self, env: &CellarEnv, host: &dyn ProtocolHost, shares: u64) -> Result<u64> {
        let total_assets = self.total_assets(env, host)?;
        self.assets_for(shares, total_assets, Rounding::Up)
    }

    pub fn preview_withdraw(&self, env: &CellarEnv, host: &dyn ProtocolHost, assets: u64) -> Result<u64> {
        let total_assets = self.total_assets(env, host)?;
        self.shares_for(assets, total_assets, Rounding::Up)
    }

    pub fn preview_redeem(&self, env: &CellarEnv, host: &dyn ProtocolHost, shares: u64) -> Result<u64> {
        self.convert_to_assets(env, host, shares)
    }

    /// Assets `owner` could withdraw now, bounded by liquidity
    pub fn max_withdraw(&self, env: &CellarEnv, host: &dyn ProtocolHost, owner: &Pubkey) -> Result<u64> {
        if env.registry.is_paused(&self.address) {
            return Ok(0);
        }
        let shares = host.token_balance(owner, &self.share_mint)?;
        let assets = self.convert_to_assets(env, host, shares)?;
        Ok(assets.min(self.total_assets_withdrawable(env, host)?))
    }

    /// Asset value of one whole share
    pub fn share_price(&self, env: &CellarEnv, host: &dyn ProtocolHost) -> Result<u64> {
        let one_share = to_u64(pow10(self.asset_decimals)?)?;
        self.convert_to_assets(env, host, one_share)
    }

    /// Deposit `assets` from `depositor`, minting shares to `receiver`
    pub fn deposit(
        &mut self,
        env: &CellarEnv,
        host: &mut dyn ProtocolHost,
        depositor: &Pubkey,
        receiver: &Pubkey,
        assets: u64,
        min_shares: u64,
    ) -> Result<u64> {
        self.non_reentrant(|cellar| {
            cellar.require_can_deposit(env)?;
            require!(assets > 0, CellarError::ZeroAmount);
            let total_assets = cellar.total_assets(env, &*host)?;
            let shares = cellar.shares_for(assets, total_assets, Rounding::Down)?;
            require!(shares > 0, CellarError::ZeroShares);
            require!(shares >= min_shares, CellarError::MinimumOutputNotMet);
            cellar.enter(env, host, depositor, receiver, assets, shares)?;
            Ok(shares)
        })
    }

    /// Mint exactly `shares` to `receiver`, pulling the rounded-up asset cost
    pub fn mint(
        &mut self,
        env: &CellarEnv,
        host: &mut dyn ProtocolHost,
        depositor: &Pubkey,
        receiver: &Pubkey,
        shares: u64,
        max_assets: u64,
    ) -> Result<u64> {
        self.non_reentrant(|cellar| {
            cellar.require_can_deposit(env)?;
            require!(shares > 0, CellarError::ZeroShares);
            let total_assets = cellar.total_assets(env, &*host)?;
            let assets = cellar.assets_for(shares, total_assets, Rounding::Up)?;
            require!(assets > 0, CellarError::ZeroAmount);
            require!(assets <= max_assets, CellarError::SlippageExceeded);
            cellar.enter(env, host, depositor, receiver, assets, shares)?;
            Ok(assets)
        })
    }

    /// Withdraw exactly `assets`, burning the rounded-up share cost from `owner`
    pub fn withdraw(
        &mut self,
        env: &CellarEnv,
        host: &mut dyn ProtocolHost,
        owner: &Pubkey,
        receiver: &Pubkey,
        assets: u64,
        max_shares: u64,
    ) -> Result<u64> {
        self.non_reentrant(|cellar| {
            cellar.require_not_paused(env)?;
            require!(assets > 0, CellarError::ZeroAmount);
            let total_assets = cellar.total_assets(env, &*host)?;
            let shares = cellar.shares_for(assets, total_assets, Rounding::Up)?;
            require!(shares > 0, CellarError::ZeroShares);
            require!(shares <= max_shares, CellarError::SlippageExceeded);
            cellar.exit(env, host, owner, receiver, assets, shares)?;
            Ok(shares)
        })
    }

    /// Burn `shares` from `owner`, paying out their rounded-down value
    pub fn redeem(
        &mut self,
        env: &CellarEnv,
        host: &mut dyn ProtocolHost,
        owner: &Pubkey,
        receiver: &Pubkey,
        shares: u64,
        min_assets: u64,
    ) -> Result<u64> {
        self.non_reentrant(|cellar| {
            cellar.require_not_paused(env)?;
            require!(shares > 0, CellarError::ZeroShares);
            let total_assets = cellar.total_assets(env, &*host)?;
            let assets = cellar.assets_for(shares, total_assets, Rounding::Down)?;
            require!(assets > 0, CellarError::ZeroAmount);
            require!(assets >= min_assets, CellarError::MinimumOutputNotMet);
            cellar.exit(env, host, owner, receiver, assets, shares)?;
            Ok(assets)
        })
    }

    fn require_can_deposit(&self, env: &CellarEnv) -> Result<()> {
        self.require_not_paused(env)?;
        require!(!self.is_shutdown, CellarError::Shutdown);
        Ok(())
    }

    fn enter(
        &mut self,
        env: &CellarEnv,
        host: &mut dyn ProtocolHost,
        depositor: &Pubkey,
        receiver: &Pubkey,
        assets: u64,
        shares: u64,
    ) -> Result<()> {
        if self.total_shares == 0 {
            require!(
                assets >= self.settings.min_initial_deposit && shares >= MIN_SHARE_SUPPLY,
                CellarError::DepositBelowMinimum
            );
        }
        let total_shares = self
            .total_shares
            .checked_add(shares)
            .ok_or(CellarError::MathOverflow)?;
        require!(
            total_shares <= self.settings.share_supply_cap,
            CellarError::ShareSupplyCapExceeded
        );

        let holding_id = self.holding_position.ok_or(CellarError::HoldingPositionNotSet)?;
        let index = self.position_index(holding_id).ok_or(CellarError::HoldingPositionNotSet)?;
        env.registry.trusted_position(holding_id)?;
        let implementation = env.registry.implementation(&self.positions[index].adaptor)?;

        host.transfer(&self.asset_mint, depositor, &self.vault_authority, assets)?;
        host.mint_to(&self.share_mint, receiver, shares)?;
        self.total_shares = total_shares;

        let position = &self.positions[index];
        let mut ledger = Ledger::new(host, self.vault_authority, self.used_positions());
        ledger.enter(position.adaptor);
        implementation.deposit(
            &mut ledger,
            assets,
            &position.adaptor_data,
            &position.configuration_data,
        )?;
        ledger.settle()
    }

    fn exit(
        &mut self,
        env: &CellarEnv,
        host: &mut dyn ProtocolHost,
        owner: &Pubkey,
        receiver: &Pubkey,
        assets: u64,
        shares: u64,
    ) -> Result<()> {
        // Nothing moves unless the whole request can be met
        let plan = self.plan_withdrawal(env, &*host, assets)?;

        let total_shares = self
            .total_shares
            .checked_sub(shares)
            .ok_or(CellarError::MathOverflow)?;
        require!(
            total_shares == 0 || total_shares >= MIN_SHARE_SUPPLY,
            CellarError::DustShareSupply
        );

        host.burn(&self.share_mint, owner, shares)?;
        self.total_shares = total_shares;

        let mut ledger = Ledger::new(host, self.vault_authority, self.used_positions());
        for (index, amount, implementation) in plan {
            let position = &self.positions[index];
            ledger.enter(position.adaptor);
            implementation.withdraw(
                &mut ledger,
                amount,
                receiver,
                &position.adaptor_data,
                &position.configuration_data,
            )?;
            ledger.settle()?;
        }
        Ok(())
    }

    /// Split a withdrawal of `assets` across liquid credit positions in
    /// list order. Amounts are in each position's own asset.
    fn plan_withdrawal(
        &self,
        env: &CellarEnv,
        host: &dyn ProtocolHost,
        assets: u64,
    ) -> Result<Vec<(usize, u64, &'static dyn Adaptor)>> {
        let holdings = Holdings::new(host, self.vault_authority);
        let mut remaining = assets;
        let mut plan = Vec::new();

        for (index, position) in self.positions.iter().enumerate() {
            if remaining == 0 {
                break;
            }
            if position.is_debt || env.registry.trusted_position(position.id).is_err() {
                continue;
            }
            let implementation = env.registry.implementation(&position.adaptor)?;
            let withdrawable = implementation.withdrawable_from(
                &holdings,
                &position.adaptor_data,
                &position.configuration_data,
            )?;
            if withdrawable == 0 {
                continue;
            }
            let asset = implementation.asset_of(&position.adaptor_data)?;
            let value = env
                .price_router
                .get_value(host, &asset, withdrawable, &self.asset_mint)?;

            if value >= remaining {
                let amount = env
                    .price_router
                    .get_value(host, &self.asset_mint, remaining, &asset)?
                    .min(withdrawable);
                plan.push((index, amount, implementation));
                remaining = 0;
            } else {
                plan.push((index, withdrawable, implementation));
                remaining -= value;
            }
        }

        require!(remaining == 0, CellarError::InsufficientLiquidity);
        Ok(plan)
    }

    /// Execute a strategist batch. Any failed guard aborts the whole batch.
    pub fn rebalance(
        &mut self,
        caller: &Pubkey,
        env: &CellarEnv,
        host: &mut dyn ProtocolHost,
        calls: &[AdaptorCall],
        min_total_assets: Option<u64>,
    ) -> Result<RebalanceOutcome> {
        self.require_strategist(caller)?;
        self.require_not_paused(env)?;
        self.non_reentrant(|cellar| {
            let total_assets_before = cellar.total_assets(env, &*host)?;
            let supply_before = host.mint_supply(&cellar.share_mint)?;

            {
                let mut ledger = Ledger::new(&mut *host, cellar.vault_authority, cellar.used_positions());
                for call in calls {
                    require!(
                        cellar.adaptor_catalogue.contains(&call.adaptor),
                        CellarError::AdaptorNotInCatalogue
                    );
                    let implementation = env.registry.trusted_adaptor(&call.adaptor)?.implementation();
                    ledger.enter(call.adaptor);
                    implementation.call(&mut ledger, &call.data)?;
                    ledger.settle()?;
                }
            }

            require!(
                host.mint_supply(&cellar.share_mint)? == supply_before,
                CellarError::TotalSharesChanged
            );

            let valuation = cellar.valuation(env, &*host)?;
            let total_assets_after = valuation.total_assets();
            if let Some(minimum) = min_total_assets {
                require!(
                    total_assets_after >= minimum,
                    CellarError::MinimumOutputNotMet
                );
            }
            require!(
                deviation_bps(total_assets_after as u128, total_assets_before as u128)?
                    <= cellar.settings.rebalance_deviation_bps as u128,
                CellarError::SlippageExceeded
            );
            require!(
                valuation.debt
                    <= valuation.solvency_assets(cellar.settings.illiquid_counts_toward_solvency),
                CellarError::Insolvent
            );

            Ok(RebalanceOutcome {
                total_assets_before,
                total_assets_after,
            })
        })
    }
}

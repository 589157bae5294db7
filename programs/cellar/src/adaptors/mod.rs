//! Adaptors give the cellar one uniform surface over every external protocol.
//!
//! An adaptor is a stateless value. It never sees the cellar account; it is
//! handed an exclusive [`Ledger`] over the vault's own holdings for the
//! duration of a single call, and a read-only [`Holdings`] view for
//! valuation.

use anchor_lang::prelude::*;

use crate::{errors::CellarError, state::price_router::PriceSource};

pub mod borrow;
pub mod lending;
pub mod token;

pub use borrow::*;
pub use lending::*;
pub use token::*;

/// Implementation selector stored in the registry for every trusted adaptor
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdaptorKind {
    Token,
    Lending,
    Borrow,
}

impl AdaptorKind {
    pub fn implementation(&self) -> &'static dyn Adaptor {
        match self {
            AdaptorKind::Token => &TokenAdaptor,
            AdaptorKind::Lending => &LendingAdaptor,
            AdaptorKind::Borrow => &BorrowAdaptor,
        }
    }
}

/// Stable tag for one release of an adaptor implementation
pub fn identifier_for(name: &str, version: u16) -> [u8; 32] {
    let tag = format!("{name} V {version}");
    anchor_lang::solana_program::hash::hash(tag.as_bytes()).to_bytes()
}

/// The adaptor capability.
///
/// `balance_of` must read live state from the external protocol on every
/// call. All downstream accounting depends on it.
pub trait Adaptor {
    /// Implementation name; the registry tags each trusted release
    /// with `identifier_for(name, version)`
    fn name(&self) -> &'static str;

    /// Debt positions are subtracted from total assets
    fn is_debt(&self) -> bool {
        false
    }

    fn asset_of(&self, adaptor_data: &[u8]) -> Result<Pubkey>;

    fn balance_of(&self, holdings: &Holdings, adaptor_data: &[u8]) -> Result<u64>;

    /// Amount the ordinary withdrawal flow may take; zero for illiquid positions
    fn withdrawable_from(
        &self,
        holdings: &Holdings,
        adaptor_data: &[u8],
        configuration_data: &[u8],
    ) -> Result<u64>;

    fn deposit(
        &self,
        ledger: &mut Ledger,
        assets: u64,
        adaptor_data: &[u8],
        configuration_data: &[u8],
    ) -> Result<()>;

    fn withdraw(
        &self,
        ledger: &mut Ledger,
        assets: u64,
        receiver: &Pubkey,
        adaptor_data: &[u8],
        configuration_data: &[u8],
    ) -> Result<()>;

    /// Strategist functions reachable through a rebalance batch
    fn call(&self, _ledger: &mut Ledger, _data: &[u8]) -> Result<()> {
        err!(CellarError::UnsupportedAdaptorCall)
    }

    /// Checks that configuration data is acceptable before a position is added
    fn validate_configuration(&self, configuration_data: &[u8]) -> Result<()> {
        PositionConfig::decode(configuration_data).map(|_| ())
    }
}

/// Vault-level policy stored per position
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionConfig {
    /// Ordinary depositors may withdraw from this position
    pub liquid: bool,
}

impl PositionConfig {
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::try_from_slice(data).map_err(|_| error!(CellarError::InvalidConfigurationData))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self)
    }
}

/// Borsh-encode a value into a fresh buffer
pub fn encode<T: AnchorSerialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    value
        .serialize(&mut buf)
        .map_err(|_| error!(CellarError::InvalidAdaptorData))?;
    Ok(buf)
}

/// Decode adaptor data, mapping failures to `InvalidAdaptorData`
pub fn decode<T: AnchorDeserialize>(data: &[u8]) -> Result<T> {
    T::try_from_slice(data).map_err(|_| error!(CellarError::InvalidAdaptorData))
}

/// Instruction sent to an external market program
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarketCall {
    Supply { amount: u64 },
    Redeem { receipts: u64 },
    Borrow { amount: u64 },
    Repay { amount: u64 },
}

impl MarketCall {
    /// Anchor instruction name the market program exposes
    pub fn instruction_name(&self) -> &'static str {
        match self {
            MarketCall::Supply { .. } => "supply",
            MarketCall::Redeem { .. } => "redeem",
            MarketCall::Borrow { .. } => "borrow",
            MarketCall::Repay { .. } => "repay",
        }
    }

    pub fn amount(&self) -> u64 {
        match *self {
            MarketCall::Supply { amount }
            | MarketCall::Borrow { amount }
            | MarketCall::Repay { amount } => amount,
            MarketCall::Redeem { receipts } => receipts,
        }
    }
}

/// External collaborators the vault moves value through.
///
/// On-chain this is [`crate::host::CpiHost`]; tests drive an in-memory
/// implementation.
pub trait ProtocolHost: PriceSource {
    fn transfer(&mut self, mint: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<()>;

    fn approve(&mut self, mint: &Pubkey, owner: &Pubkey, delegate: &Pubkey, amount: u64)
        -> Result<()>;

    fn revoke(&mut self, mint: &Pubkey, owner: &Pubkey) -> Result<()>;

    fn mint_to(&mut self, mint: &Pubkey, to: &Pubkey, amount: u64) -> Result<()>;

    fn burn(&mut self, mint: &Pubkey, from: &Pubkey, amount: u64) -> Result<()>;

    fn invoke_market(
        &mut self,
        program: &Pubkey,
        market: &Pubkey,
        vault: &Pubkey,
        call: MarketCall,
    ) -> Result<()>;
}

/// (adaptor, adaptor_data) of a position the cellar tracks
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsedPosition {
    pub adaptor: Pubkey,
    pub adaptor_data: Vec<u8>,
}

/// Read-only view of the vault's holdings
pub struct Holdings<'h> {
    host: &'h dyn ProtocolHost,
    vault: Pubkey,
}

impl<'h> Holdings<'h> {
    pub fn new(host: &'h dyn ProtocolHost, vault: Pubkey) -> Self {
        Self { host, vault }
    }

    pub fn vault(&self) -> Pubkey {
        self.vault
    }

    /// Vault balance of `mint`
    pub fn balance(&self, mint: &Pubkey) -> Result<u64> {
        self.host.token_balance(&self.vault, mint)
    }

    pub fn balance_of_owner(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64> {
        self.host.token_balance(owner, mint)
    }

    pub fn mint_supply(&self, mint: &Pubkey) -> Result<u64> {
        self.host.mint_supply(mint)
    }
}

/// Exclusive, per-call handle over the vault's holdings.
///
/// Tracks approvals granted by the running adaptor; the cellar refuses to
/// finish a call while any remain.
pub struct Ledger<'h> {
    host: &'h mut dyn ProtocolHost,
    vault: Pubkey,
    used_positions: Vec<UsedPosition>,
    adaptor: Pubkey,
    approvals: Vec<Pubkey>,
}

impl<'h> Ledger<'h> {
    pub fn new(host: &'h mut dyn ProtocolHost, vault: Pubkey, used_positions: Vec<UsedPosition>) -> Self {
        Self {
            host,
            vault,
            used_positions,
            adaptor: Pubkey::default(),
            approvals: Vec::new(),
        }
    }

    pub fn vault(&self) -> Pubkey {
        self.vault
    }

    pub fn holdings(&self) -> Holdings<'_> {
        Holdings::new(&*self.host, self.vault)
    }

    pub fn balance(&self, mint: &Pubkey) -> Result<u64> {
        self.host.token_balance(&self.vault, mint)
    }

    /// Pay `amount` of `mint` from the vault to `to`
    pub fn pay(&mut self, mint: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let vault = self.vault;
        self.host.transfer(mint, &vault, to, amount)
    }

    pub fn approve(&mut self, mint: &Pubkey, delegate: &Pubkey, amount: u64) -> Result<()> {
        let vault = self.vault;
        self.host.approve(mint, &vault, delegate, amount)?;
        if !self.approvals.contains(mint) {
            self.approvals.push(*mint);
        }
        Ok(())
    }

    pub fn revoke(&mut self, mint: &Pubkey) -> Result<()> {
        let vault = self.vault;
        self.host.revoke(mint, &vault)?;
        self.approvals.retain(|m| m != mint);
        Ok(())
    }

    pub fn invoke_market(&mut self, program: &Pubkey, market: &Pubkey, call: MarketCall) -> Result<()> {
        let vault = self.vault;
        self.host.invoke_market(program, market, &vault, call)
    }

    /// Strategist calls may only touch positions the cellar tracks
    pub fn require_position_used(&self, adaptor_data: &[u8]) -> Result<()> {
        require!(
            self.used_positions
                .iter()
                .any(|p| p.adaptor == self.adaptor && p.adaptor_data == adaptor_data),
            CellarError::PositionNotUsed
        );
        Ok(())
    }

    pub(crate) fn enter(&mut self, adaptor: Pubkey) {
        self.adaptor = adaptor;
    }

    /// Close out an adaptor call; fails if an approval was left behind
    pub(crate) fn settle(&mut self) -> Result<()> {
        require!(self.approvals.is_empty(), CellarError::OutstandingApproval);
        self.adaptor = Pubkey::default();
        Ok(())
    }

    pub fn outstanding_approvals(&self) -> usize {
        self.approvals.len()
    }
}

/// Resolve `u64::MAX` as "everything available"
pub(crate) fn resolve_amount(requested: u64, available: u64) -> u64 {
    if requested == u64::MAX {
        available
    } else {
        requested
    }
}

/// Liquidity flag of a position, decoded from its configuration data
pub(crate) fn is_liquid(configuration_data: &[u8]) -> Result<bool> {
    Ok(PositionConfig::decode(configuration_data)?.liquid)
}

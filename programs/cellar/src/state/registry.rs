use anchor_lang::prelude::*;

use crate::{
    adaptors::{identifier_for, Adaptor, AdaptorKind},
    constants::*,
    errors::CellarError,
    state::price_router::PriceRouter,
};

/// Deployment-wide trust directory shared by every cellar.
///
/// Entries are never removed. Distrust flips a flag so historical positions
/// stay auditable, and a revoked id or identifier is never accepted again.
#[account]
pub struct Registry {
    /// Governance signer allowed to mutate the registry
    pub authority: Pubkey,

    pub adaptors: Vec<AdaptorEntry>,

    pub positions: Vec<PositionEntry>,

    /// Cellars currently paused by governance
    pub paused: Vec<Pubkey>,

    pub bump: u8,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq)]
pub struct AdaptorEntry {
    /// Address cellars and strategists refer to the adaptor by
    pub address: Pubkey,
    pub kind: AdaptorKind,
    /// Release of the implementation, folded into `identifier`
    pub version: u16,
    pub identifier: [u8; 32],
    pub trusted: bool,
}

impl AdaptorEntry {
    pub fn implementation(&self) -> &'static dyn Adaptor {
        self.kind.implementation()
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq)]
pub struct PositionEntry {
    pub id: u32,
    pub adaptor: Pubkey,
    pub adaptor_data: Vec<u8>,
    pub is_debt: bool,
    pub trusted: bool,
}

impl Registry {
    pub fn new(authority: Pubkey, bump: u8) -> Self {
        Self {
            authority,
            adaptors: Vec::new(),
            positions: Vec::new(),
            paused: Vec::new(),
            bump,
        }
    }

    pub fn require_authority(&self, caller: &Pubkey) -> Result<()> {
        require_keys_eq!(*caller, self.authority, CellarError::Unauthorized);
        Ok(())
    }

    /// Trust (`trusted = true`) or revoke (`trusted = false`) an adaptor.
    ///
    /// A kind is re-trusted after revocation by registering a new address
    /// under a higher `version`; `version` is ignored when revoking.
    pub fn trust_adaptor(
        &mut self,
        caller: &Pubkey,
        address: Pubkey,
        kind: AdaptorKind,
        version: u16,
        trusted: bool,
    ) -> Result<()> {
        self.require_authority(caller)?;

        if !trusted {
            let entry = self
                .adaptors
                .iter_mut()
                .find(|a| a.address == address && a.trusted)
                .ok_or(CellarError::NotTrusted)?;
            entry.trusted = false;
            msg!("Adaptor {} distrusted", address);
            return Ok(());
        }

        if let Some(existing) = self.adaptors.iter().find(|a| a.address == address) {
            if existing.trusted {
                return err!(CellarError::AlreadyTrusted);
            }
            return err!(CellarError::IdentifierNotUnique);
        }

        let identifier = identifier_for(kind.implementation().name(), version);
        require!(
            !self.adaptors.iter().any(|a| a.identifier == identifier),
            CellarError::IdentifierNotUnique
        );
        require!(self.adaptors.len() < MAX_ADAPTORS, CellarError::RegistryFull);

        self.adaptors.push(AdaptorEntry {
            address,
            kind,
            version,
            identifier,
            trusted: true,
        });
        msg!("Adaptor {} trusted at version {}", address, version);
        Ok(())
    }

    /// Register a position type under a fresh id
    pub fn trust_position(
        &mut self,
        caller: &Pubkey,
        id: u32,
        adaptor: Pubkey,
        adaptor_data: Vec<u8>,
        price_router: &PriceRouter,
    ) -> Result<&PositionEntry> {
        self.require_authority(caller)?;
        require!(id != 0, CellarError::InvalidPositionId);
        require!(
            !self.positions.iter().any(|p| p.id == id),
            CellarError::AlreadyTrusted
        );
        require!(
            adaptor_data.len() <= MAX_ADAPTOR_DATA_LEN,
            CellarError::InvalidAdaptorData
        );
        require!(
            !self
                .positions
                .iter()
                .any(|p| p.adaptor == adaptor && p.adaptor_data == adaptor_data),
            CellarError::PositionAlreadyRegistered
        );
        require!(
            self.positions.len() < MAX_REGISTERED_POSITIONS,
            CellarError::RegistryFull
        );

        let implementation = self.trusted_adaptor(&adaptor)?.implementation();
        let asset = implementation.asset_of(&adaptor_data)?;
        require!(
            price_router.is_supported(&asset),
            CellarError::PriceNotAvailable
        );

        self.positions.push(PositionEntry {
            id,
            adaptor,
            adaptor_data,
            is_debt: implementation.is_debt(),
            trusted: true,
        });
        msg!("Position {} trusted for adaptor {}", id, adaptor);
        Ok(&self.positions[self.positions.len() - 1])
    }

    /// Permanently revoke a position id. A second call fails with `NotTrusted`.
    pub fn distrust_position(&mut self, caller: &Pubkey, id: u32) -> Result<()> {
        self.require_authority(caller)?;
        let entry = self
            .positions
            .iter_mut()
            .find(|p| p.id == id && p.trusted)
            .ok_or(CellarError::NotTrusted)?;
        entry.trusted = false;
        msg!("Position {} distrusted", id);
        Ok(())
    }

    pub fn set_paused(&mut self, caller: &Pubkey, cellar: Pubkey, paused: bool) -> Result<()> {
        self.require_authority(caller)?;
        let already = self.is_paused(&cellar);
        if paused && !already {
            require!(self.paused.len() < MAX_PAUSED_CELLARS, CellarError::RegistryFull);
            self.paused.push(cellar);
        } else if !paused {
            self.paused.retain(|c| *c != cellar);
        }
        Ok(())
    }

    pub fn transfer_authority(&mut self, caller: &Pubkey, new_authority: Pubkey) -> Result<()> {
        self.require_authority(caller)?;
        self.authority = new_authority;
        Ok(())
    }

    pub fn is_paused(&self, cellar: &Pubkey) -> bool {
        self.paused.contains(cellar)
    }

    pub fn position(&self, id: u32) -> Option<&PositionEntry> {
        self.positions.iter().find(|p| p.id == id)
    }

    pub fn adaptor(&self, address: &Pubkey) -> Option<&AdaptorEntry> {
        self.adaptors.iter().find(|a| a.address == *address)
    }

    pub fn is_position_trusted(&self, id: u32) -> bool {
        self.position(id).map(|p| p.trusted).unwrap_or(false)
    }

    pub fn is_adaptor_trusted(&self, address: &Pubkey) -> bool {
        self.adaptor(address).map(|a| a.trusted).unwrap_or(false)
    }

    pub fn trusted_adaptor(&self, address: &Pubkey) -> Result<&AdaptorEntry> {
        self.adaptor(address)
            .filter(|a| a.trusted)
            .ok_or(error!(CellarError::NotTrusted))
    }

    /// A position usable for value-moving interaction: the id and its
    /// adaptor must both be trusted right now.
    pub fn trusted_position(&self, id: u32) -> Result<&PositionEntry> {
        let position = self
            .position(id)
            .filter(|p| p.trusted)
            .ok_or(error!(CellarError::NotTrusted))?;
        self.trusted_adaptor(&position.adaptor)?;
        Ok(position)
    }

    /// Implementation behind an adaptor regardless of trust, for valuation
    pub fn implementation(&self, address: &Pubkey) -> Result<&'static dyn Adaptor> {
        self.adaptor(address)
            .map(|a| a.implementation())
            .ok_or(error!(CellarError::NotTrusted))
    }
}

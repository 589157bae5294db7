use anchor_lang::prelude::*;

/// Custom error codes for the Cellar program
///
/// Every error aborts the whole instruction; the runtime discards all
/// account writes made before it.
#[error_code]
pub enum CellarError {
    // Authorization
    #[msg("Unauthorized - caller lacks the required governance or strategist role")]
    Unauthorized,

    // Registry state
    #[msg("Adaptor or position is not trusted by the registry")]
    NotTrusted,

    #[msg("Adaptor or position is already trusted")]
    AlreadyTrusted,

    #[msg("Adaptor identifier was already registered")]
    IdentifierNotUnique,

    #[msg("Position id must be non-zero")]
    InvalidPositionId,

    #[msg("Adaptor and adaptor data pair is already registered under another id")]
    PositionAlreadyRegistered,

    #[msg("Registry is full")]
    RegistryFull,

    #[msg("Cellar is paused by the registry")]
    Paused,

    // Adaptor policy
    #[msg("Position does not allow user withdrawals")]
    UserWithdrawsNotAllowed,

    #[msg("Position does not allow user deposits")]
    UserDepositsNotAllowed,

    #[msg("Adaptor data could not be decoded")]
    InvalidAdaptorData,

    #[msg("Configuration data could not be decoded")]
    InvalidConfigurationData,

    #[msg("Adaptor does not support this strategist call")]
    UnsupportedAdaptorCall,

    #[msg("Adaptor call left a token approval outstanding")]
    OutstandingApproval,

    // Liquidity
    #[msg("Withdrawable liquidity is below the requested amount")]
    InsufficientLiquidity,

    // Pricing
    #[msg("No price extension is registered for the asset")]
    PriceNotAvailable,

    #[msg("Oracle price is older than the allowed age")]
    StalePrice,

    #[msg("Oracle returned a non-positive price")]
    InvalidPrice,

    #[msg("Oracle price is outside the configured bounds")]
    PriceOutOfBounds,

    #[msg("Oracle confidence interval is too wide")]
    PriceConfidenceTooWide,

    #[msg("Live price deviates from the expected answer")]
    BadAnswer,

    #[msg("Price extensions nest too deeply")]
    ExtensionDepthExceeded,

    #[msg("Asset is already supported by the price router")]
    AssetAlreadySupported,

    #[msg("Price extension configuration is invalid")]
    InvalidExtension,

    // Rebalance guards
    #[msg("Total assets moved outside the allowed rebalance deviation")]
    SlippageExceeded,

    #[msg("Total assets fell below the requested minimum")]
    MinimumOutputNotMet,

    #[msg("Share supply changed during a rebalance")]
    TotalSharesChanged,

    #[msg("Debt exceeds assets counted toward solvency")]
    Insolvent,

    // Share accounting
    #[msg("Math overflow occurred during calculation")]
    MathOverflow,

    #[msg("Cannot divide by zero")]
    DivisionByZero,

    #[msg("Amount must be greater than zero")]
    ZeroAmount,

    #[msg("Operation would mint or burn zero shares")]
    ZeroShares,

    #[msg("First deposit is below the cellar minimum")]
    DepositBelowMinimum,

    #[msg("Share supply would be left between zero and the minimum supply")]
    DustShareSupply,

    #[msg("Share supply cap exceeded")]
    ShareSupplyCapExceeded,

    #[msg("Cellar is shut down")]
    Shutdown,

    #[msg("Reentrant call rejected")]
    Reentrancy,

    // Positions
    #[msg("Position is already used by the cellar")]
    PositionAlreadyUsed,

    #[msg("Position is not used by the cellar")]
    PositionNotUsed,

    #[msg("Cellar position list is full")]
    PositionArrayFull,

    #[msg("Position still holds a balance")]
    PositionNotEmpty,

    #[msg("Position is not in the cellar catalogue")]
    PositionNotInCatalogue,

    #[msg("Adaptor is not in the cellar catalogue")]
    AdaptorNotInCatalogue,

    #[msg("Cellar catalogue is full")]
    CatalogueFull,

    #[msg("Position debt flag does not match its adaptor")]
    DebtMismatch,

    #[msg("Position asset does not match the cellar asset")]
    AssetMismatch,

    #[msg("Cellar has no holding position")]
    HoldingPositionNotSet,

    #[msg("Holding position cannot be removed")]
    RemovingHoldingPosition,

    #[msg("Position is still trusted by the registry")]
    PositionStillTrusted,

    #[msg("Position index out of range")]
    InvalidIndex,

    #[msg("Cellar settings are invalid")]
    InvalidSettings,

    // Host
    #[msg("Required account was not supplied")]
    MissingAccount,

    #[msg("Token account is not the associated token account of its owner and mint")]
    InvalidTokenAccount,

    // Fees
    #[msg("Fee configuration is invalid")]
    InvalidFeeConfig,

    #[msg("No fees to distribute")]
    NoFeesToDistribute,

    // Share price oracle
    #[msg("Share price oracle configuration is invalid")]
    InvalidOracleConfig,

    #[msg("Share price oracle upkeep is not needed")]
    UpkeepNotNeeded,
}

impl CellarError {
    /// Conditions that can clear without any role or configuration change,
    /// so off-chain tooling may resubmit later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CellarError::StalePrice
                | CellarError::PriceConfidenceTooWide
                | CellarError::InsufficientLiquidity
                | CellarError::SlippageExceeded
                | CellarError::MinimumOutputNotMet
                | CellarError::Paused
                | CellarError::Reentrancy
                | CellarError::UpkeepNotNeeded
        )
    }
}

pub mod cellar;
pub mod fees;
pub mod price_router;
pub mod registry;
pub mod share_price_oracle;

pub use cellar::*;
pub use fees::*;
pub use price_router::*;
pub use registry::*;
pub use share_price_oracle::*;

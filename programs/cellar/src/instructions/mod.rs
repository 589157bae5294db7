pub mod cellar_admin;
pub mod deposit;
pub mod fee_collection;
pub mod oracle_upkeep;
pub mod positions;
pub mod price_router_admin;
pub mod rebalance;
pub mod registry_admin;
pub mod withdraw;

pub use cellar_admin::*;
pub use deposit::*;
pub use fee_collection::*;
pub use oracle_upkeep::*;
pub use positions::*;
pub use price_router_admin::*;
pub use rebalance::*;
pub use registry_admin::*;
pub use withdraw::*;

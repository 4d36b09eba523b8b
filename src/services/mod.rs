mod refresher;
mod sweeper;

pub use refresher::SupplierRefresher;
pub use sweeper::{SweepReport, Sweeper, SweeperConfig};

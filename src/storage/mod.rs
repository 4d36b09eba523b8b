mod memory;
mod postgres;
mod traits;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use traits::{Ledger, OrderStore, SupplierStore, WalletStore};

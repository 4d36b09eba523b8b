mod balance;
mod order;
mod pricing;
mod supplier;
mod wallet;

pub use balance::{
    BalanceTransaction, Balances, Currency, TransactionKind, User, USDT_PER_TRX,
};
pub use order::{Order, OrderStatus, RentalDuration};
pub use pricing::{rental_cost, MAX_ENERGY_AMOUNT, MIN_ENERGY_AMOUNT};
pub use supplier::{SupplierAccount, FEE_RESERVE_TRX};
pub use wallet::{is_valid_tron_address, UserWallet};

//! Group share capital.
//!
//! [`SharesEngine`] runs every share operation. Each monetary operation
//! settles its wallet legs, share counts and ledger entries in one store
//! transaction, so no reader ever sees a half-applied purchase or transfer.

pub mod dividends;
pub mod engine;
pub mod offerings;
pub mod register;
pub mod trading;

pub use dividends::{DividendCertificatePurchase, NewDividend};
pub use engine::SharesEngine;
pub use offerings::NewOffering;
pub use register::RegisterEntry;
pub use trading::{SharePurchase, ShareTransfer};

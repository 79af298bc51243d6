mod ledger;
mod money;
mod transaction;

pub use ledger::*;
pub use money::*;
pub use transaction::*;

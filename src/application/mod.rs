pub mod builder;
pub mod reactor;
pub mod simple;
pub mod wallet;

pub use builder::{BaseTxBuilder, BuildStep};
pub use reactor::{Reactor, WalletEvent};
pub use simple::{NextTrigger, UpdateOutcome};
pub use wallet::{SendRequest, WalletObserver, WalletService};

mod memory;
mod observable;
mod rocks;
mod traits;

pub use memory::MemoryWalletStore;
pub use observable::{ObservableStore, StoreObserver};
pub use rocks::RocksWalletStore;
pub use traits::{AddressStore, CoinStore, ParameterStore, ParameterStoreExt, VariablesStore, WalletStorage};

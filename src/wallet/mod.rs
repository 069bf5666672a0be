pub mod service;
pub mod sync;
pub mod types;

pub use service::WalletService;
pub use types::*;

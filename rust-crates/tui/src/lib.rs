pub mod deposit;
pub mod round_client;
pub mod simulation;
pub mod wallets;

pub use wheel;

pub mod export;
pub mod session;
pub mod upload;
pub mod wizard;

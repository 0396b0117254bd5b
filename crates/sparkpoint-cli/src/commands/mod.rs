pub mod owners;
pub mod session;
pub mod stations;

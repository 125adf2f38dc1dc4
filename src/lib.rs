pub mod clock;
pub mod config;
pub mod duration;
mod fs_util;
pub mod ledger;
pub mod models;
pub mod rates;
pub mod session;
pub mod storage;

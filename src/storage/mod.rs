mod json_file;
mod memory;

pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;

use anyhow::Result;

use crate::models::{Portfolio, User, UserId};

/// Storage trait for persisting users and their portfolios.
///
/// Users and portfolios are stored independently and joined by `user_id`;
/// a portfolio without a user (or the reverse) is not an error.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    // Users
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;
    async fn find_user(&self, username: &str) -> Result<Option<User>>;
    /// Inserts `user`, or replaces the record with the same id.
    async fn save_user(&self, user: &User) -> Result<()>;

    // Portfolios
    async fn list_portfolios(&self) -> Result<Vec<Portfolio>>;
    async fn get_portfolio(&self, user_id: UserId) -> Result<Option<Portfolio>>;
    /// Inserts `portfolio`, or replaces the one owned by the same user.
    async fn save_portfolio(&self, portfolio: &Portfolio) -> Result<()>;
}

//! In-memory storage implementation for testing.

use std::collections::BTreeMap;

use anyhow::Result;
use tokio::sync::Mutex;

use super::Storage;
use crate::models::{Portfolio, User, UserId};

/// In-memory storage for testing purposes.
pub struct MemoryStorage {
    users: Mutex<BTreeMap<UserId, User>>,
    portfolios: Mutex<BTreeMap<UserId, Portfolio>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(BTreeMap::new()),
            portfolios: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn list_users(&self) -> Result<Vec<User>> {
        let users = self.users.lock().await;
        Ok(users.values().cloned().collect())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.get(&id).cloned())
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.lock().await;
        users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn list_portfolios(&self) -> Result<Vec<Portfolio>> {
        let portfolios = self.portfolios.lock().await;
        Ok(portfolios.values().cloned().collect())
    }

    async fn get_portfolio(&self, user_id: UserId) -> Result<Option<Portfolio>> {
        let portfolios = self.portfolios.lock().await;
        Ok(portfolios.get(&user_id).cloned())
    }

    async fn save_portfolio(&self, portfolio: &Portfolio) -> Result<()> {
        let mut portfolios = self.portfolios.lock().await;
        portfolios.insert(portfolio.user_id(), portfolio.clone());
        Ok(())
    }
}

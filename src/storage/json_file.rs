use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use super::Storage;
use crate::fs_util::{read_json, write_json_atomic};
use crate::models::{Portfolio, User, UserId};

/// JSON file-based storage implementation.
///
/// Directory structure:
/// ```text
/// data/
///   users.json        [{"user_id": 1, "username": "alice", ...}, ...]
///   portfolios.json   [{"user_id": 1, "wallets": {"BTC": {"balance": 0.5}}}, ...]
/// ```
///
/// Each save rewrites the whole array through a temp file and a rename.
pub struct JsonFileStorage {
    base_path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn users_file(&self) -> PathBuf {
        self.base_path.join("users.json")
    }

    pub fn portfolios_file(&self) -> PathBuf {
        self.base_path.join("portfolios.json")
    }

    async fn read_array<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        let items: Option<Vec<T>> = read_json(path).await?;
        Ok(items.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl Storage for JsonFileStorage {
    async fn list_users(&self) -> Result<Vec<User>> {
        self.read_array(&self.users_file()).await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let users = self.list_users().await?;
        Ok(users.into_iter().find(|u| u.user_id == id))
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>> {
        let users = self.list_users().await?;
        Ok(users.into_iter().find(|u| u.username == username))
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        let path = self.users_file();
        let mut users = self.list_users().await?;
        match users.iter_mut().find(|u| u.user_id == user.user_id) {
            Some(existing) => *existing = user.clone(),
            None => users.push(user.clone()),
        }
        write_json_atomic(&path, &users).await?;
        debug!(path = %path.display(), user_id = %user.user_id, "User saved");
        Ok(())
    }

    async fn list_portfolios(&self) -> Result<Vec<Portfolio>> {
        self.read_array(&self.portfolios_file()).await
    }

    async fn get_portfolio(&self, user_id: UserId) -> Result<Option<Portfolio>> {
        let portfolios = self.list_portfolios().await?;
        Ok(portfolios.into_iter().find(|p| p.user_id() == user_id))
    }

    async fn save_portfolio(&self, portfolio: &Portfolio) -> Result<()> {
        let path = self.portfolios_file();
        let mut portfolios = self.list_portfolios().await?;
        match portfolios
            .iter_mut()
            .find(|p| p.user_id() == portfolio.user_id())
        {
            Some(existing) => *existing = portfolio.clone(),
            None => portfolios.push(portfolio.clone()),
        }
        write_json_atomic(&path, &portfolios).await?;
        debug!(path = %path.display(), user_id = %portfolio.user_id(), "Portfolio saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CurrencyCode;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use secrecy::SecretString;
    use tempfile::TempDir;

    fn user(id: u64, name: &str) -> User {
        let registered = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        User::new(
            UserId::new(id),
            name,
            &SecretString::from("password".to_string()),
            registered,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_empty_directory_has_no_records() -> Result<()> {
        let dir = TempDir::new()?;
        let storage = JsonFileStorage::new(dir.path());
        assert!(storage.list_users().await?.is_empty());
        assert!(storage.get_portfolio(UserId::new(1)).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_user_inserts_then_replaces() -> Result<()> {
        let dir = TempDir::new()?;
        let storage = JsonFileStorage::new(dir.path());

        storage.save_user(&user(1, "alice")).await?;
        storage.save_user(&user(2, "bob")).await?;
        let mut renamed = user(1, "alice");
        renamed.username = "alicia".to_string();
        storage.save_user(&renamed).await?;

        let users = storage.list_users().await?;
        assert_eq!(users.len(), 2);
        assert_eq!(storage.find_user("alicia").await?.unwrap().user_id, UserId::new(1));
        assert!(storage.find_user("alice").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_users_file_is_a_json_array() -> Result<()> {
        let dir = TempDir::new()?;
        let storage = JsonFileStorage::new(dir.path());
        storage.save_user(&user(7, "carol")).await?;

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(storage.users_file())?)?;
        assert_eq!(raw[0]["user_id"], 7);
        assert_eq!(raw[0]["username"], "carol");
        assert!(raw[0]["hashed_password"].is_string());
        assert!(raw[0]["salt"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn test_portfolio_round_trip() -> Result<()> {
        let dir = TempDir::new()?;
        let storage = JsonFileStorage::new(dir.path());
        let btc = CurrencyCode::parse("BTC")?;

        let mut portfolio = Portfolio::new(UserId::new(1));
        portfolio.wallet_or_insert(&btc).deposit(dec!(0.5))?;
        storage.save_portfolio(&portfolio).await?;
        storage.save_portfolio(&Portfolio::new(UserId::new(2))).await?;

        let loaded = storage.get_portfolio(UserId::new(1)).await?.unwrap();
        assert_eq!(loaded, portfolio);
        assert_eq!(storage.list_portfolios().await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_users_file_is_an_error() -> Result<()> {
        let dir = TempDir::new()?;
        let storage = JsonFileStorage::new(dir.path());
        std::fs::write(storage.users_file(), "{not json")?;

        assert!(storage.list_users().await.is_err());
        Ok(())
    }
}

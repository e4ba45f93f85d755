//! Account service for managing registered Gmail accounts.

use tracing::info;

use super::error::{ensure_range, ensure_not_blank, ServiceError, ServiceResult};
use crate::domain::{Account, AccountId, AccountSettingsUpdate, NewAccount, TokenUpdate};
use crate::storage::{queries::accounts, Database};

/// Bounds for an account's fetch interval, in minutes.
pub const FETCH_INTERVAL_RANGE: (i64, i64) = (1, 1440);

/// Service for account CRUD.
#[derive(Debug, Clone)]
pub struct AccountService {
    db: Database,
}

impl AccountService {
    /// Creates a new account service.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Registers an account. Rejects an email that is already registered.
    pub async fn create(&self, account: &NewAccount) -> ServiceResult<Account> {
        validate_email(&account.email)?;

        if accounts::get_by_email(&self.db, &account.email)
            .await?
            .is_some()
        {
            return Err(ServiceError::Rejected(
                "Account with this email already exists".to_string(),
            ));
        }

        let created = accounts::insert(&self.db, account).await?;
        info!(account_id = %created.id, email = %created.email, "Created account");
        Ok(created)
    }

    /// Gets an account by ID.
    pub async fn get(&self, id: AccountId) -> ServiceResult<Account> {
        accounts::get_by_id(&self.db, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Account not found".to_string()))
    }

    /// Gets an account by email address.
    pub async fn get_by_email(&self, email: &str) -> ServiceResult<Option<Account>> {
        Ok(accounts::get_by_email(&self.db, email).await?)
    }

    /// Lists accounts, optionally only the active ones.
    pub async fn list(&self, active_only: bool) -> ServiceResult<Vec<Account>> {
        Ok(accounts::list(&self.db, active_only).await?)
    }

    /// Replaces an account's OAuth tokens.
    pub async fn update_tokens(&self, id: AccountId, tokens: &TokenUpdate) -> ServiceResult<Account> {
        if accounts::update_tokens(&self.db, id, tokens).await? == 0 {
            return Err(ServiceError::NotFound("Account not found".to_string()));
        }
        self.get(id).await
    }

    /// Applies a partial settings update.
    pub async fn update_settings(
        &self,
        id: AccountId,
        update: &AccountSettingsUpdate,
    ) -> ServiceResult<Account> {
        if let Some(minutes) = update.fetch_interval_minutes {
            let (min, max) = FETCH_INTERVAL_RANGE;
            ensure_range("fetch_interval_minutes", minutes as i64, min, max)?;
        }
        if accounts::update_settings(&self.db, id, update).await? == 0 {
            return Err(ServiceError::NotFound("Account not found".to_string()));
        }
        self.get(id).await
    }

    /// Deletes an account.
    pub async fn delete(&self, id: AccountId) -> ServiceResult<()> {
        if !accounts::delete(&self.db, id).await? {
            return Err(ServiceError::NotFound("Account not found".to_string()));
        }
        info!(account_id = %id, "Deleted account");
        Ok(())
    }
}

/// Minimal shape check: one `@` with a dotted domain.
/// Fails with `NotFound` when `account_id` names no registered account.
pub(crate) async fn ensure_account_exists(
    db: &Database,
    account_id: Option<AccountId>,
) -> ServiceResult<()> {
    if let Some(id) = account_id {
        if accounts::get_by_id(db, id).await?.is_none() {
            return Err(ServiceError::NotFound("Account not found".to_string()));
        }
    }
    Ok(())
}

fn validate_email(email: &str) -> ServiceResult<()> {
    ensure_not_blank("email", email)?;
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ServiceError::Validation(
            "email must be a valid email address".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn service() -> AccountService {
        AccountService::new(Database::open_in_memory().await.unwrap())
    }

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            access_token: "token".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let svc = service().await;
        svc.create(&new_account("a@example.com")).await.unwrap();

        let err = svc.create(&new_account("a@example.com")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(_)));
        assert_eq!(err.to_string(), "Account with this email already exists");
    }

    #[tokio::test]
    async fn create_rejects_invalid_email() {
        let svc = service().await;
        for bad in ["", "no-at-sign", "a@b", "a b@example.com", "@example.com"] {
            let err = svc.create(&new_account(bad)).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "{bad}");
        }
    }

    #[tokio::test]
    async fn update_settings_validates_interval() {
        let svc = service().await;
        let account = svc.create(&new_account("i@example.com")).await.unwrap();

        let too_long = AccountSettingsUpdate {
            fetch_interval_minutes: Some(1441),
            ..Default::default()
        };
        assert!(matches!(
            svc.update_settings(account.id, &too_long).await,
            Err(ServiceError::Validation(_))
        ));

        let ok = AccountSettingsUpdate {
            fetch_interval_minutes: Some(30),
            fetch_enabled: Some(false),
            ..Default::default()
        };
        let updated = svc.update_settings(account.id, &ok).await.unwrap();
        assert_eq!(updated.fetch_interval_minutes, 30);
        assert!(!updated.fetch_enabled);
        assert!(updated.is_active);
    }

    #[tokio::test]
    async fn missing_account_is_not_found() {
        let svc = service().await;
        assert!(matches!(
            svc.get(AccountId(42)).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            svc.delete(AccountId(42)).await,
            Err(ServiceError::NotFound(_))
        ));
        let tokens = TokenUpdate {
            access_token: "x".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            svc.update_tokens(AccountId(42), &tokens).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}

//! Account CRUD operations.
//!
//! Provides database operations for account entities.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{now, parse_opt_sql_time, parse_sql_time, to_sql_time};
use crate::domain::{
    Account, AccountId, AccountSettingsUpdate, NewAccount, TokenUpdate,
    DEFAULT_FETCH_INTERVAL_MINUTES,
};
use crate::storage::database::{Database, Result};

const SELECT_ACCOUNT: &str = r#"
    SELECT
        id, email, name, access_token, refresh_token, token_expiry,
        is_active, fetch_enabled, fetch_interval_minutes, created_at, updated_at
    FROM accounts
"#;

/// Inserts a new account and returns the stored row.
pub async fn insert(db: &Database, account: &NewAccount) -> Result<Account> {
    let account = account.clone();

    db.with_conn(move |conn| {
        let now = now();
        conn.execute(
            r#"
            INSERT INTO accounts (
                email, name, access_token, refresh_token, token_expiry,
                is_active, fetch_enabled, fetch_interval_minutes,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 1, 1, ?6, ?7, ?7)
            "#,
            params![
                account.email,
                account.name,
                account.access_token,
                account.refresh_token,
                account.token_expiry.as_ref().map(to_sql_time),
                DEFAULT_FETCH_INTERVAL_MINUTES,
                now,
            ],
        )?;

        let id = AccountId(conn.last_insert_rowid());
        Ok(select_by_id(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?)
    })
    .await
}

/// Retrieves an account by its ID.
pub async fn get_by_id(db: &Database, account_id: AccountId) -> Result<Option<Account>> {
    db.with_conn(move |conn| Ok(select_by_id(conn, account_id)?))
        .await
}

/// Retrieves an account by email address.
pub async fn get_by_email(db: &Database, email: &str) -> Result<Option<Account>> {
    let email = email.to_string();

    db.with_conn(move |conn| {
        let sql = format!("{SELECT_ACCOUNT} WHERE email = ?1");
        let result = conn
            .query_row(&sql, [&email], row_to_account)
            .optional()?;
        Ok(result)
    })
    .await
}

/// Retrieves accounts, optionally only the active ones.
pub async fn list(db: &Database, active_only: bool) -> Result<Vec<Account>> {
    db.with_conn(move |conn| {
        let sql = if active_only {
            format!("{SELECT_ACCOUNT} WHERE is_active = 1 ORDER BY id")
        } else {
            format!("{SELECT_ACCOUNT} ORDER BY id")
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_account)?;
        let accounts: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(accounts?)
    })
    .await
}

/// Replaces an account's tokens.
///
/// The refresh token and expiry are only overwritten when provided.
/// Returns the number of rows changed.
pub async fn update_tokens(
    db: &Database,
    account_id: AccountId,
    tokens: &TokenUpdate,
) -> Result<usize> {
    let tokens = tokens.clone();

    db.with_conn(move |conn| {
        let changed = conn.execute(
            r#"
            UPDATE accounts SET
                access_token = ?1,
                refresh_token = COALESCE(?2, refresh_token),
                token_expiry = COALESCE(?3, token_expiry),
                updated_at = ?4
            WHERE id = ?5
            "#,
            params![
                tokens.access_token,
                tokens.refresh_token,
                tokens.token_expiry.as_ref().map(to_sql_time),
                now(),
                account_id.0,
            ],
        )?;
        Ok(changed)
    })
    .await
}

/// Applies a partial settings update. Returns the number of rows changed.
pub async fn update_settings(
    db: &Database,
    account_id: AccountId,
    update: &AccountSettingsUpdate,
) -> Result<usize> {
    let update = update.clone();

    db.with_conn(move |conn| {
        let changed = conn.execute(
            r#"
            UPDATE accounts SET
                is_active = COALESCE(?1, is_active),
                fetch_enabled = COALESCE(?2, fetch_enabled),
                fetch_interval_minutes = COALESCE(?3, fetch_interval_minutes),
                updated_at = ?4,
                name = COALESCE(?6, name)
            WHERE id = ?5
            "#,
            params![
                update.is_active,
                update.fetch_enabled,
                update.fetch_interval_minutes,
                now(),
                account_id.0,
                update.name,
            ],
        )?;
        Ok(changed)
    })
    .await
}

/// Deletes an account. Returns true if a row was removed.
pub async fn delete(db: &Database, account_id: AccountId) -> Result<bool> {
    db.with_conn(move |conn| {
        let changed = conn.execute("DELETE FROM accounts WHERE id = ?1", [account_id.0])?;
        Ok(changed > 0)
    })
    .await
}

fn select_by_id(conn: &Connection, account_id: AccountId) -> rusqlite::Result<Option<Account>> {
    let sql = format!("{SELECT_ACCOUNT} WHERE id = ?1");
    conn.query_row(&sql, [account_id.0], row_to_account)
        .optional()
}

/// Converts a database row to an Account.
fn row_to_account(row: &Row) -> rusqlite::Result<Account> {
    let token_expiry: Option<String> = row.get(5)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(Account {
        id: AccountId(row.get(0)?),
        email: row.get(1)?,
        name: row.get(2)?,
        access_token: row.get(3)?,
        refresh_token: row.get(4)?,
        token_expiry: parse_opt_sql_time(5, token_expiry)?,
        is_active: row.get(6)?,
        fetch_enabled: row.get(7)?,
        fetch_interval_minutes: row.get(8)?,
        created_at: parse_sql_time(9, &created_at)?,
        updated_at: parse_sql_time(10, &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            name: Some("Test".to_string()),
            access_token: "token-1".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            token_expiry: None,
        }
    }

    #[tokio::test]
    async fn insert_and_get_account() {
        let db = Database::open_in_memory().await.unwrap();

        let account = insert(&db, &new_account("user@example.com")).await.unwrap();
        assert_eq!(account.email, "user@example.com");
        assert!(account.is_active);
        assert!(account.fetch_enabled);
        assert_eq!(account.fetch_interval_minutes, 15);

        let fetched = get_by_id(&db, account.id).await.unwrap().unwrap();
        assert_eq!(fetched, account);

        let by_email = get_by_email(&db, "user@example.com").await.unwrap();
        assert_eq!(by_email.map(|a| a.id), Some(account.id));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        insert(&db, &new_account("dup@example.com")).await.unwrap();
        assert!(insert(&db, &new_account("dup@example.com")).await.is_err());
    }

    #[tokio::test]
    async fn update_tokens_keeps_refresh_token_when_absent() {
        let db = Database::open_in_memory().await.unwrap();
        let account = insert(&db, &new_account("t@example.com")).await.unwrap();

        let changed = update_tokens(
            &db,
            account.id,
            &TokenUpdate {
                access_token: "token-2".to_string(),
                refresh_token: None,
                token_expiry: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(changed, 1);

        let fetched = get_by_id(&db, account.id).await.unwrap().unwrap();
        assert_eq!(fetched.access_token, "token-2");
        assert_eq!(fetched.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn list_active_only_filters_inactive() {
        let db = Database::open_in_memory().await.unwrap();
        let a = insert(&db, &new_account("a@example.com")).await.unwrap();
        insert(&db, &new_account("b@example.com")).await.unwrap();

        update_settings(
            &db,
            a.id,
            &AccountSettingsUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(list(&db, false).await.unwrap().len(), 2);
        let active = list(&db, true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].email, "b@example.com");
    }

    #[tokio::test]
    async fn delete_account() {
        let db = Database::open_in_memory().await.unwrap();
        let a = insert(&db, &new_account("gone@example.com")).await.unwrap();
        assert!(delete(&db, a.id).await.unwrap());
        assert!(!delete(&db, a.id).await.unwrap());
        assert!(get_by_id(&db, a.id).await.unwrap().is_none());
    }
}

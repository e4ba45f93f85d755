//! Category CRUD operations.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{now, parse_sql_time};
use crate::domain::{AccountId, Category, CategoryId, CategoryUpdate, NewCategory, DEFAULT_COLOR};
use crate::storage::database::{Database, Result};

const SELECT_CATEGORY: &str = r#"
    SELECT
        id, name, description, color, icon, is_system, email_count,
        account_id, created_at, updated_at
    FROM categories
"#;

const ORDER_CATEGORIES: &str = "ORDER BY is_system DESC, email_count DESC, name";

/// Inserts a category unless one with the same name already exists in its
/// scope. Returns the stored row and whether it was created.
pub async fn insert(db: &Database, category: &NewCategory) -> Result<(Category, bool)> {
    let category = category.clone();

    db.with_conn(move |conn| {
        let now = now();
        let account_id = category.account_id.map(|a| a.0);
        let inserted = conn.execute(
            r#"
            INSERT INTO categories (
                name, description, color, icon, is_system, email_count,
                account_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?7)
            ON CONFLICT DO NOTHING
            "#,
            params![
                category.name,
                category.description,
                category.color.as_deref().unwrap_or(DEFAULT_COLOR),
                category.icon,
                category.is_system,
                account_id,
                now,
            ],
        )?;

        let stored = if inserted > 0 {
            select_by_id(conn, CategoryId(conn.last_insert_rowid()))?
        } else {
            select_by_name(conn, &category.name, account_id)?
        };
        Ok((stored.ok_or(rusqlite::Error::QueryReturnedNoRows)?, inserted > 0))
    })
    .await
}

/// Retrieves a category by its ID.
pub async fn get_by_id(db: &Database, id: CategoryId) -> Result<Option<Category>> {
    db.with_conn(move |conn| Ok(select_by_id(conn, id)?)).await
}

/// Finds a category by name within a scope. `None` means the global scope.
pub async fn find_by_name(
    db: &Database,
    name: &str,
    account_id: Option<AccountId>,
) -> Result<Option<Category>> {
    let name = name.to_string();

    db.with_conn(move |conn| Ok(select_by_name(conn, &name, account_id.map(|a| a.0))?))
        .await
}

/// Lists categories visible from a scope.
///
/// With an account, returns that account's categories plus the global ones
/// when `include_global` is set. Without an account, returns global only.
pub async fn list(
    db: &Database,
    account_id: Option<AccountId>,
    include_global: bool,
) -> Result<Vec<Category>> {
    db.with_conn(move |conn| {
        let (filter, param) = match (account_id, include_global) {
            (Some(id), true) => ("WHERE account_id = ?1 OR account_id IS NULL", Some(id.0)),
            (Some(id), false) => ("WHERE account_id = ?1", Some(id.0)),
            (None, _) => ("WHERE account_id IS NULL", None),
        };
        let sql = format!("{SELECT_CATEGORY} {filter} {ORDER_CATEGORIES}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = match param {
            Some(id) => stmt.query_map([id], row_to_category)?,
            None => stmt.query_map([], row_to_category)?,
        };
        let categories: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(categories?)
    })
    .await
}

/// Applies a partial update. Returns the number of rows changed.
pub async fn update(db: &Database, id: CategoryId, update: &CategoryUpdate) -> Result<usize> {
    let update = update.clone();

    db.with_conn(move |conn| {
        let changed = conn.execute(
            r#"
            UPDATE categories SET
                name = COALESCE(?1, name),
                description = COALESCE(?2, description),
                color = COALESCE(?3, color),
                icon = COALESCE(?4, icon),
                updated_at = ?5
            WHERE id = ?6
            "#,
            params![
                update.name,
                update.description,
                update.color,
                update.icon,
                now(),
                id.0,
            ],
        )?;
        Ok(changed)
    })
    .await
}

/// Deletes a non-system category. Returns true if a row was removed.
pub async fn delete_custom(db: &Database, id: CategoryId) -> Result<bool> {
    db.with_conn(move |conn| {
        let changed = conn.execute(
            "DELETE FROM categories WHERE id = ?1 AND is_system = 0",
            [id.0],
        )?;
        Ok(changed > 0)
    })
    .await
}

/// Increments the email count of the named category.
///
/// Prefers the account-scoped category and falls back to the global one.
/// Returns the number of rows changed.
pub async fn increment_count(
    db: &Database,
    name: &str,
    account_id: Option<AccountId>,
) -> Result<usize> {
    let name = name.to_string();

    db.with_conn(move |conn| {
        let now = now();
        let mut changed = 0;
        if let Some(id) = account_id {
            changed = conn.execute(
                r#"
                UPDATE categories SET email_count = email_count + 1, updated_at = ?1
                WHERE name = ?2 AND account_id = ?3
                "#,
                params![now, name, id.0],
            )?;
        }
        if changed == 0 {
            changed = conn.execute(
                r#"
                UPDATE categories SET email_count = email_count + 1, updated_at = ?1
                WHERE name = ?2 AND account_id IS NULL
                "#,
                params![now, name],
            )?;
        }
        Ok(changed)
    })
    .await
}

fn select_by_id(conn: &Connection, id: CategoryId) -> rusqlite::Result<Option<Category>> {
    let sql = format!("{SELECT_CATEGORY} WHERE id = ?1");
    conn.query_row(&sql, [id.0], row_to_category).optional()
}

fn select_by_name(
    conn: &Connection,
    name: &str,
    account_id: Option<i64>,
) -> rusqlite::Result<Option<Category>> {
    let sql = format!("{SELECT_CATEGORY} WHERE name = ?1 AND IFNULL(account_id, 0) = IFNULL(?2, 0)");
    conn.query_row(&sql, params![name, account_id], row_to_category)
        .optional()
}

/// Converts a database row to a Category.
fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
    let account_id: Option<i64> = row.get(7)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Category {
        id: CategoryId(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        color: row.get(3)?,
        icon: row.get(4)?,
        is_system: row.get(5)?,
        email_count: row.get(6)?,
        account_id: account_id.map(AccountId),
        created_at: parse_sql_time(8, &created_at)?,
        updated_at: parse_sql_time(9, &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewAccount;
    use crate::storage::queries::accounts;
    use pretty_assertions::assert_eq;

    fn named(name: &str, account_id: Option<AccountId>) -> NewCategory {
        NewCategory {
            name: name.to_string(),
            account_id,
            ..Default::default()
        }
    }

    async fn account(db: &Database) -> AccountId {
        accounts::insert(
            db,
            &NewAccount {
                email: "owner@example.com".to_string(),
                access_token: "t".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn insert_uses_default_color() {
        let db = Database::open_in_memory().await.unwrap();
        let (cat, created) = insert(&db, &named("Travel", None)).await.unwrap();
        assert!(created);
        assert_eq!(cat.color, "#808080");
        assert_eq!(cat.email_count, 0);
        assert!(!cat.is_system);
    }

    #[tokio::test]
    async fn insert_returns_existing_row_on_name_conflict() {
        let db = Database::open_in_memory().await.unwrap();
        let (first, _) = insert(&db, &named("Travel", None)).await.unwrap();
        let (again, created) = insert(&db, &named("Travel", None)).await.unwrap();
        assert!(!created);
        assert_eq!(again.id, first.id);
    }

    #[tokio::test]
    async fn find_by_name_respects_scope() {
        let db = Database::open_in_memory().await.unwrap();
        let owner = account(&db).await;
        insert(&db, &named("Travel", Some(owner))).await.unwrap();

        assert!(find_by_name(&db, "Travel", None).await.unwrap().is_none());
        let scoped = find_by_name(&db, "Travel", Some(owner)).await.unwrap();
        assert_eq!(scoped.and_then(|c| c.account_id), Some(owner));
    }

    #[tokio::test]
    async fn list_scopes() {
        let db = Database::open_in_memory().await.unwrap();
        let owner = account(&db).await;
        insert(&db, &named("Global", None)).await.unwrap();
        insert(&db, &named("Mine", Some(owner))).await.unwrap();

        let names = |cats: Vec<Category>| cats.into_iter().map(|c| c.name).collect::<Vec<_>>();

        assert_eq!(names(list(&db, None, true).await.unwrap()), vec!["Global"]);
        assert_eq!(
            names(list(&db, Some(owner), false).await.unwrap()),
            vec!["Mine"]
        );
        assert_eq!(list(&db, Some(owner), true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_orders_by_usage() {
        let db = Database::open_in_memory().await.unwrap();
        insert(&db, &named("Quiet", None)).await.unwrap();
        insert(&db, &named("Busy", None)).await.unwrap();
        increment_count(&db, "Busy", None).await.unwrap();

        let cats = list(&db, None, true).await.unwrap();
        assert_eq!(cats[0].name, "Busy");
        assert_eq!(cats[0].email_count, 1);
    }

    #[tokio::test]
    async fn increment_falls_back_to_global() {
        let db = Database::open_in_memory().await.unwrap();
        let owner = account(&db).await;
        insert(&db, &named("Billing", None)).await.unwrap();

        assert_eq!(increment_count(&db, "Billing", Some(owner)).await.unwrap(), 1);
        let global = find_by_name(&db, "Billing", None).await.unwrap().unwrap();
        assert_eq!(global.email_count, 1);
    }

    #[tokio::test]
    async fn system_categories_are_not_deleted() {
        let db = Database::open_in_memory().await.unwrap();
        let (system, _) = insert(
            &db,
            &NewCategory {
                is_system: true,
                ..named("Spam", None)
            },
        )
        .await
        .unwrap();
        let (custom, _) = insert(&db, &named("Custom", None)).await.unwrap();

        assert!(!delete_custom(&db, system.id).await.unwrap());
        assert!(delete_custom(&db, custom.id).await.unwrap());
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let db = Database::open_in_memory().await.unwrap();
        let (cat, _) = insert(
            &db,
            &NewCategory {
                description: Some("before".to_string()),
                ..named("Edit", None)
            },
        )
        .await
        .unwrap();

        update(
            &db,
            cat.id,
            &CategoryUpdate {
                color: Some("#000000".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let updated = get_by_id(&db, cat.id).await.unwrap().unwrap();
        assert_eq!(updated.color, "#000000");
        assert_eq!(updated.description.as_deref(), Some("before"));
    }
}

//! Reply template CRUD operations.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{now, parse_opt_sql_time, parse_sql_time};
use crate::domain::{AccountId, NewTemplate, Template, TemplateId, TemplateUpdate};
use crate::storage::database::{Database, Result};

const SELECT_TEMPLATE: &str = r#"
    SELECT
        id, name, description, subject_template, body_template, category, tags,
        usage_count, last_used, account_id, created_at, updated_at
    FROM templates
"#;

/// Inserts a new template and returns the stored row.
pub async fn insert(db: &Database, template: &NewTemplate) -> Result<Template> {
    let template = template.clone();

    db.with_conn(move |conn| {
        let now = now();
        conn.execute(
            r#"
            INSERT INTO templates (
                name, description, subject_template, body_template, category, tags,
                usage_count, account_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?8)
            "#,
            params![
                template.name,
                template.description,
                template.subject_template,
                template.body_template,
                template.category,
                template.tags,
                template.account_id.map(|a| a.0),
                now,
            ],
        )?;

        let id = TemplateId(conn.last_insert_rowid());
        Ok(select_by_id(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?)
    })
    .await
}

/// Retrieves a template by its ID.
pub async fn get_by_id(db: &Database, id: TemplateId) -> Result<Option<Template>> {
    db.with_conn(move |conn| Ok(select_by_id(conn, id)?)).await
}

/// Lists templates, most used first.
pub async fn list(
    db: &Database,
    category: Option<String>,
    account_id: Option<AccountId>,
) -> Result<Vec<Template>> {
    db.with_conn(move |conn| {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        if let Some(category) = category {
            clauses.push("category = ?");
            values.push(Value::Text(category));
        }
        if let Some(account_id) = account_id {
            clauses.push("account_id = ?");
            values.push(Value::Integer(account_id.0));
        }
        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let sql = format!("{SELECT_TEMPLATE} {filter} ORDER BY usage_count DESC, id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), row_to_template)?;
        let templates: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(templates?)
    })
    .await
}

/// Applies a partial update. Returns the number of rows changed.
pub async fn update(db: &Database, id: TemplateId, update: &TemplateUpdate) -> Result<usize> {
    let update = update.clone();

    db.with_conn(move |conn| {
        let changed = conn.execute(
            r#"
            UPDATE templates SET
                name = COALESCE(?1, name),
                description = COALESCE(?2, description),
                subject_template = COALESCE(?3, subject_template),
                body_template = COALESCE(?4, body_template),
                category = COALESCE(?5, category),
                tags = COALESCE(?6, tags),
                updated_at = ?7
            WHERE id = ?8
            "#,
            params![
                update.name,
                update.description,
                update.subject_template,
                update.body_template,
                update.category,
                update.tags,
                now(),
                id.0,
            ],
        )?;
        Ok(changed)
    })
    .await
}

/// Bumps the usage counter and last-used time, returning the updated row.
pub async fn record_use(db: &Database, id: TemplateId) -> Result<Option<Template>> {
    db.with_conn(move |conn| {
        let now = now();
        let changed = conn.execute(
            r#"
            UPDATE templates SET usage_count = usage_count + 1, last_used = ?1, updated_at = ?1
            WHERE id = ?2
            "#,
            params![now, id.0],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(select_by_id(conn, id)?)
    })
    .await
}

/// Deletes a template. Returns true if a row was removed.
pub async fn delete(db: &Database, id: TemplateId) -> Result<bool> {
    db.with_conn(move |conn| {
        let changed = conn.execute("DELETE FROM templates WHERE id = ?1", [id.0])?;
        Ok(changed > 0)
    })
    .await
}

fn select_by_id(conn: &Connection, id: TemplateId) -> rusqlite::Result<Option<Template>> {
    let sql = format!("{SELECT_TEMPLATE} WHERE id = ?1");
    conn.query_row(&sql, [id.0], row_to_template).optional()
}

/// Converts a database row to a Template.
fn row_to_template(row: &Row) -> rusqlite::Result<Template> {
    let last_used: Option<String> = row.get(8)?;
    let account_id: Option<i64> = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(Template {
        id: TemplateId(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        subject_template: row.get(3)?,
        body_template: row.get(4)?,
        category: row.get(5)?,
        tags: row.get(6)?,
        usage_count: row.get(7)?,
        last_used: parse_opt_sql_time(8, last_used)?,
        account_id: account_id.map(AccountId),
        created_at: parse_sql_time(10, &created_at)?,
        updated_at: parse_sql_time(11, &updated_at)?,
    })
}

//! Email record CRUD, search and bulk operations.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{now, parse_sql_time, to_sql_time};
use crate::domain::{
    AccountId, EmailRecord, EmailRecordId, EmailStatus, NewEmail, Sentiment, ThreadId, Urgency,
    NO_SUBJECT, UNLABELED,
};
use crate::storage::database::{Database, Result};

const SELECT_EMAIL: &str = r#"
    SELECT
        id, gmail_id, account_id, thread_id, subject, snippet, body_text,
        from_email, to_email, has_attachments, category, sentiment, urgency,
        status, is_read, is_starred, created_at, updated_at
    FROM emails
"#;

const ORDER_NEWEST: &str = "ORDER BY created_at DESC, id DESC";

/// A stored record together with whether the upsert created it.
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted {
    pub record: EmailRecord,
    pub created: bool,
}

/// Filters for searching stored emails. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct EmailSearch {
    /// Case-insensitive substring matched against subject, body and snippet.
    pub query: Option<String>,
    /// Substring of the sender address.
    pub from_email: Option<String>,
    /// Substring of the subject.
    pub subject: Option<String>,
    pub category: Option<String>,
    pub status: Option<EmailStatus>,
    pub is_read: Option<bool>,
    pub is_starred: Option<bool>,
    pub account_id: Option<AccountId>,
    /// Inclusive lower bound on creation time.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on creation time.
    pub date_to: Option<DateTime<Utc>>,
    pub limit: u32,
    pub offset: u32,
}

impl EmailSearch {
    /// Builds the WHERE clause and its positional values.
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(query) = non_empty(&self.query) {
            clauses.push(
                "(unicode_lower(subject) LIKE ? ESCAPE '\\' \
                 OR unicode_lower(IFNULL(body_text, '')) LIKE ? ESCAPE '\\' \
                 OR unicode_lower(IFNULL(snippet, '')) LIKE ? ESCAPE '\\')",
            );
            let pattern = like_pattern(query);
            values.extend(std::iter::repeat(Value::Text(pattern)).take(3));
        }
        if let Some(from) = non_empty(&self.from_email) {
            clauses.push("unicode_lower(IFNULL(from_email, '')) LIKE ? ESCAPE '\\'");
            values.push(Value::Text(like_pattern(from)));
        }
        if let Some(subject) = non_empty(&self.subject) {
            clauses.push("unicode_lower(subject) LIKE ? ESCAPE '\\'");
            values.push(Value::Text(like_pattern(subject)));
        }
        if let Some(category) = non_empty(&self.category) {
            clauses.push("category = ?");
            values.push(Value::Text(category.to_string()));
        }
        if let Some(status) = self.status {
            clauses.push("status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(is_read) = self.is_read {
            clauses.push("is_read = ?");
            values.push(Value::Integer(is_read as i64));
        }
        if let Some(is_starred) = self.is_starred {
            clauses.push("is_starred = ?");
            values.push(Value::Integer(is_starred as i64));
        }
        if let Some(account_id) = self.account_id {
            clauses.push("account_id = ?");
            values.push(Value::Integer(account_id.0));
        }
        if let Some(from) = &self.date_from {
            clauses.push("created_at >= ?");
            values.push(Value::Text(to_sql_time(from)));
        }
        if let Some(to) = &self.date_to {
            clauses.push("created_at <= ?");
            values.push(Value::Text(to_sql_time(to)));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Lowercases a term and wraps it in `%` wildcards, escaping LIKE metacharacters.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Inserts or merges emails, matching existing rows on `gmail_id`.
///
/// On a match only the fields present in the input overwrite stored values.
/// All writes happen in one transaction. Results keep input order.
pub async fn upsert(db: &Database, emails: Vec<NewEmail>) -> Result<Vec<Upserted>> {
    db.transaction(move |tx| {
        let mut out = Vec::with_capacity(emails.len());
        for email in emails {
            let existing = match email.gmail_id.as_deref() {
                Some(gmail_id) => tx
                    .query_row(
                        "SELECT id FROM emails WHERE gmail_id = ?1",
                        [gmail_id],
                        |row| row.get::<_, i64>(0),
                    )
                    .optional()?,
                None => None,
            };

            let (id, created) = match existing {
                Some(id) => {
                    merge(tx, id, &email)?;
                    (id, false)
                }
                None => (insert_new(tx, &email)?, true),
            };

            let record = select_by_id(tx, EmailRecordId(id))?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            out.push(Upserted { record, created });
        }
        Ok(out)
    })
    .await
}

fn insert_new(conn: &Connection, email: &NewEmail) -> rusqlite::Result<i64> {
    let now = now();
    conn.execute(
        r#"
        INSERT INTO emails (
            gmail_id, account_id, thread_id, subject, snippet, body_text,
            from_email, to_email, has_attachments, category, sentiment, urgency,
            status, is_read, is_starred, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)
        "#,
        params![
            email.gmail_id,
            email.account_id.map(|a| a.0),
            email.thread_id.as_ref().map(|t| t.0.clone()),
            email.subject.as_deref().unwrap_or(NO_SUBJECT),
            email.snippet,
            email.body_text,
            email.from_email,
            email.to_email,
            email.has_attachments.unwrap_or(false),
            email.category.as_deref().unwrap_or(UNLABELED),
            email.sentiment.unwrap_or_default().as_str(),
            email.urgency.unwrap_or_default().as_str(),
            email.status.unwrap_or_default().as_str(),
            email.is_read.unwrap_or(false),
            email.is_starred.unwrap_or(false),
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn merge(conn: &Connection, id: i64, email: &NewEmail) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        UPDATE emails SET
            account_id = COALESCE(?1, account_id),
            thread_id = COALESCE(?2, thread_id),
            subject = COALESCE(?3, subject),
            snippet = COALESCE(?4, snippet),
            body_text = COALESCE(?5, body_text),
            from_email = COALESCE(?6, from_email),
            to_email = COALESCE(?7, to_email),
            has_attachments = COALESCE(?8, has_attachments),
            category = COALESCE(?9, category),
            sentiment = COALESCE(?10, sentiment),
            urgency = COALESCE(?11, urgency),
            status = COALESCE(?12, status),
            is_read = COALESCE(?13, is_read),
            is_starred = COALESCE(?14, is_starred),
            updated_at = ?15
        WHERE id = ?16
        "#,
        params![
            email.account_id.map(|a| a.0),
            email.thread_id.as_ref().map(|t| t.0.clone()),
            email.subject,
            email.snippet,
            email.body_text,
            email.from_email,
            email.to_email,
            email.has_attachments,
            email.category,
            email.sentiment.map(|s| s.as_str()),
            email.urgency.map(|u| u.as_str()),
            email.status.map(|s| s.as_str()),
            email.is_read,
            email.is_starred,
            now(),
            id,
        ],
    )?;
    Ok(())
}

/// Retrieves an email by its row ID.
pub async fn get_by_id(db: &Database, id: EmailRecordId) -> Result<Option<EmailRecord>> {
    db.with_conn(move |conn| Ok(select_by_id(conn, id)?)).await
}

/// Retrieves an email by its Gmail message ID.
pub async fn get_by_gmail_id(db: &Database, gmail_id: &str) -> Result<Option<EmailRecord>> {
    let gmail_id = gmail_id.to_string();

    db.with_conn(move |conn| {
        let sql = format!("{SELECT_EMAIL} WHERE gmail_id = ?1");
        Ok(conn.query_row(&sql, [&gmail_id], row_to_email).optional()?)
    })
    .await
}

/// Lists emails newest first, optionally filtered by status and category.
pub async fn list(
    db: &Database,
    status: Option<EmailStatus>,
    category: Option<String>,
    limit: u32,
    offset: u32,
) -> Result<Vec<EmailRecord>> {
    let search = EmailSearch {
        status,
        category,
        limit,
        offset,
        ..Default::default()
    };
    search_page(db, search).await
}

/// Returns one page of emails matching the search, newest first.
pub async fn search_page(db: &Database, search: EmailSearch) -> Result<Vec<EmailRecord>> {
    db.with_conn(move |conn| {
        let (filter, mut values) = search.where_clause();
        let sql = format!("{SELECT_EMAIL} {filter} {ORDER_NEWEST} LIMIT ? OFFSET ?");
        values.push(Value::Integer(search.limit as i64));
        values.push(Value::Integer(search.offset as i64));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), row_to_email)?;
        let emails: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(emails?)
    })
    .await
}

/// Counts every email matching the search, ignoring pagination.
pub async fn search_count(db: &Database, search: EmailSearch) -> Result<u64> {
    db.with_conn(move |conn| {
        let (filter, values) = search.where_clause();
        let sql = format!("SELECT COUNT(*) FROM emails {filter}");
        let count: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(count as u64)
    })
    .await
}

/// Retrieves the emails of a thread, oldest first.
pub async fn list_by_thread(
    db: &Database,
    thread_id: &ThreadId,
    limit: u32,
) -> Result<Vec<EmailRecord>> {
    let thread_id = thread_id.0.clone();

    db.with_conn(move |conn| {
        let sql = format!("{SELECT_EMAIL} WHERE thread_id = ?1 ORDER BY created_at ASC, id ASC LIMIT ?2");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![thread_id, limit], row_to_email)?;
        let emails: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(emails?)
    })
    .await
}

/// Sets the thread of an email.
pub async fn set_thread(db: &Database, id: EmailRecordId, thread_id: &ThreadId) -> Result<()> {
    let thread_id = thread_id.0.clone();

    db.with_conn(move |conn| {
        conn.execute(
            "UPDATE emails SET thread_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![thread_id, now(), id.0],
        )?;
        Ok(())
    })
    .await
}

/// Sets the status of the given emails. Returns the number changed.
pub async fn set_status(db: &Database, ids: &[EmailRecordId], status: EmailStatus) -> Result<usize> {
    update_by_ids(db, ids, "status", Value::Text(status.as_str().to_string())).await
}

/// Sets the read flag of the given emails. Returns the number changed.
pub async fn set_read(db: &Database, ids: &[EmailRecordId], is_read: bool) -> Result<usize> {
    update_by_ids(db, ids, "is_read", Value::Integer(is_read as i64)).await
}

/// Sets the starred flag of the given emails. Returns the number changed.
pub async fn set_starred(db: &Database, ids: &[EmailRecordId], is_starred: bool) -> Result<usize> {
    update_by_ids(db, ids, "is_starred", Value::Integer(is_starred as i64)).await
}

/// Sets the status of emails by Gmail ID. Returns the number changed.
pub async fn set_status_by_gmail_ids(
    db: &Database,
    gmail_ids: &[String],
    status: EmailStatus,
) -> Result<usize> {
    if gmail_ids.is_empty() {
        return Ok(0);
    }
    let gmail_ids = gmail_ids.to_vec();

    db.with_conn(move |conn| {
        let placeholders = vec!["?"; gmail_ids.len()].join(", ");
        let sql = format!(
            "UPDATE emails SET status = ?, updated_at = ? WHERE gmail_id IN ({placeholders})"
        );
        let mut values = vec![Value::Text(status.as_str().to_string()), Value::Text(now())];
        values.extend(gmail_ids.into_iter().map(Value::Text));
        Ok(conn.execute(&sql, params_from_iter(values))?)
    })
    .await
}

/// Sets one whitelisted column on a set of rows.
async fn update_by_ids(
    db: &Database,
    ids: &[EmailRecordId],
    column: &'static str,
    value: Value,
) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();

    db.with_conn(move |conn| {
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE emails SET {column} = ?, updated_at = ? WHERE id IN ({placeholders})"
        );
        let mut values = vec![value, Value::Text(now())];
        values.extend(ids.into_iter().map(Value::Integer));
        Ok(conn.execute(&sql, params_from_iter(values))?)
    })
    .await
}

fn select_by_id(conn: &Connection, id: EmailRecordId) -> rusqlite::Result<Option<EmailRecord>> {
    let sql = format!("{SELECT_EMAIL} WHERE id = ?1");
    conn.query_row(&sql, [id.0], row_to_email).optional()
}

/// Converts a database row to an EmailRecord.
fn row_to_email(row: &Row) -> rusqlite::Result<EmailRecord> {
    let account_id: Option<i64> = row.get(2)?;
    let thread_id: Option<String> = row.get(3)?;
    let sentiment: String = row.get(11)?;
    let urgency: String = row.get(12)?;
    let status: String = row.get(13)?;
    let created_at: String = row.get(16)?;
    let updated_at: String = row.get(17)?;

    let status = status.parse::<EmailStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(13, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(EmailRecord {
        id: EmailRecordId(row.get(0)?),
        gmail_id: row.get(1)?,
        account_id: account_id.map(AccountId),
        thread_id: thread_id.map(ThreadId),
        subject: row.get(4)?,
        snippet: row.get(5)?,
        body_text: row.get(6)?,
        from_email: row.get(7)?,
        to_email: row.get(8)?,
        has_attachments: row.get(9)?,
        category: row.get(10)?,
        sentiment: Sentiment::from_label(&sentiment),
        urgency: Urgency::from_str_lossy(&urgency),
        status,
        is_read: row.get(14)?,
        is_starred: row.get(15)?,
        created_at: parse_sql_time(16, &created_at)?,
        updated_at: parse_sql_time(17, &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn seed(db: &Database) -> Vec<EmailRecord> {
        let emails = vec![
            NewEmail::new("Invoice #42", "Please pay the invoice")
                .gmail_id("g-1")
                .from_email("billing@shop.example.com"),
            NewEmail::new("Team standup", "Meeting at 10")
                .gmail_id("g-2")
                .from_email("lead@work.example.org"),
            NewEmail::new("Weekend plans", "Dinner with family?").gmail_id("g-3"),
        ];
        upsert(db, emails)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.record)
            .collect()
    }

    #[tokio::test]
    async fn upsert_inserts_with_defaults() {
        let db = Database::open_in_memory().await.unwrap();
        let result = upsert(&db, vec![NewEmail::default().gmail_id("bare")])
            .await
            .unwrap();

        assert!(result[0].created);
        let record = &result[0].record;
        assert_eq!(record.subject, "No Subject");
        assert_eq!(record.category, "Unlabeled");
        assert_eq!(record.sentiment, Sentiment::Neutral);
        assert_eq!(record.urgency, Urgency::Normal);
        assert_eq!(record.status, EmailStatus::Keep);
        assert!(!record.is_read);
    }

    #[tokio::test]
    async fn upsert_merges_only_present_fields() {
        let db = Database::open_in_memory().await.unwrap();
        let first = seed(&db).await;

        let update = NewEmail {
            gmail_id: Some("g-1".to_string()),
            category: Some("Billing".to_string()),
            ..Default::default()
        };
        let result = upsert(&db, vec![update]).await.unwrap();

        assert!(!result[0].created);
        let record = &result[0].record;
        assert_eq!(record.id, first[0].id);
        assert_eq!(record.category, "Billing");
        assert_eq!(record.subject, "Invoice #42");
        assert_eq!(record.from_email.as_deref(), Some("billing@shop.example.com"));
    }

    #[tokio::test]
    async fn emails_without_gmail_id_always_insert() {
        let db = Database::open_in_memory().await.unwrap();
        upsert(&db, vec![NewEmail::new("a", "b"), NewEmail::new("a", "b")])
            .await
            .unwrap();
        assert_eq!(list(&db, None, None, 100, 0).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn search_by_text_and_sender() {
        let db = Database::open_in_memory().await.unwrap();
        seed(&db).await;

        let found = search_page(
            &db,
            EmailSearch {
                query: Some("INVOICE".to_string()),
                limit: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].gmail_id.as_deref(), Some("g-1"));

        let by_sender = EmailSearch {
            from_email: Some("example.org".to_string()),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(search_count(&db, by_sender).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn search_folds_non_ascii_case() {
        let db = Database::open_in_memory().await.unwrap();
        upsert(
            &db,
            vec![NewEmail::new("Plans pour l'été", "À bientôt").gmail_id("fr-1")],
        )
        .await
        .unwrap();

        for term in ["ÉTÉ", "été", "à BIENTÔT"] {
            let search = EmailSearch {
                query: Some(term.to_string()),
                limit: 10,
                ..Default::default()
            };
            assert_eq!(search_count(&db, search).await.unwrap(), 1, "{term}");
        }

        let by_subject = EmailSearch {
            subject: Some("L'ÉTÉ".to_string()),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(search_count(&db, by_subject).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn search_escapes_like_wildcards() {
        let db = Database::open_in_memory().await.unwrap();
        seed(&db).await;

        let search = EmailSearch {
            query: Some("%".to_string()),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(search_count(&db, search).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn bulk_updates_report_counts() {
        let db = Database::open_in_memory().await.unwrap();
        let seeded = seed(&db).await;
        let ids: Vec<_> = seeded.iter().map(|e| e.id).collect();

        assert_eq!(set_read(&db, &ids[..2], true).await.unwrap(), 2);
        assert_eq!(set_starred(&db, &ids[..1], true).await.unwrap(), 1);
        assert_eq!(
            set_status(&db, &ids[2..], EmailStatus::Archived).await.unwrap(),
            1
        );
        assert_eq!(set_read(&db, &[], true).await.unwrap(), 0);

        let unread = EmailSearch {
            is_read: Some(false),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(search_count(&db, unread).await.unwrap(), 1);

        let archived = list(&db, Some(EmailStatus::Archived), None, 10, 0)
            .await
            .unwrap();
        assert_eq!(archived.len(), 1);
    }

    #[tokio::test]
    async fn soft_delete_by_gmail_ids() {
        let db = Database::open_in_memory().await.unwrap();
        seed(&db).await;

        let changed = set_status_by_gmail_ids(
            &db,
            &["g-1".to_string(), "missing".to_string()],
            EmailStatus::Deleted,
        )
        .await
        .unwrap();
        assert_eq!(changed, 1);

        let record = get_by_gmail_id(&db, "g-1").await.unwrap().unwrap();
        assert_eq!(record.status, EmailStatus::Deleted);
    }

    #[tokio::test]
    async fn list_paginates_newest_first() {
        let db = Database::open_in_memory().await.unwrap();
        seed(&db).await;

        let page1 = list(&db, None, None, 2, 0).await.unwrap();
        let page2 = list(&db, None, None, 2, 2).await.unwrap();
        assert_eq!(page1.len(), 2);
        assert_eq!(page2.len(), 1);
        assert_eq!(page1[0].gmail_id.as_deref(), Some("g-3"));
        assert_ne!(page1[0].id, page2[0].id);
    }

    #[tokio::test]
    async fn thread_listing_is_oldest_first() {
        let db = Database::open_in_memory().await.unwrap();
        let seeded = seed(&db).await;
        let thread = ThreadId::from("t-1");
        set_thread(&db, seeded[1].id, &thread).await.unwrap();
        set_thread(&db, seeded[0].id, &thread).await.unwrap();

        let members = list_by_thread(&db, &thread, 10).await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].id, seeded[0].id);
    }
}

//! Thread CRUD and statistics operations.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{now, parse_opt_sql_time, parse_sql_time, to_sql_time};
use crate::domain::{split_participants, AccountId, EmailThread, ThreadId};
use crate::storage::database::{Database, Result};

const SELECT_THREAD: &str = r#"
    SELECT
        id, thread_id, subject, message_count, participant_count, participants,
        has_unread, is_archived, first_message_at, last_message_at, account_id,
        created_at, updated_at
    FROM threads
"#;

/// Filter options for listing threads.
#[derive(Debug, Clone)]
pub struct ThreadFilter {
    /// Filter by account.
    pub account_id: Option<AccountId>,
    /// Only threads with unread messages.
    pub unread_only: bool,
    /// Only archived threads. Otherwise only non-archived threads.
    pub archived_only: bool,
    /// Maximum number of results.
    pub limit: u32,
    /// Offset for pagination.
    pub offset: u32,
}

impl Default for ThreadFilter {
    fn default() -> Self {
        Self {
            account_id: None,
            unread_only: false,
            archived_only: false,
            limit: 50,
            offset: 0,
        }
    }
}

impl ThreadFilter {
    /// Creates a new filter for an account.
    pub fn for_account(account_id: AccountId) -> Self {
        Self {
            account_id: Some(account_id),
            ..Default::default()
        }
    }

    /// Filters to only unread threads.
    pub fn unread(mut self) -> Self {
        self.unread_only = true;
        self
    }

    /// Filters to only archived threads.
    pub fn archived(mut self) -> Self {
        self.archived_only = true;
        self
    }

    /// Sets the result limit.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the offset for pagination.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

/// Fields for a newly created thread.
#[derive(Debug, Clone)]
pub struct NewThread {
    pub thread_id: ThreadId,
    pub subject: String,
    pub participants: Vec<String>,
    pub first_message_at: Option<DateTime<Utc>>,
    pub account_id: Option<AccountId>,
}

/// Retrieves a thread by its thread ID.
pub async fn get_by_thread_id(db: &Database, thread_id: &ThreadId) -> Result<Option<EmailThread>> {
    let thread_id = thread_id.clone();
    db.with_conn(move |conn| Ok(select_by_thread_id(conn, &thread_id)?))
        .await
}

/// Finds the oldest thread with a normalized subject, scoped to an account
/// when one is given.
pub async fn find_by_subject(
    db: &Database,
    subject: &str,
    account_id: Option<AccountId>,
) -> Result<Option<EmailThread>> {
    let subject = subject.to_string();

    db.with_conn(move |conn| {
        let result = match account_id {
            Some(id) => {
                let sql = format!("{SELECT_THREAD} WHERE subject = ?1 AND account_id = ?2 ORDER BY id LIMIT 1");
                conn.query_row(&sql, params![subject, id.0], row_to_thread)
                    .optional()?
            }
            None => {
                let sql = format!("{SELECT_THREAD} WHERE subject = ?1 ORDER BY id LIMIT 1");
                conn.query_row(&sql, [&subject], row_to_thread).optional()?
            }
        };
        Ok(result)
    })
    .await
}

/// Inserts a thread with no messages yet.
pub async fn insert(db: &Database, thread: &NewThread) -> Result<EmailThread> {
    let thread = thread.clone();

    db.with_conn(move |conn| {
        let now = now();
        let first = thread.first_message_at.as_ref().map(to_sql_time);
        conn.execute(
            r#"
            INSERT INTO threads (
                thread_id, subject, message_count, participant_count, participants,
                has_unread, is_archived, first_message_at, last_message_at,
                account_id, created_at, updated_at
            ) VALUES (?1, ?2, 0, ?3, ?4, 0, 0, ?5, ?5, ?6, ?7, ?7)
            "#,
            params![
                thread.thread_id.0,
                thread.subject,
                thread.participants.len() as i64,
                thread.participants.join(","),
                first,
                thread.account_id.map(|a| a.0),
                now,
            ],
        )?;

        Ok(select_by_thread_id(conn, &thread.thread_id)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?)
    })
    .await
}

/// Lists threads, most recent activity first.
pub async fn list(db: &Database, filter: &ThreadFilter) -> Result<Vec<EmailThread>> {
    let filter = filter.clone();

    db.with_conn(move |conn| {
        let mut clauses = vec!["is_archived = ?"];
        let mut values = vec![Value::Integer(filter.archived_only as i64)];
        if let Some(account_id) = filter.account_id {
            clauses.push("account_id = ?");
            values.push(Value::Integer(account_id.0));
        }
        if filter.unread_only {
            clauses.push("has_unread = 1");
        }
        values.push(Value::Integer(filter.limit as i64));
        values.push(Value::Integer(filter.offset as i64));

        let sql = format!(
            "{SELECT_THREAD} WHERE {} ORDER BY last_message_at IS NULL, last_message_at DESC, id DESC LIMIT ? OFFSET ?",
            clauses.join(" AND ")
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), row_to_thread)?;
        let threads: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(threads?)
    })
    .await
}

/// Sets the archived flag. Returns true if the thread exists.
pub async fn set_archived(db: &Database, thread_id: &ThreadId, archived: bool) -> Result<bool> {
    let thread_id = thread_id.0.clone();

    db.with_conn(move |conn| {
        let changed = conn.execute(
            "UPDATE threads SET is_archived = ?1, updated_at = ?2 WHERE thread_id = ?3",
            params![archived, now(), thread_id],
        )?;
        Ok(changed > 0)
    })
    .await
}

/// Recomputes a thread's derived statistics from its member emails.
///
/// Returns the updated thread, or `None` if the thread does not exist.
/// A thread with no members is returned unchanged.
pub async fn recompute_stats(db: &Database, thread_id: &ThreadId) -> Result<Option<EmailThread>> {
    let thread_id = thread_id.clone();

    db.transaction(move |tx| {
        if select_by_thread_id(tx, &thread_id)?.is_none() {
            return Ok(None);
        }

        let mut stmt = tx.prepare(
            "SELECT is_read, created_at, from_email, to_email FROM emails WHERE thread_id = ?1",
        )?;
        let members = stmt
            .query_map([&thread_id.0], |row| {
                Ok((
                    row.get::<_, bool>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);

        if members.is_empty() {
            return Ok(select_by_thread_id(tx, &thread_id)?);
        }

        let mut participants = BTreeSet::new();
        let mut has_unread = false;
        for (is_read, _, from, to) in &members {
            has_unread |= !is_read;
            if let Some(from) = from.as_deref().filter(|f| !f.trim().is_empty()) {
                participants.insert(from.trim().to_string());
            }
            if let Some(to) = to {
                participants.extend(split_participants(to));
            }
        }
        // Stored timestamps share one fixed format, so string order is time order.
        let first = members.iter().map(|m| m.1.as_str()).min();
        let last = members.iter().map(|m| m.1.as_str()).max();
        let participants: Vec<String> = participants.into_iter().collect();

        tx.execute(
            r#"
            UPDATE threads SET
                message_count = ?1,
                has_unread = ?2,
                first_message_at = ?3,
                last_message_at = ?4,
                participant_count = ?5,
                participants = ?6,
                updated_at = ?7
            WHERE thread_id = ?8
            "#,
            params![
                members.len() as i64,
                has_unread,
                first,
                last,
                participants.len() as i64,
                participants.join(","),
                now(),
                thread_id.0,
            ],
        )?;

        Ok(select_by_thread_id(tx, &thread_id)?)
    })
    .await
}

fn select_by_thread_id(
    conn: &Connection,
    thread_id: &ThreadId,
) -> rusqlite::Result<Option<EmailThread>> {
    let sql = format!("{SELECT_THREAD} WHERE thread_id = ?1");
    conn.query_row(&sql, [&thread_id.0], row_to_thread)
        .optional()
}

/// Converts a database row to an EmailThread.
fn row_to_thread(row: &Row) -> rusqlite::Result<EmailThread> {
    let participants: String = row.get(5)?;
    let first: Option<String> = row.get(8)?;
    let last: Option<String> = row.get(9)?;
    let account_id: Option<i64> = row.get(10)?;
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;

    Ok(EmailThread {
        id: row.get(0)?,
        thread_id: ThreadId(row.get(1)?),
        subject: row.get(2)?,
        message_count: row.get(3)?,
        participant_count: row.get(4)?,
        participants: split_participants(&participants),
        has_unread: row.get(6)?,
        is_archived: row.get(7)?,
        first_message_at: parse_opt_sql_time(8, first)?,
        last_message_at: parse_opt_sql_time(9, last)?,
        account_id: account_id.map(AccountId),
        created_at: parse_sql_time(11, &created_at)?,
        updated_at: parse_sql_time(12, &updated_at)?,
    })
}

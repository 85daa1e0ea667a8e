//! Card database operations

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{decode_time, encode_time};
use crate::domain::Card;

const CARD_COLUMNS: &str = "id, key, title, backlog_date, start_date, done_date, due_date, \
    state, team, priority, service_class, card_type, assignee, version, blocked, blocked_ever, \
    blocked_time, blockers, cycle_time, lead_time, time_in_current_state, worked_on, \
    ticket_system_data, ticket_system_updated_at, created_at, updated_at";

/// Same as `CARD_COLUMNS` without the raw ticket payload
const BOARD_COLUMNS: &str = "id, key, title, backlog_date, start_date, done_date, due_date, \
    state, team, priority, service_class, card_type, assignee, version, blocked, blocked_ever, \
    blocked_time, blockers, cycle_time, lead_time, time_in_current_state, worked_on, \
    NULL AS ticket_system_data, ticket_system_updated_at, created_at, updated_at";

/// Row type for cards table
#[derive(Debug, sqlx::FromRow)]
pub struct CardRow {
    pub id: String,
    pub key: String,
    pub title: String,
    pub backlog_date: String,
    pub start_date: Option<String>,
    pub done_date: Option<String>,
    pub due_date: Option<String>,
    pub state: String,
    pub team: String,
    pub priority: Option<i32>,
    pub service_class: Option<String>,
    pub card_type: Option<String>,
    pub assignee: Option<String>,
    pub version: Option<String>,
    pub blocked: i32,
    pub blocked_ever: i32,
    pub blocked_time: Option<i64>,
    pub blockers: String,
    pub cycle_time: Option<i64>,
    pub lead_time: Option<i64>,
    pub time_in_current_state: Option<i64>,
    pub worked_on: String,
    pub ticket_system_data: Option<String>,
    pub ticket_system_updated_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl CardRow {
    pub fn to_card(&self) -> Card {
        Card {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            key: self.key.clone(),
            title: self.title.clone(),
            backlog_date: decode_time(&self.backlog_date).unwrap_or_else(Utc::now),
            start_date: self.start_date.as_deref().and_then(decode_time),
            done_date: self.done_date.as_deref().and_then(decode_time),
            due_date: self.due_date.as_deref().and_then(decode_time),
            state: self.state.clone(),
            team: self.team.clone(),
            priority: self.priority,
            service_class: self.service_class.clone(),
            card_type: self.card_type.clone(),
            assignee: self.assignee.clone(),
            version: self.version.clone(),
            blocked: self.blocked != 0,
            blocked_ever: self.blocked_ever != 0,
            blocked_time: self.blocked_time,
            blockers: serde_json::from_str(&self.blockers).unwrap_or_default(),
            cycle_time: self.cycle_time,
            lead_time: self.lead_time,
            time_in_current_state: self.time_in_current_state,
            worked_on: serde_json::from_str(&self.worked_on).unwrap_or_default(),
            ticket_system_data: self
                .ticket_system_data
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok()),
            ticket_system_updated_at: self
                .ticket_system_updated_at
                .as_deref()
                .and_then(decode_time),
            created_at: decode_time(&self.created_at).unwrap_or_else(Utc::now),
            updated_at: decode_time(&self.updated_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Restricts card queries to a set of teams
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFilter {
    pub teams: Option<Vec<String>>,
}

impl CardFilter {
    /// No restriction
    pub fn all() -> Self {
        Self::default()
    }

    pub fn teams(teams: Vec<String>) -> Self {
        Self { teams: Some(teams) }
    }

    fn push_clause(&self, query: &mut String, bindings: &mut Vec<String>) {
        if let Some(teams) = &self.teams {
            if teams.is_empty() {
                query.push_str(" AND 0");
                return;
            }
            let placeholders: Vec<&str> = teams.iter().map(|_| "?").collect();
            query.push_str(&format!(" AND team IN ({})", placeholders.join(",")));
            bindings.extend(teams.iter().cloned());
        }
    }
}

/// Membership reconstruction clauses, shared by the list and count queries
fn in_progress_clause(at: Option<&DateTime<Utc>>, bindings: &mut Vec<String>) -> &'static str {
    match at {
        None => " AND start_date IS NOT NULL AND done_date IS NULL",
        Some(at) => {
            let at = encode_time(at);
            bindings.push(at.clone());
            bindings.push(at);
            " AND start_date IS NOT NULL AND start_date <= ? AND (done_date IS NULL OR done_date > ?)"
        }
    }
}

fn backlogged_clause(at: Option<&DateTime<Utc>>, bindings: &mut Vec<String>) -> &'static str {
    match at {
        None => " AND start_date IS NULL AND done_date IS NULL",
        Some(at) => {
            let at = encode_time(at);
            bindings.extend([at.clone(), at.clone(), at]);
            " AND backlog_date <= ? AND (start_date IS NULL OR start_date > ?) \
             AND (done_date IS NULL OR done_date > ?)"
        }
    }
}

async fn fetch_cards(
    pool: &SqlitePool,
    query: &str,
    bindings: &[String],
) -> Result<Vec<Card>, sqlx::Error> {
    let mut q = sqlx::query_as::<_, CardRow>(query);
    for binding in bindings {
        q = q.bind(binding);
    }
    let rows = q.fetch_all(pool).await?;
    Ok(rows.into_iter().map(|r| r.to_card()).collect())
}

async fn count_cards(
    pool: &SqlitePool,
    query: &str,
    bindings: &[String],
) -> Result<i64, sqlx::Error> {
    let mut q = sqlx::query_scalar::<_, i64>(query);
    for binding in bindings {
        q = q.bind(binding);
    }
    q.fetch_one(pool).await
}

/// Get a card by ID
pub async fn get_card(pool: &SqlitePool, card_id: &str) -> Result<Option<Card>, sqlx::Error> {
    let query = format!("SELECT {} FROM cards WHERE id = ?", CARD_COLUMNS);
    let row = sqlx::query_as::<_, CardRow>(&query)
        .bind(card_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.to_card()))
}

/// Get a card by its ticket key (case-insensitive)
pub async fn get_card_by_key(pool: &SqlitePool, key: &str) -> Result<Option<Card>, sqlx::Error> {
    let query = format!("SELECT {} FROM cards WHERE key = ?", CARD_COLUMNS);
    let row = sqlx::query_as::<_, CardRow>(&query)
        .bind(key.trim().to_uppercase())
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.to_card()))
}

/// Identity and state as currently stored, read inside the caller's transaction
pub async fn get_stored_state(
    conn: &mut SqliteConnection,
    key: &str,
) -> Result<Option<(Uuid, String)>, sqlx::Error> {
    let row: Option<(String, String)> = sqlx::query_as("SELECT id, state FROM cards WHERE key = ?")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|(id, state)| (Uuid::parse_str(&id).unwrap_or_default(), state)))
}

/// Insert or update a card by key
pub async fn upsert_card(conn: &mut SqliteConnection, card: &Card) -> Result<(), sqlx::Error> {
    let blockers = serde_json::to_string(&card.blockers).unwrap_or_else(|_| "[]".to_string());
    let worked_on = serde_json::to_string(&card.worked_on).unwrap_or_else(|_| "[]".to_string());
    let ticket_data = card
        .ticket_system_data
        .as_ref()
        .and_then(|d| serde_json::to_string(d).ok());

    sqlx::query(
        r#"
        INSERT INTO cards (
            id, key, title, backlog_date, start_date, done_date, due_date,
            state, team, priority, service_class, card_type, assignee, version,
            blocked, blocked_ever, blocked_time, blockers, cycle_time, lead_time,
            time_in_current_state, worked_on, ticket_system_data, ticket_system_updated_at,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET
            title = excluded.title,
            backlog_date = excluded.backlog_date,
            start_date = excluded.start_date,
            done_date = excluded.done_date,
            due_date = excluded.due_date,
            state = excluded.state,
            team = excluded.team,
            priority = excluded.priority,
            service_class = excluded.service_class,
            card_type = excluded.card_type,
            assignee = excluded.assignee,
            version = excluded.version,
            blocked = excluded.blocked,
            blocked_ever = excluded.blocked_ever,
            blocked_time = excluded.blocked_time,
            blockers = excluded.blockers,
            cycle_time = excluded.cycle_time,
            lead_time = excluded.lead_time,
            time_in_current_state = excluded.time_in_current_state,
            worked_on = excluded.worked_on,
            ticket_system_data = excluded.ticket_system_data,
            ticket_system_updated_at = excluded.ticket_system_updated_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(card.id.to_string())
    .bind(&card.key)
    .bind(&card.title)
    .bind(encode_time(&card.backlog_date))
    .bind(card.start_date.as_ref().map(encode_time))
    .bind(card.done_date.as_ref().map(encode_time))
    .bind(card.due_date.as_ref().map(encode_time))
    .bind(&card.state)
    .bind(&card.team)
    .bind(card.priority)
    .bind(&card.service_class)
    .bind(&card.card_type)
    .bind(&card.assignee)
    .bind(&card.version)
    .bind(card.blocked as i32)
    .bind(card.blocked_ever as i32)
    .bind(card.blocked_time)
    .bind(blockers)
    .bind(card.cycle_time)
    .bind(card.lead_time)
    .bind(card.time_in_current_state)
    .bind(worked_on)
    .bind(ticket_data)
    .bind(card.ticket_system_updated_at.as_ref().map(encode_time))
    .bind(encode_time(&card.created_at))
    .bind(encode_time(&card.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Delete a card; its state history goes with it
pub async fn delete_card(pool: &SqlitePool, card_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cards WHERE id = ?")
        .bind(card_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Board listing, without the raw ticket payload
pub async fn list_cards(
    pool: &SqlitePool,
    filter: &CardFilter,
    states: Option<&[&str]>,
) -> Result<Vec<Card>, sqlx::Error> {
    let mut query = format!("SELECT {} FROM cards WHERE 1=1", BOARD_COLUMNS);
    let mut bindings: Vec<String> = Vec::new();

    filter.push_clause(&mut query, &mut bindings);

    if let Some(s) = states {
        if !s.is_empty() {
            let placeholders: Vec<&str> = s.iter().map(|_| "?").collect();
            query.push_str(&format!(" AND state IN ({})", placeholders.join(",")));
            bindings.extend(s.iter().map(|state| state.to_string()));
        }
    }

    query.push_str(" ORDER BY priority IS NULL, priority ASC, created_at DESC");
    fetch_cards(pool, &query, &bindings).await
}

/// Cards started but not done, now (`None`) or as of a past instant
pub async fn in_progress_cards(
    pool: &SqlitePool,
    filter: &CardFilter,
    at: Option<&DateTime<Utc>>,
) -> Result<Vec<Card>, sqlx::Error> {
    let mut query = format!("SELECT {} FROM cards WHERE 1=1", BOARD_COLUMNS);
    let mut bindings = Vec::new();
    query.push_str(in_progress_clause(at, &mut bindings));
    filter.push_clause(&mut query, &mut bindings);
    query.push_str(" ORDER BY start_date ASC");
    fetch_cards(pool, &query, &bindings).await
}

pub async fn count_in_progress(
    pool: &SqlitePool,
    filter: &CardFilter,
    at: Option<&DateTime<Utc>>,
) -> Result<i64, sqlx::Error> {
    let mut query = String::from("SELECT COUNT(*) FROM cards WHERE 1=1");
    let mut bindings = Vec::new();
    query.push_str(in_progress_clause(at, &mut bindings));
    filter.push_clause(&mut query, &mut bindings);
    count_cards(pool, &query, &bindings).await
}

/// Cards waiting in the backlog, now (`None`) or as of a past instant
pub async fn backlogged_cards(
    pool: &SqlitePool,
    filter: &CardFilter,
    at: Option<&DateTime<Utc>>,
) -> Result<Vec<Card>, sqlx::Error> {
    let mut query = format!("SELECT {} FROM cards WHERE 1=1", BOARD_COLUMNS);
    let mut bindings = Vec::new();
    query.push_str(backlogged_clause(at, &mut bindings));
    filter.push_clause(&mut query, &mut bindings);
    query.push_str(" ORDER BY priority IS NULL, priority ASC, created_at ASC");
    fetch_cards(pool, &query, &bindings).await
}

pub async fn count_backlogged(
    pool: &SqlitePool,
    filter: &CardFilter,
    at: Option<&DateTime<Utc>>,
) -> Result<i64, sqlx::Error> {
    let mut query = String::from("SELECT COUNT(*) FROM cards WHERE 1=1");
    let mut bindings = Vec::new();
    query.push_str(backlogged_clause(at, &mut bindings));
    filter.push_clause(&mut query, &mut bindings);
    count_cards(pool, &query, &bindings).await
}

/// Cards with a done date in `[start, end]`
pub async fn done_cards_between(
    pool: &SqlitePool,
    filter: &CardFilter,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<Vec<Card>, sqlx::Error> {
    let mut query = format!(
        "SELECT {} FROM cards WHERE done_date >= ? AND done_date <= ?",
        BOARD_COLUMNS
    );
    let mut bindings = vec![encode_time(start), encode_time(end)];
    filter.push_clause(&mut query, &mut bindings);
    query.push_str(" ORDER BY done_date ASC");
    fetch_cards(pool, &query, &bindings).await
}

pub async fn count_done_between(
    pool: &SqlitePool,
    filter: &CardFilter,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let mut query =
        String::from("SELECT COUNT(*) FROM cards WHERE done_date >= ? AND done_date <= ?");
    let mut bindings = vec![encode_time(start), encode_time(end)];
    filter.push_clause(&mut query, &mut bindings);
    count_cards(pool, &query, &bindings).await
}

/// Cards done on or before `end`
pub async fn count_done_by(
    pool: &SqlitePool,
    filter: &CardFilter,
    end: &DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let mut query = String::from("SELECT COUNT(*) FROM cards WHERE done_date <= ?");
    let mut bindings = vec![encode_time(end)];
    filter.push_clause(&mut query, &mut bindings);
    count_cards(pool, &query, &bindings).await
}

/// Which cached duration to read for done cards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedTime {
    Cycle,
    Lead,
}

impl CachedTime {
    fn column(&self) -> &'static str {
        match self {
            CachedTime::Cycle => "cycle_time",
            CachedTime::Lead => "lead_time",
        }
    }
}

/// Cached cycle or lead times of cards done in `[start, end]`
pub async fn cached_times_between(
    pool: &SqlitePool,
    filter: &CardFilter,
    kind: CachedTime,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<Vec<i64>, sqlx::Error> {
    let column = kind.column();
    let mut query = format!(
        "SELECT {} FROM cards WHERE done_date >= ? AND done_date <= ? AND {} IS NOT NULL",
        column, column
    );
    let mut bindings = vec![encode_time(start), encode_time(end)];
    filter.push_clause(&mut query, &mut bindings);

    let mut q = sqlx::query_scalar::<_, i64>(&query);
    for binding in &bindings {
        q = q.bind(binding);
    }
    q.fetch_all(pool).await
}

/// Number of cards per (state, type)
pub async fn count_by_state_and_type(
    pool: &SqlitePool,
    filter: &CardFilter,
) -> Result<Vec<(String, Option<String>, i64)>, sqlx::Error> {
    let mut query = String::from("SELECT state, card_type, COUNT(*) FROM cards WHERE 1=1");
    let mut bindings = Vec::new();
    filter.push_clause(&mut query, &mut bindings);
    query.push_str(" GROUP BY state, card_type");

    let mut q = sqlx::query_as::<_, (String, Option<String>, i64)>(&query);
    for binding in &bindings {
        q = q.bind(binding);
    }
    q.fetch_all(pool).await
}

/// Keys of cards whose ticket data is missing or older than `stale_before`,
/// skipping cards finished before `done_after`
pub async fn keys_needing_refresh(
    pool: &SqlitePool,
    stale_before: &DateTime<Utc>,
    done_after: &DateTime<Utc>,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT key FROM cards
        WHERE (ticket_system_updated_at IS NULL OR ticket_system_updated_at < ?)
          AND (done_date IS NULL OR done_date >= ?)
        ORDER BY ticket_system_updated_at IS NOT NULL, ticket_system_updated_at ASC
        "#,
    )
    .bind(encode_time(stale_before))
    .bind(encode_time(done_after))
    .fetch_all(pool)
    .await
}

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use rust_decimal::Decimal;
use tally_core::{
    CurrencyCode, Group, GroupId, NewSplit, SplitExpense, SplitId, SplitMethod, SplitParticipant,
    UserId, UserProfile, Wallet,
};
use tally_ledger::{LedgerEntry, LedgerQuery, LedgerRepository, LedgerResult, LedgerType};
use tracing::debug;
use uuid::Uuid;

use crate::{SplitRepository, SplitTransaction, StoreError, StoreResult};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS splits (
    id TEXT PRIMARY KEY,
    original_expense_id TEXT,
    description TEXT,
    currency TEXT NOT NULL,
    split_method TEXT NOT NULL,
    total_amount TEXT NOT NULL,
    paid_by TEXT NOT NULL,
    payer_share TEXT NOT NULL,
    participants TEXT NOT NULL,
    group_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS splits_idx_group ON splits(group_id);
CREATE TABLE IF NOT EXISTS split_members (
    split_id TEXT NOT NULL REFERENCES splits(id),
    user_id TEXT NOT NULL,
    PRIMARY KEY (split_id, user_id)
);
CREATE INDEX IF NOT EXISTS split_members_idx_user ON split_members(user_id);
CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    email TEXT,
    wallet TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS member_groups (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    member_ids TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS ledger_entries (
    sequence INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id TEXT NOT NULL UNIQUE,
    timestamp TEXT NOT NULL,
    user_id TEXT NOT NULL,
    currency TEXT NOT NULL,
    amount TEXT NOT NULL,
    entry_type TEXT NOT NULL,
    reference_id TEXT NOT NULL,
    meta TEXT
);
CREATE INDEX IF NOT EXISTS ledger_idx_user_currency
    ON ledger_entries(user_id, currency);
CREATE INDEX IF NOT EXISTS ledger_idx_reference
    ON ledger_entries(reference_id);
"#;

const SPLIT_COLUMNS: &str = "id, original_expense_id, description, currency, split_method, \
     total_amount, paid_by, payer_share, participants, group_id, created_at, updated_at";

/// SQLite-backed split repository.
///
/// Every call opens its own connection. Transactions begin `IMMEDIATE`, so
/// concurrent writers queue on the database lock (up to the busy timeout) and
/// always observe the previous writer's committed state.
#[derive(Clone, Debug)]
pub struct SqliteRepository {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteRepository {
    pub fn new(path: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn with_busy_timeout(
        path: impl Into<PathBuf>,
        busy_timeout: Duration,
    ) -> StoreResult<Self> {
        let repo = Self {
            path: path.into(),
            busy_timeout,
        };
        repo.initialize_schema()?;
        Ok(repo)
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn initialize_schema(&self) -> StoreResult<()> {
        let conn = self.connect()?;
        conn.execute_batch(STORE_SCHEMA)?;
        Ok(())
    }

    fn connect(&self) -> StoreResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL; PRAGMA foreign_keys = ON;",
        )?;
        Ok(conn)
    }

    fn query_splits(&self, filter_sql: &str, param: &str) -> StoreResult<Vec<SplitExpense>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {SPLIT_COLUMNS} FROM splits WHERE {filter_sql} ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![param])?;
        let mut splits = Vec::new();
        while let Some(row) = rows.next()? {
            splits.push(row_to_split(row)?);
        }
        Ok(splits)
    }
}

impl LedgerRepository for SqliteRepository {
    fn latest_sequence(&self) -> LedgerResult<Option<u64>> {
        let conn = self.connect()?;
        let seq: Option<Option<i64>> = conn
            .query_row("SELECT MAX(sequence) FROM ledger_entries", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .optional()
            .map_err(StoreError::from)?;
        Ok(seq.flatten().map(|value| value as u64))
    }

    fn query(&self, query: LedgerQuery) -> LedgerResult<Vec<LedgerEntry>> {
        let conn = self.connect()?;
        let mut sql = String::from(
            "SELECT sequence, entry_id, timestamp, user_id, currency, amount, entry_type, reference_id, meta
             FROM ledger_entries
             WHERE (?1 IS NULL OR user_id = ?1)
               AND (?2 IS NULL OR currency = ?2)
               AND (?3 IS NULL OR entry_type = ?3)
               AND (?4 IS NULL OR reference_id = ?4)
               AND (?5 IS NULL OR sequence >= ?5)
               AND (?6 IS NULL OR sequence <= ?6)
               AND (?7 IS NULL OR timestamp >= ?7)
               AND (?8 IS NULL OR timestamp <= ?8)",
        );
        sql.push_str(if query.ascending {
            " ORDER BY sequence ASC"
        } else {
            " ORDER BY sequence DESC"
        });
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?9");
        }

        let mut params: Vec<Value> = Vec::with_capacity(9);
        params.push(optional_text(query.user_id.map(UserId::into_inner)));
        params.push(optional_text(query.currency.map(String::from)));
        params.push(optional_text(
            query.entry_type.map(|t| t.as_str().to_string()),
        ));
        params.push(optional_text(query.reference_id));
        params.push(optional_int(query.start_sequence));
        params.push(optional_int(query.end_sequence));
        params.push(optional_text(query.start_time.map(|ts| ts.to_rfc3339())));
        params.push(optional_text(query.end_time.map(|ts| ts.to_rfc3339())));
        if let Some(limit) = query.limit {
            params.push(Value::Integer(limit as i64));
        }

        let mut stmt = conn.prepare(&sql).map_err(StoreError::from)?;
        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(StoreError::from)?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().map_err(StoreError::from)? {
            entries.push(row_to_entry(row)?);
        }
        Ok(entries)
    }
}

impl SplitRepository for SqliteRepository {
    fn create_split(&self, split: NewSplit) -> StoreResult<SplitExpense> {
        let expense = split.into_expense(SplitId::generate(), Utc::now());
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            &format!(
                "INSERT INTO splits ({SPLIT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                expense.id.as_str(),
                expense.original_expense_id,
                expense.description,
                expense.currency.as_str(),
                expense.split_method.as_str(),
                expense.total_amount.to_string(),
                expense.paid_by.as_str(),
                expense.payer_share.to_string(),
                serde_json::to_string(&expense.participants)?,
                expense.group_id.as_ref().map(GroupId::as_str),
                expense.created_at.to_rfc3339(),
                expense.updated_at.to_rfc3339(),
            ],
        )?;
        for user_id in &expense.involved_user_ids {
            tx.execute(
                "INSERT INTO split_members (split_id, user_id) VALUES (?1, ?2)",
                params![expense.id.as_str(), user_id.as_str()],
            )?;
        }
        tx.commit()?;
        debug!(split_id = %expense.id, path = %self.path.display(), "split stored");
        Ok(expense)
    }

    fn get_split(&self, id: &SplitId) -> StoreResult<SplitExpense> {
        let conn = self.connect()?;
        load_split(&conn, id)
    }

    fn splits_for_user(&self, user_id: &UserId) -> StoreResult<Vec<SplitExpense>> {
        self.query_splits(
            "id IN (SELECT split_id FROM split_members WHERE user_id = ?1)",
            user_id.as_str(),
        )
    }

    fn splits_for_group(&self, group_id: &GroupId) -> StoreResult<Vec<SplitExpense>> {
        self.query_splits("group_id = ?1", group_id.as_str())
    }

    fn create_profile(&self, profile: UserProfile) -> StoreResult<UserProfile> {
        let conn = self.connect()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO profiles (id, display_name, email, wallet, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                profile.id.as_str(),
                profile.display_name,
                profile.email,
                serde_json::to_string(&profile.wallet)?,
                profile.created_at.to_rfc3339(),
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::Conflict(format!(
                "profile '{}' already exists",
                profile.id
            )));
        }
        Ok(profile)
    }

    fn get_profile(&self, id: &UserId) -> StoreResult<UserProfile> {
        let conn = self.connect()?;
        load_profile(&conn, id)
    }

    fn create_group(&self, group: Group) -> StoreResult<Group> {
        let conn = self.connect()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO member_groups (id, name, member_ids, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                group.id.as_str(),
                group.name,
                serde_json::to_string(&group.member_ids)?,
                group.created_at.to_rfc3339(),
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::Conflict(format!(
                "group '{}' already exists",
                group.id
            )));
        }
        Ok(group)
    }

    fn get_group(&self, id: &GroupId) -> StoreResult<Group> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT id, name, member_ids, created_at FROM member_groups WHERE id = ?1",
                params![id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        let (group_id, name, members, created_at) =
            row.ok_or_else(|| StoreError::not_found("group", id))?;
        Ok(Group {
            id: GroupId::from(group_id),
            name,
            member_ids: serde_json::from_str(&members)?,
            created_at: parse_timestamp(&created_at)?,
        })
    }

    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn SplitTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let value = f(&mut SqliteTransaction { tx: &tx })?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }
}

struct SqliteTransaction<'conn, 'a> {
    tx: &'a rusqlite::Transaction<'conn>,
}

impl SplitTransaction for SqliteTransaction<'_, '_> {
    fn load_split(&mut self, id: &SplitId) -> StoreResult<SplitExpense> {
        load_split(self.tx, id)
    }

    fn save_split(&mut self, split: &SplitExpense) -> StoreResult<()> {
        let updated = self.tx.execute(
            "UPDATE splits SET participants = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                serde_json::to_string(&split.participants)?,
                split.updated_at.to_rfc3339(),
                split.id.as_str(),
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found("split", &split.id));
        }
        Ok(())
    }

    fn load_profile(&mut self, id: &UserId) -> StoreResult<UserProfile> {
        load_profile(self.tx, id)
    }

    fn save_profile(&mut self, profile: &UserProfile) -> StoreResult<()> {
        let updated = self.tx.execute(
            "UPDATE profiles SET wallet = ?1 WHERE id = ?2",
            params![
                serde_json::to_string(&profile.wallet)?,
                profile.id.as_str()
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found("profile", &profile.id));
        }
        Ok(())
    }

    fn append_entries(&mut self, entries: Vec<LedgerEntry>) -> StoreResult<Vec<LedgerEntry>> {
        let mut stored = Vec::with_capacity(entries.len());
        for entry in entries {
            self.tx.execute(
                "INSERT INTO ledger_entries (
                    entry_id, timestamp, user_id, currency, amount, entry_type, reference_id, meta
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.id.to_string(),
                    entry.timestamp.to_rfc3339(),
                    entry.user_id.as_str(),
                    entry.currency.as_str(),
                    entry.amount.to_string(),
                    entry.entry_type.as_str(),
                    entry.reference_id,
                    entry.meta.as_ref().map(|value| value.to_string())
                ],
            )?;
            let sequence = self.tx.last_insert_rowid() as u64;
            stored.push(entry.with_sequence(sequence));
        }
        Ok(stored)
    }
}

fn load_split(conn: &Connection, id: &SplitId) -> StoreResult<SplitExpense> {
    let sql = format!("SELECT {SPLIT_COLUMNS} FROM splits WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id.as_str()])?;
    match rows.next()? {
        Some(row) => row_to_split(row),
        None => Err(StoreError::not_found("split", id)),
    }
}

fn load_profile(conn: &Connection, id: &UserId) -> StoreResult<UserProfile> {
    let row = conn
        .query_row(
            "SELECT id, display_name, email, wallet, created_at FROM profiles WHERE id = ?1",
            params![id.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;
    let (user_id, display_name, email, wallet, created_at) =
        row.ok_or_else(|| StoreError::not_found("profile", id))?;
    let wallet: Wallet = serde_json::from_str(&wallet)?;
    Ok(UserProfile {
        id: UserId::from(user_id),
        display_name,
        email,
        wallet,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn row_to_split(row: &rusqlite::Row<'_>) -> StoreResult<SplitExpense> {
    let id: String = row.get(0)?;
    let original_expense_id: Option<String> = row.get(1)?;
    let description: Option<String> = row.get(2)?;
    let currency_str: String = row.get(3)?;
    let method_str: String = row.get(4)?;
    let total_str: String = row.get(5)?;
    let paid_by: String = row.get(6)?;
    let payer_share_str: String = row.get(7)?;
    let participants_json: String = row.get(8)?;
    let group_id: Option<String> = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    let currency = CurrencyCode::from_str(&currency_str)
        .map_err(|err| StoreError::Serialization(err.to_string()))?;
    let split_method = SplitMethod::from_str(&method_str)
        .map_err(|err| StoreError::Serialization(err.to_string()))?;
    let participants: Vec<SplitParticipant> = serde_json::from_str(&participants_json)?;

    let new_split = NewSplit {
        original_expense_id,
        description,
        currency,
        split_method,
        total_amount: parse_decimal(&total_str)?,
        paid_by: UserId::from(paid_by),
        payer_share: parse_decimal(&payer_share_str)?,
        participants,
        group_id: group_id.map(GroupId::from),
    };
    let mut expense = new_split.into_expense(SplitId::from(id), parse_timestamp(&created_at)?);
    expense.updated_at = parse_timestamp(&updated_at)?;
    Ok(expense)
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> StoreResult<LedgerEntry> {
    let sequence: i64 = row.get(0)?;
    let entry_id: String = row.get(1)?;
    let timestamp_str: String = row.get(2)?;
    let user_id: String = row.get(3)?;
    let currency_str: String = row.get(4)?;
    let amount_str: String = row.get(5)?;
    let entry_type_str: String = row.get(6)?;
    let reference_id: String = row.get(7)?;
    let meta_value: Option<String> = row.get(8)?;

    let currency = CurrencyCode::from_str(&currency_str)
        .map_err(|err| StoreError::Serialization(err.to_string()))?;
    let entry_type = LedgerType::from_str(&entry_type_str).map_err(StoreError::Serialization)?;
    let meta = if let Some(json) = meta_value {
        Some(serde_json::from_str(&json).map_err(|err| {
            StoreError::Serialization(format!("invalid ledger meta payload: {err}"))
        })?)
    } else {
        None
    };

    Ok(LedgerEntry {
        id: Uuid::parse_str(&entry_id).map_err(|err| {
            StoreError::Serialization(format!("invalid ledger id {entry_id}: {err}"))
        })?,
        sequence: sequence as u64,
        timestamp: parse_timestamp(&timestamp_str)?,
        user_id: UserId::from(user_id),
        currency,
        amount: parse_decimal(&amount_str)?,
        entry_type,
        reference_id,
        meta,
    })
}

fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| StoreError::Serialization(format!("invalid timestamp {value}: {err}")))
}

fn parse_decimal(value: &str) -> StoreResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|err| StoreError::Serialization(format!("invalid decimal {value}: {err}")))
}

fn optional_text(value: Option<String>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

fn optional_int(value: Option<u64>) -> Value {
    value
        .map(|v| Value::Integer(v as i64))
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tally_core::SettlementStatus;
    use tempfile::tempdir;

    fn participant(id: &str, owed: Decimal) -> SplitParticipant {
        SplitParticipant {
            user_id: UserId::from(id),
            display_name: id.to_string(),
            email: Some(format!("{id}@example.com")),
            amount_owed: owed,
            percentage: None,
            settlement_status: SettlementStatus::Unsettled,
            settled_at: None,
            settled_via: None,
        }
    }

    #[test]
    fn sqlite_split_roundtrip() {
        let dir = tempdir().unwrap();
        let repo = SqliteRepository::new(dir.path().join("tally.db")).unwrap();
        let created = repo
            .create_split(NewSplit {
                original_expense_id: None,
                description: Some("cabin".into()),
                currency: "EUR".parse().unwrap(),
                split_method: SplitMethod::Equally,
                total_amount: dec!(300),
                paid_by: UserId::from("alice"),
                payer_share: dec!(100.00),
                participants: vec![
                    participant("bob", dec!(100.00)),
                    participant("carol", dec!(100.00)),
                ],
                group_id: Some(GroupId::from("ski")),
            })
            .unwrap();

        let loaded = repo.get_split(&created.id).unwrap();
        assert_eq!(loaded, created);
        assert_eq!(repo.splits_for_user(&UserId::from("carol")).unwrap().len(), 1);
        assert_eq!(repo.splits_for_user(&UserId::from("alice")).unwrap().len(), 1);
        assert_eq!(repo.splits_for_group(&GroupId::from("ski")).unwrap().len(), 1);
        assert!(repo.splits_for_group(&GroupId::from("beach")).unwrap().is_empty());
    }

    #[test]
    fn journal_sequences_and_query() {
        let dir = tempdir().unwrap();
        let repo = SqliteRepository::new(dir.path().join("tally.db")).unwrap();
        repo.create_profile(UserProfile::new("bob", "Bob")).unwrap();
        let usd: CurrencyCode = "USD".parse().unwrap();
        let stored = repo
            .transaction(|tx| -> StoreResult<Vec<LedgerEntry>> {
                let mut profile = tx.load_profile(&UserId::from("bob"))?;
                profile.wallet.credit(&usd, dec!(12.5)).unwrap();
                tx.save_profile(&profile)?;
                tx.append_entries(vec![LedgerEntry::new(
                    profile.id.clone(),
                    usd.clone(),
                    dec!(12.5),
                    LedgerType::TopUp,
                    "init",
                )])
            })
            .unwrap();
        assert_eq!(stored[0].sequence, 1);
        assert_eq!(repo.latest_sequence().unwrap(), Some(1));

        let result = repo
            .query(
                LedgerQuery::for_user(UserId::from("bob")).with_sequence_range(Some(1), Some(10)),
            )
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].amount, dec!(12.5));
        assert_eq!(result[0].entry_type, LedgerType::TopUp);
        assert_eq!(
            repo.get_profile(&UserId::from("bob")).unwrap().wallet.balance(&usd),
            dec!(12.5)
        );
    }

    #[test]
    fn rolled_back_transaction_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let repo = SqliteRepository::new(dir.path().join("tally.db")).unwrap();
        repo.create_profile(UserProfile::new("bob", "Bob")).unwrap();
        let usd: CurrencyCode = "USD".parse().unwrap();
        let result: StoreResult<()> = repo.transaction(|tx| {
            let mut profile = tx.load_profile(&UserId::from("bob"))?;
            profile.wallet.credit(&usd, dec!(99)).unwrap();
            tx.save_profile(&profile)?;
            Err(StoreError::Conflict("abort".into()))
        });
        assert!(result.is_err());
        assert!(repo
            .get_profile(&UserId::from("bob"))
            .unwrap()
            .wallet
            .is_empty());
    }

    #[test]
    fn groups_persist_membership() {
        let dir = tempdir().unwrap();
        let repo = SqliteRepository::new(dir.path().join("tally.db")).unwrap();
        repo.create_group(Group::new(
            "ski",
            "Ski trip",
            [UserId::from("alice"), UserId::from("bob")],
        ))
        .unwrap();
        let group = repo.get_group(&GroupId::from("ski")).unwrap();
        assert!(group.has_member(&UserId::from("bob")));
        assert!(!group.has_member(&UserId::from("carol")));
        assert!(repo.get_group(&GroupId::from("beach")).unwrap_err().is_not_found());
    }

    #[test]
    fn reopened_database_keeps_everything() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tally.db");
        let usd: CurrencyCode = "USD".parse().unwrap();
        let eur: CurrencyCode = "EUR".parse().unwrap();
        let before = Utc::now() - chrono::Duration::hours(1);

        let (split, profile) = {
            let repo = SqliteRepository::new(&path).unwrap();
            repo.create_profile(UserProfile::new("bob", "Bob")).unwrap();
            repo.create_group(Group::new(
                "ski",
                "Ski trip",
                [UserId::from("alice"), UserId::from("bob")],
            ))
            .unwrap();
            let split = repo
                .create_split(NewSplit {
                    original_expense_id: Some("exp-7".into()),
                    description: None,
                    currency: usd.clone(),
                    split_method: SplitMethod::ByAmount,
                    total_amount: dec!(40),
                    paid_by: UserId::from("alice"),
                    payer_share: dec!(15.00),
                    participants: vec![participant("bob", dec!(25.00))],
                    group_id: Some(GroupId::from("ski")),
                })
                .unwrap();
            let profile = repo
                .transaction(|tx| -> StoreResult<UserProfile> {
                    let mut profile = tx.load_profile(&UserId::from("bob"))?;
                    profile.wallet.credit(&usd, dec!(30)).unwrap();
                    profile.wallet.credit(&eur, dec!(4)).unwrap();
                    tx.save_profile(&profile)?;
                    tx.append_entries(vec![
                        LedgerEntry::new(
                            profile.id.clone(),
                            usd.clone(),
                            dec!(30),
                            LedgerType::TopUp,
                            "card-1",
                        ),
                        LedgerEntry::new(
                            profile.id.clone(),
                            eur.clone(),
                            dec!(4),
                            LedgerType::TopUp,
                            "card-2",
                        ),
                    ])?;
                    Ok(profile)
                })
                .unwrap();
            (split, profile)
        };

        let repo = SqliteRepository::new(&path).unwrap();
        assert_eq!(repo.get_split(&split.id).unwrap(), split);
        assert_eq!(repo.get_profile(&UserId::from("bob")).unwrap(), profile);
        assert!(repo
            .get_group(&GroupId::from("ski"))
            .unwrap()
            .has_member(&UserId::from("alice")));
        assert_eq!(repo.latest_sequence().unwrap(), Some(2));
        assert_eq!(repo.query(LedgerQuery::default()).unwrap().len(), 2);

        let euros = repo.query(LedgerQuery::default().with_currency(eur)).unwrap();
        assert_eq!(euros.len(), 1);
        assert_eq!(euros[0].reference_id, "card-2");
        let card = repo
            .query(LedgerQuery::default().with_reference("card-1"))
            .unwrap();
        assert_eq!(card.len(), 1);
        assert_eq!(card[0].currency, usd);
        let recent = repo
            .query(LedgerQuery::default().with_time_range(Some(before), None))
            .unwrap();
        assert_eq!(recent.len(), 2);
        let stale = repo
            .query(LedgerQuery::default().with_time_range(None, Some(before)))
            .unwrap();
        assert!(stale.is_empty());
    }
}

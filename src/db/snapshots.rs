use crate::db::connection::Database;
use crate::db::store::{HistoryEntry, SnapshotStore, StoreStats};
use crate::domain::{diff, ChangeRecord, Classification, Snapshot, TrackedField};
use crate::errors::{StoreError, StoreResult};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

const SELECT_SNAPSHOT: &str = r#"
    SELECT
        id, price, floor, image_count, area,
        floors, title, address, url, phones,
        region_id, city_id, type_ad, section_id, category_id, agent,
        first_seen_at, last_seen_at, last_notified_at, api_updated_at
    FROM listing_snapshots
    WHERE id = ?1
"#;

// first_seen_at is deliberately absent from the UPDATE list.
const UPSERT_SNAPSHOT: &str = r#"
    INSERT INTO listing_snapshots (
        id, price, floor, image_count, area,
        floors, title, address, url, phones,
        region_id, city_id, type_ad, section_id, category_id, agent,
        first_seen_at, last_seen_at, last_notified_at, api_updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
    ON CONFLICT(id) DO UPDATE SET
        price = excluded.price,
        floor = excluded.floor,
        image_count = excluded.image_count,
        area = excluded.area,
        floors = excluded.floors,
        title = excluded.title,
        address = excluded.address,
        url = excluded.url,
        phones = excluded.phones,
        region_id = excluded.region_id,
        city_id = excluded.city_id,
        type_ad = excluded.type_ad,
        section_id = excluded.section_id,
        category_id = excluded.category_id,
        agent = excluded.agent,
        last_seen_at = excluded.last_seen_at,
        last_notified_at = COALESCE(excluded.last_notified_at, listing_snapshots.last_notified_at),
        api_updated_at = excluded.api_updated_at
"#;

/// SQLite-backed [`SnapshotStore`].
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl SnapshotStore for SqliteStore {
    fn get(&self, id: i64) -> StoreResult<Option<Snapshot>> {
        self.db.with_conn(|conn| find_snapshot(conn, id))
    }

    fn upsert(&self, snapshot: &Snapshot) -> StoreResult<()> {
        self.db.with_conn(|conn| write_snapshot(conn, snapshot))
    }

    fn mark_seen(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        self.db.with_conn(|conn| touch_last_seen(conn, id, at))
    }

    fn mark_notified(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                r#"
                UPDATE listing_snapshots
                SET last_notified_at = CASE WHEN ?1 < first_seen_at THEN first_seen_at ELSE ?1 END
                WHERE id = ?2
                "#,
                params![at, id],
            )?;
            Ok(())
        })
    }

    fn append_change_history(
        &self,
        id: i64,
        change: &ChangeRecord,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.db
            .with_conn(|conn| log_changes(conn, id, std::slice::from_ref(change), at))
    }

    fn change_history(&self, id: i64, limit: usize) -> StoreResult<Vec<HistoryEntry>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT listing_id, field_name, old_value, new_value, changed_at
                FROM listing_changes
                WHERE listing_id = ?1
                ORDER BY changed_at DESC, id DESC
                LIMIT ?2
                "#,
            )?;

            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows = stmt.query_map(params![id, limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, DateTime<Utc>>(4)?,
                ))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (listing_id, field_name, old_value, new_value, changed_at) = row?;
                let field = field_name
                    .parse::<TrackedField>()
                    .map_err(StoreError::Corrupt)?;
                entries.push(HistoryEntry {
                    listing_id,
                    change: ChangeRecord {
                        field,
                        old_value,
                        new_value,
                    },
                    changed_at,
                });
            }
            Ok(entries)
        })
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        self.db.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            tx.execute(
                r#"
                DELETE FROM listing_changes
                WHERE listing_id IN (SELECT id FROM listing_snapshots WHERE last_seen_at < ?1)
                "#,
                params![cutoff],
            )?;
            let removed = tx.execute(
                "DELETE FROM listing_snapshots WHERE last_seen_at < ?1",
                params![cutoff],
            )?;

            tx.commit()?;
            Ok(removed)
        })
    }

    fn stats(&self, now: DateTime<Utc>) -> StoreResult<StoreStats> {
        let midnight = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN));

        self.db.with_conn(|conn| {
            let total: i64 =
                conn.query_row("SELECT COUNT(*) FROM listing_snapshots", [], |row| row.get(0))?;

            let new_today: i64 = conn.query_row(
                "SELECT COUNT(*) FROM listing_snapshots WHERE first_seen_at >= ?1",
                params![midnight],
                |row| row.get(0),
            )?;

            let updated_today: i64 = conn.query_row(
                r#"
                SELECT COUNT(*) FROM listing_snapshots
                WHERE last_notified_at >= ?1 AND first_seen_at < ?1
                "#,
                params![midnight],
                |row| row.get(0),
            )?;

            let size_bytes: i64 = conn.query_row(
                "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
                [],
                |row| row.get(0),
            )?;

            Ok(StoreStats {
                total: total.max(0) as u64,
                new_today: new_today.max(0) as u64,
                updated_today: updated_today.max(0) as u64,
                size_bytes: size_bytes.max(0) as u64,
            })
        })
    }

    fn record_sighting(
        &self,
        candidate: &Snapshot,
        now: DateTime<Utc>,
    ) -> StoreResult<Classification> {
        self.db.with_conn(|conn| {
            // IMMEDIATE takes the write lock up front so the lookup and the
            // write below can't interleave with the sweeper or another process.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let outcome = match find_snapshot(&tx, candidate.id)? {
                None => {
                    let mut fresh = candidate.clone();
                    fresh.first_seen_at = now;
                    fresh.last_seen_at = now;
                    fresh.last_notified_at = None;
                    write_snapshot(&tx, &fresh)?;
                    Classification::New
                }
                Some(existing) => {
                    let changes = diff(&existing, candidate);
                    if changes.is_empty() {
                        touch_last_seen(&tx, candidate.id, now)?;
                        Classification::Unchanged
                    } else {
                        let updated = candidate.clone().succeed(&existing, now);
                        write_snapshot(&tx, &updated)?;
                        log_changes(&tx, candidate.id, &changes, now)?;
                        Classification::Changed(changes)
                    }
                }
            };

            tx.commit()?;
            debug!(listing_id = candidate.id, ?outcome, "recorded sighting");
            Ok(outcome)
        })
    }
}

fn find_snapshot(conn: &Connection, id: i64) -> StoreResult<Option<Snapshot>> {
    let Some((mut snapshot, phones_json)) = conn
        .query_row(SELECT_SNAPSHOT, params![id], snapshot_from_row)
        .optional()?
    else {
        return Ok(None);
    };

    snapshot.phones = serde_json::from_str(&phones_json)
        .map_err(|e| StoreError::Corrupt(format!("listing {id}: bad phones column: {e}")))?;
    Ok(Some(snapshot))
}

/// Phones come back as raw JSON and are decoded by the caller.
fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<(Snapshot, String)> {
    let phones_json: String = row.get(9)?;

    let snapshot = Snapshot {
        id: row.get(0)?,
        price: row.get(1)?,
        floor: row.get(2)?,
        image_count: row.get(3)?,
        area: row.get(4)?,
        floors: row.get(5)?,
        title: row.get(6)?,
        address: row.get(7)?,
        url: row.get(8)?,
        phones: Vec::new(),
        region_id: row.get(10)?,
        city_id: row.get(11)?,
        type_ad: row.get(12)?,
        section_id: row.get(13)?,
        category_id: row.get(14)?,
        agent: row.get(15)?,
        first_seen_at: row.get(16)?,
        last_seen_at: row.get(17)?,
        last_notified_at: row.get(18)?,
        api_updated_at: row.get(19)?,
    };
    Ok((snapshot, phones_json))
}

fn write_snapshot(conn: &Connection, snapshot: &Snapshot) -> StoreResult<()> {
    let phones = serde_json::to_string(&snapshot.phones)?;

    conn.execute(
        UPSERT_SNAPSHOT,
        params![
            snapshot.id,
            snapshot.price,
            snapshot.floor,
            snapshot.image_count,
            snapshot.area,
            snapshot.floors,
            &snapshot.title,
            &snapshot.address,
            &snapshot.url,
            phones,
            snapshot.region_id,
            snapshot.city_id,
            snapshot.type_ad,
            snapshot.section_id,
            snapshot.category_id,
            snapshot.agent,
            snapshot.first_seen_at,
            snapshot.last_seen_at,
            snapshot.last_notified_at,
            &snapshot.api_updated_at,
        ],
    )?;
    Ok(())
}

/// Never moves last-seen below first-seen.
fn touch_last_seen(conn: &Connection, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
    conn.execute(
        r#"
        UPDATE listing_snapshots
        SET last_seen_at = CASE WHEN ?1 < first_seen_at THEN first_seen_at ELSE ?1 END
        WHERE id = ?2
        "#,
        params![at, id],
    )?;
    Ok(())
}

fn log_changes(
    conn: &Connection,
    id: i64,
    changes: &[ChangeRecord],
    at: DateTime<Utc>,
) -> StoreResult<()> {
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO listing_changes (listing_id, field_name, old_value, new_value, changed_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )?;
    for change in changes {
        stmt.execute(params![
            id,
            change.field.as_str(),
            &change.old_value,
            &change.new_value,
            at,
        ])?;
    }
    Ok(())
}

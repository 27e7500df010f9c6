//! Postgres-backed ledger store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Code | StoreError | Scenario |
//! |------------|-----------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Two writers created the same location key |
//! | Database (check violation) | `23514` | `Integrity` | Negative balance or non-positive quantity |
//! | Database (foreign key violation) | `23503` | `Integrity` | Log row for an unknown item |
//! | Database (other) / pool / network | any | `Database` | Everything else |
//!
//! Optimistic concurrency is enforced with `UPDATE ... WHERE version = $n`
//! inside the same SQL transaction as the log inserts: zero affected rows
//! means another writer got there first.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use hotelstock_core::{DepartmentId, ExpectedVersion, HotelId, ItemId, TransactionId, TransferId};
use hotelstock_ledger::{
    Counterpart, ItemTransaction, ItemWrite, LedgerCommit, LocationKey, StockItem, TransactionKind, TransferLink,
};

use super::r#trait::{ItemFilter, LedgerStore, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_ledger.sql");

const ITEM_COLUMNS: &str = "id, name, hotel_id, department_id, current_stock, min_stock, category, unit, \
                            active, version, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, item_id, hotel_id, department_id, kind, quantity, remarks, related_id, \
                                   transfer_id, counterpart_item_id, counterpart_hotel_id, \
                                   counterpart_department_id, created_by, created_at";

/// Postgres-backed ledger store.
///
/// Every commit runs in one SQL transaction: the touched records are locked
/// with `SELECT ... FOR UPDATE`, the lockstep check runs against those rows,
/// then the version-guarded writes and the log inserts follow.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the ledger tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn insert_item(tx: &mut Transaction<'_, Postgres>, item: &StockItem) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_items (
                id, name, hotel_id, department_id, current_stock, min_stock,
                category, unit, active, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(item.hotel_id.as_uuid())
        .bind(item.department_id.as_uuid())
        .bind(item.current_stock)
        .bind(item.min_stock)
        .bind(&item.category)
        .bind(&item.unit)
        .bind(item.active)
        .bind(item.version as i64)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!("location key '{}' was created concurrently", item.name))
            } else {
                map_sqlx_error("insert_item", e)
            }
        })?;
        Ok(())
    }

    async fn update_item(
        tx: &mut Transaction<'_, Postgres>,
        item: &StockItem,
        expected: Option<u64>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE stock_items
            SET name = $2,
                current_stock = $3,
                min_stock = $4,
                category = $5,
                unit = $6,
                active = $7,
                version = $8,
                updated_at = $9
            WHERE id = $1
              AND ($10::bigint IS NULL OR version = $10)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(item.current_stock)
        .bind(item.min_stock)
        .bind(&item.category)
        .bind(&item.unit)
        .bind(item.active)
        .bind(item.version as i64)
        .bind(item.updated_at)
        .bind(expected.map(|v| v as i64))
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!("location key '{}' is already taken", item.name))
            } else {
                map_sqlx_error("update_item", e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "item {} changed concurrently (expected version {expected:?})",
                item.id
            )));
        }
        Ok(())
    }

    async fn insert_transaction(tx: &mut Transaction<'_, Postgres>, row: &ItemTransaction) -> Result<(), StoreError> {
        let link = row.transfer;
        sqlx::query(
            r#"
            INSERT INTO item_transactions (
                id, item_id, hotel_id, department_id, kind, quantity, remarks, related_id,
                transfer_id, counterpart_item_id, counterpart_hotel_id, counterpart_department_id,
                created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(row.id.as_uuid())
        .bind(row.item_id.as_uuid())
        .bind(row.hotel_id.as_uuid())
        .bind(row.department_id.as_uuid())
        .bind(row.kind.as_str())
        .bind(row.quantity)
        .bind(&row.remarks)
        .bind(row.related_id.map(Uuid::from))
        .bind(link.map(|l| Uuid::from(l.transfer_id)))
        .bind(link.map(|l| Uuid::from(l.counterpart.item_id)))
        .bind(link.map(|l| Uuid::from(l.counterpart.hotel_id)))
        .bind(link.map(|l| Uuid::from(l.counterpart.department_id)))
        .bind(&row.created_by)
        .bind(row.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;
        Ok(())
    }

    async fn fetch_items(&self, sql: &str, operation: &str, binds: ItemBinds<'_>) -> Result<Vec<StockItem>, StoreError> {
        let query = sqlx::query(sql);
        let query = match binds {
            ItemBinds::Id(id) => query.bind(*id.as_uuid()),
            ItemBinds::Ids(ids) => query.bind(ids),
            ItemBinds::Key(key) => query
                .bind(&key.name)
                .bind(*key.hotel_id.as_uuid())
                .bind(*key.department_id.as_uuid()),
            ItemBinds::Filter(filter, search) => query
                .bind(filter.hotel_id.map(Uuid::from))
                .bind(filter.department_id.map(Uuid::from))
                .bind(filter.item_id.map(Uuid::from))
                .bind(search)
                .bind(filter.include_inactive),
        };
        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        rows.iter()
            .map(|row| {
                StockItemRow::from_row(row)
                    .map_err(|e| StoreError::Database(format!("failed to deserialize item row: {e}")))
                    .map(StockItem::from)
            })
            .collect()
    }

    fn decode_transactions(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<ItemTransaction>, StoreError> {
        rows.iter()
            .map(|row| {
                TransactionRow::from_row(row)
                    .map_err(|e| StoreError::Database(format!("failed to deserialize transaction row: {e}")))
                    .and_then(ItemTransaction::try_from)
            })
            .collect()
    }
}

enum ItemBinds<'a> {
    Id(ItemId),
    Ids(Vec<Uuid>),
    Key(&'a LocationKey),
    Filter(&'a ItemFilter, Option<String>),
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn find_item(&self, id: ItemId) -> Result<Option<StockItem>, StoreError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM stock_items WHERE id = $1");
        Ok(self.fetch_items(&sql, "find_item", ItemBinds::Id(id)).await?.pop())
    }

    #[instrument(skip(self), fields(name = %key.name), err)]
    async fn find_item_at(&self, key: &LocationKey) -> Result<Option<StockItem>, StoreError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM stock_items WHERE name = $1 AND hotel_id = $2 AND department_id = $3"
        );
        Ok(self.fetch_items(&sql, "find_item_at", ItemBinds::Key(key)).await?.pop())
    }

    #[instrument(skip(self), err)]
    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<StockItem>, StoreError> {
        let sql = format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM stock_items
            WHERE ($1::uuid IS NULL OR hotel_id = $1)
              AND ($2::uuid IS NULL OR department_id = $2)
              AND ($3::uuid IS NULL OR id = $3)
              AND ($4::text IS NULL OR strpos(lower(name), $4) > 0)
              AND ($5 OR active)
            ORDER BY name ASC, id ASC
            "#
        );
        let search = filter.search_term();
        self.fetch_items(&sql, "list_items", ItemBinds::Filter(filter, search)).await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<StockItem>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!("SELECT {ITEM_COLUMNS} FROM stock_items WHERE id = ANY($1)");
        let ids = ids.iter().map(|id| *id.as_uuid()).collect();
        self.fetch_items(&sql, "items_by_ids", ItemBinds::Ids(ids)).await
    }

    #[instrument(skip(self, item_ids), fields(count = item_ids.len()), err)]
    async fn transactions_for(
        &self,
        item_ids: &[ItemId],
        before: DateTime<Utc>,
    ) -> Result<Vec<ItemTransaction>, StoreError> {
        if item_ids.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<Uuid> = item_ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM item_transactions
            WHERE item_id = ANY($1) AND created_at < $2
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(ids)
        .bind(before)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("transactions_for", e))?;
        Self::decode_transactions(rows)
    }

    #[instrument(skip(self), err)]
    async fn all_transactions(&self) -> Result<Vec<ItemTransaction>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM item_transactions ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("all_transactions", e))?;
        Self::decode_transactions(rows)
    }

    #[instrument(
        skip(self, commit),
        fields(writes = commit.writes.len(), transactions = commit.transactions.len()),
        err
    )]
    async fn commit(&self, commit: LedgerCommit) -> Result<(), StoreError> {
        if commit.writes.is_empty() {
            if !commit.transactions.is_empty() {
                return Err(StoreError::Integrity(
                    "commit carries log rows without a balance write".to_string(),
                ));
            }
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Lock the touched records and read their balances.
        let ids: Vec<Uuid> = commit.writes.iter().map(|w| *w.item.id.as_uuid()).collect();
        let locked = sqlx::query("SELECT id, current_stock FROM stock_items WHERE id = ANY($1) FOR UPDATE")
            .bind(&ids[..])
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_items", e))?;
        let mut stored: HashMap<ItemId, i64> = HashMap::with_capacity(locked.len());
        for row in &locked {
            let id: Uuid = row.try_get("id").map_err(|e| map_sqlx_error("lock_items", e))?;
            let balance: i64 = row.try_get("current_stock").map_err(|e| map_sqlx_error("lock_items", e))?;
            stored.insert(ItemId::from_uuid(id), balance);
        }

        commit
            .check_lockstep(|id| stored.get(&id).copied())
            .map_err(|e| StoreError::Integrity(e.to_string()))?;

        for ItemWrite { item, expected } in &commit.writes {
            match expected {
                ExpectedVersion::NoRecord => {
                    if stored.contains_key(&item.id) {
                        return Err(StoreError::Conflict(format!("item {} already exists", item.id)));
                    }
                    Self::insert_item(&mut tx, item).await?;
                }
                ExpectedVersion::Exact(v) => Self::update_item(&mut tx, item, Some(*v)).await?,
                ExpectedVersion::Any => Self::update_item(&mut tx, item, None).await?,
            }
        }

        for row in &commit.transactions {
            Self::insert_transaction(&mut tx, row).await?;
        }

        // Dropping `tx` on any early return above rolls back.
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") | Some("23514") => StoreError::Integrity(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Database(format!("connection pool closed in {operation}")),
        other => StoreError::Database(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

// SQLx row types

#[derive(Debug)]
struct StockItemRow {
    id: Uuid,
    name: String,
    hotel_id: Uuid,
    department_id: Uuid,
    current_stock: i64,
    min_stock: i64,
    category: Option<String>,
    unit: Option<String>,
    active: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StockItemRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StockItemRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            hotel_id: row.try_get("hotel_id")?,
            department_id: row.try_get("department_id")?,
            current_stock: row.try_get("current_stock")?,
            min_stock: row.try_get("min_stock")?,
            category: row.try_get("category")?,
            unit: row.try_get("unit")?,
            active: row.try_get("active")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<StockItemRow> for StockItem {
    fn from(row: StockItemRow) -> Self {
        StockItem {
            id: ItemId::from_uuid(row.id),
            name: row.name,
            hotel_id: HotelId::from_uuid(row.hotel_id),
            department_id: DepartmentId::from_uuid(row.department_id),
            current_stock: row.current_stock,
            min_stock: row.min_stock,
            category: row.category,
            unit: row.unit,
            active: row.active,
            version: row.version as u64,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug)]
struct TransactionRow {
    id: Uuid,
    item_id: Uuid,
    hotel_id: Uuid,
    department_id: Uuid,
    kind: String,
    quantity: i64,
    remarks: Option<String>,
    related_id: Option<Uuid>,
    transfer_id: Option<Uuid>,
    counterpart_item_id: Option<Uuid>,
    counterpart_hotel_id: Option<Uuid>,
    counterpart_department_id: Option<Uuid>,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for TransactionRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(TransactionRow {
            id: row.try_get("id")?,
            item_id: row.try_get("item_id")?,
            hotel_id: row.try_get("hotel_id")?,
            department_id: row.try_get("department_id")?,
            kind: row.try_get("kind")?,
            quantity: row.try_get("quantity")?,
            remarks: row.try_get("remarks")?,
            related_id: row.try_get("related_id")?,
            transfer_id: row.try_get("transfer_id")?,
            counterpart_item_id: row.try_get("counterpart_item_id")?,
            counterpart_hotel_id: row.try_get("counterpart_hotel_id")?,
            counterpart_department_id: row.try_get("counterpart_department_id")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<TransactionRow> for ItemTransaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let kind = TransactionKind::parse(&row.kind)
            .ok_or_else(|| StoreError::Integrity(format!("unknown transaction kind '{}'", row.kind)))?;

        // A link is only usable when the whole snapshot is present.
        let transfer = match (
            row.transfer_id,
            row.counterpart_item_id,
            row.counterpart_hotel_id,
            row.counterpart_department_id,
        ) {
            (Some(transfer_id), Some(item_id), Some(hotel_id), Some(department_id)) => Some(TransferLink {
                transfer_id: TransferId::from_uuid(transfer_id),
                counterpart: Counterpart {
                    item_id: ItemId::from_uuid(item_id),
                    hotel_id: HotelId::from_uuid(hotel_id),
                    department_id: DepartmentId::from_uuid(department_id),
                },
            }),
            _ => None,
        };

        Ok(ItemTransaction {
            id: TransactionId::from_uuid(row.id),
            item_id: ItemId::from_uuid(row.item_id),
            hotel_id: HotelId::from_uuid(row.hotel_id),
            department_id: DepartmentId::from_uuid(row.department_id),
            kind,
            quantity: row.quantity,
            remarks: row.remarks,
            related_id: row.related_id.map(ItemId::from_uuid),
            transfer,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

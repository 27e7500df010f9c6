use std::sync::Arc;

use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use hotelstock_core::{DepartmentId, HotelId};

use super::{Directory, LocationRef};
use crate::store::StoreError;

/// Reads the `hotels` and `departments` tables maintained upstream.
#[derive(Debug, Clone)]
pub struct PostgresDirectory {
    pool: Arc<PgPool>,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    async fn fetch(&self, table: &str, id: Option<Uuid>) -> Result<Vec<(Uuid, String, bool)>, StoreError> {
        let sql = format!("SELECT id, name, active FROM {table} WHERE ($1::uuid IS NULL OR id = $1) ORDER BY name");
        let rows = sqlx::query(&sql)
            .bind(id)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("directory lookup on {table} failed: {e}")))?;

        rows.iter()
            .map(|row| {
                Ok((
                    row.try_get("id")?,
                    row.try_get("name")?,
                    row.try_get("active")?,
                ))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| StoreError::Database(format!("failed to deserialize {table} row: {e}")))
    }
}

fn to_ref<I: From<Uuid>>((id, name, active): (Uuid, String, bool)) -> LocationRef<I> {
    LocationRef {
        id: I::from(id),
        name,
        active,
    }
}

#[async_trait::async_trait]
impl Directory for PostgresDirectory {
    #[instrument(skip(self), fields(hotel_id = %id), err)]
    async fn hotel(&self, id: HotelId) -> Result<Option<LocationRef<HotelId>>, StoreError> {
        Ok(self.fetch("hotels", Some(*id.as_uuid())).await?.into_iter().next().map(to_ref))
    }

    #[instrument(skip(self), fields(department_id = %id), err)]
    async fn department(&self, id: DepartmentId) -> Result<Option<LocationRef<DepartmentId>>, StoreError> {
        Ok(self.fetch("departments", Some(*id.as_uuid())).await?.into_iter().next().map(to_ref))
    }

    async fn hotels(&self) -> Result<Vec<LocationRef<HotelId>>, StoreError> {
        Ok(self.fetch("hotels", None).await?.into_iter().map(to_ref).collect())
    }

    async fn departments(&self) -> Result<Vec<LocationRef<DepartmentId>>, StoreError> {
        Ok(self.fetch("departments", None).await?.into_iter().map(to_ref).collect())
    }
}

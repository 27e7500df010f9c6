//! Hotel/department lookups.
//!
//! The ledger does not own hotels or departments; it only needs to know
//! whether an id resolves to an active location and what to call it in
//! reports.

pub mod postgres;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use hotelstock_core::{DepartmentId, HotelId};

pub use postgres::PostgresDirectory;

use crate::store::StoreError;

/// A resolved hotel or department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRef<I> {
    pub id: I,
    pub name: String,
    pub active: bool,
}

#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    async fn hotel(&self, id: HotelId) -> Result<Option<LocationRef<HotelId>>, StoreError>;
    async fn department(&self, id: DepartmentId) -> Result<Option<LocationRef<DepartmentId>>, StoreError>;

    /// Every hotel and department, for name resolution in reports.
    async fn hotels(&self) -> Result<Vec<LocationRef<HotelId>>, StoreError>;
    async fn departments(&self) -> Result<Vec<LocationRef<DepartmentId>>, StoreError>;
}

#[async_trait::async_trait]
impl<D> Directory for Arc<D>
where
    D: Directory + ?Sized,
{
    async fn hotel(&self, id: HotelId) -> Result<Option<LocationRef<HotelId>>, StoreError> {
        (**self).hotel(id).await
    }

    async fn department(&self, id: DepartmentId) -> Result<Option<LocationRef<DepartmentId>>, StoreError> {
        (**self).department(id).await
    }

    async fn hotels(&self) -> Result<Vec<LocationRef<HotelId>>, StoreError> {
        (**self).hotels().await
    }

    async fn departments(&self) -> Result<Vec<LocationRef<DepartmentId>>, StoreError> {
        (**self).departments().await
    }
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    hotels: RwLock<HashMap<HotelId, LocationRef<HotelId>>>,
    departments: RwLock<HashMap<DepartmentId, LocationRef<DepartmentId>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_hotel(&self, id: HotelId, name: impl Into<String>, active: bool) {
        if let Ok(mut map) = self.hotels.write() {
            map.insert(id, LocationRef { id, name: name.into(), active });
        }
    }

    pub fn upsert_department(&self, id: DepartmentId, name: impl Into<String>, active: bool) {
        if let Ok(mut map) = self.departments.write() {
            map.insert(id, LocationRef { id, name: name.into(), active });
        }
    }

    /// Register a new active hotel and return its id.
    pub fn add_hotel(&self, name: impl Into<String>) -> HotelId {
        let id = HotelId::new();
        self.upsert_hotel(id, name, true);
        id
    }

    /// Register a new active department and return its id.
    pub fn add_department(&self, name: impl Into<String>) -> DepartmentId {
        let id = DepartmentId::new();
        self.upsert_department(id, name, true);
        id
    }
}

fn poisoned() -> StoreError {
    StoreError::Database("lock poisoned".to_string())
}

#[async_trait::async_trait]
impl Directory for InMemoryDirectory {
    async fn hotel(&self, id: HotelId) -> Result<Option<LocationRef<HotelId>>, StoreError> {
        Ok(self.hotels.read().map_err(|_| poisoned())?.get(&id).cloned())
    }

    async fn department(&self, id: DepartmentId) -> Result<Option<LocationRef<DepartmentId>>, StoreError> {
        Ok(self.departments.read().map_err(|_| poisoned())?.get(&id).cloned())
    }

    async fn hotels(&self) -> Result<Vec<LocationRef<HotelId>>, StoreError> {
        Ok(self.hotels.read().map_err(|_| poisoned())?.values().cloned().collect())
    }

    async fn departments(&self) -> Result<Vec<LocationRef<DepartmentId>>, StoreError> {
        Ok(self.departments.read().map_err(|_| poisoned())?.values().cloned().collect())
    }
}

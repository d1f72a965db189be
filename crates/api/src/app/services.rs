use std::sync::Arc;

use pickbay_infra::{InMemoryWarehouseStore, ReconciliationEngine, WarehouseStore};

#[cfg(feature = "postgres")]
use pickbay_infra::PostgresWarehouseStore;
#[cfg(feature = "postgres")]
use sqlx::PgPool;

/// Store handle the engine runs against; backend chosen at startup.
pub type DynStore = Arc<dyn WarehouseStore>;

pub struct AppServices {
    engine: ReconciliationEngine<DynStore>,
}

impl AppServices {
    pub fn engine(&self) -> &ReconciliationEngine<DynStore> {
        &self.engine
    }
}

pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        #[cfg(feature = "postgres")]
        {
            return build_persistent_services().await;
        }
        #[cfg(not(feature = "postgres"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory"
            );
        }
    }

    build_in_memory_services()
}

fn build_in_memory_services() -> AppServices {
    let store: DynStore = Arc::new(InMemoryWarehouseStore::new());
    AppServices {
        engine: ReconciliationEngine::new(store),
    }
}

#[cfg(feature = "postgres")]
async fn build_persistent_services() -> AppServices {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to Postgres");

    let store = PostgresWarehouseStore::new(pool);
    store
        .init_schema()
        .await
        .expect("Failed to initialize warehouse schema");

    let store: DynStore = Arc::new(store);
    AppServices {
        engine: ReconciliationEngine::new(store),
    }
}

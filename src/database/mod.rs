pub mod user_store;
#[cfg(test)]
pub mod memory_store;

pub use user_store::*;

use mongodb::{bson::doc, options::IndexOptions, Client, Collection, Database, IndexModel};

use crate::{models::User, utils::AppError};

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, AppError> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri)
            .await
            .map_err(|e| {
                log::error!("❌ Invalid MongoDB URI: {}", e);
                AppError::Config("MONGO_URI could not be parsed".to_string())
            })?;

        // Connection pool
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(2);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        let client = Client::with_options(client_options).map_err(|e| {
            log::error!("❌ Failed to build MongoDB client: {}", e);
            AppError::StoreUnavailable("connect")
        })?;

        let db = client.database(db_name);

        // Test connection
        db.run_command(doc! { "ping": 1 }).await.map_err(|e| {
            log::error!("❌ MongoDB ping failed: {}", e);
            AppError::StoreUnavailable("ping")
        })?;

        Ok(Self { db })
    }

    /// Creates the unique email index the account store relies on for
    /// duplicate detection.
    pub async fn ensure_indexes(&self, users_collection: &str) {
        log::info!("🔧 Creating database indexes...");

        let users = self.collection::<User>(users_collection);
        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("email_unique".to_string())
                    .build(),
            )
            .build();

        match users.create_index(email_index).await {
            Ok(_) => log::info!("   ✅ Index ready: {}(email, unique)", users_collection),
            Err(e) => log::warn!("   ⚠️  Could not create unique email index: {}", e),
        }
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }
}

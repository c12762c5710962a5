use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

/// A freshly created and migrated SQLite database in the system temp directory.
///
/// The database file is deleted when [`TestDatabase::drop_database`] is called. Tests that fail early leave the file
/// behind, which is convenient for post-mortems.
pub struct TestDatabase {
    pub url: String,
    pub db: SqliteDatabase,
}

impl TestDatabase {
    pub async fn drop_database(self) {
        self.db.close().await;
        if let Err(e) = Sqlite::drop_database(&self.url).await {
            warn!("🗃️ Could not drop test database {}: {e}", self.url);
        }
    }
}

pub fn random_db_path() -> String {
    let path = std::env::temp_dir().join(format!("raiz_test_store_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

/// Loads `.env.test` if present, initialises logging and creates a migrated database at a random path.
pub async fn prepare_test_env() -> TestDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = random_db_path();
    create_database(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
    TestDatabase { url, db }
}

pub async fn create_database(url: &str) {
    if Sqlite::database_exists(url).await.unwrap_or(false) {
        if let Err(e) = Sqlite::drop_database(url).await {
            warn!("Error dropping database {url}: {e:?}");
        }
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("Created Sqlite database {url}");
}

use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::security::policy::Visibility;

pub mod migrator;
pub mod repositories;

pub use repositories::document::{DocumentRecord, NewDocument};
pub use repositories::product::{NewProduct, ProductChanges, ProductRecord, SearchFilter};
pub use repositories::user::{NewUser, User, UserChanges};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn product_repo(&self) -> repositories::product::ProductRepository {
        repositories::product::ProductRepository::new(self.conn.clone())
    }

    fn document_repo(&self) -> repositories::document::DocumentRepository {
        repositories::document::DocumentRepository::new(self.conn.clone())
    }

    // -- accounts --------------------------------------------------------

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list().await
    }

    pub async fn get_users_by_ids(&self, ids: &[i32]) -> Result<Vec<User>> {
        self.user_repo().get_by_ids(ids).await
    }

    pub async fn insert_user(&self, new_user: NewUser, security: &SecurityConfig) -> Result<User> {
        self.user_repo().insert(new_user, security).await
    }

    pub async fn update_user(
        &self,
        id: i32,
        changes: UserChanges,
        security: &SecurityConfig,
    ) -> Result<Option<User>> {
        self.user_repo().update(id, changes, security).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        self.user_repo().delete(id).await
    }

    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>> {
        self.user_repo().verify_credentials(username, password).await
    }

    // -- products --------------------------------------------------------

    pub async fn insert_product(&self, new_product: NewProduct) -> Result<ProductRecord> {
        self.product_repo().insert(new_product).await
    }

    pub async fn get_product(&self, id: i32) -> Result<Option<ProductRecord>> {
        self.product_repo().get(id).await
    }

    pub async fn list_products(&self, visibility: &Visibility) -> Result<Vec<ProductRecord>> {
        self.product_repo().list(visibility).await
    }

    pub async fn search_products(
        &self,
        visibility: &Visibility,
        filter: SearchFilter,
    ) -> Result<Vec<ProductRecord>> {
        self.product_repo().search(visibility, filter).await
    }

    pub async fn list_products_with_document(
        &self,
        visibility: &Visibility,
    ) -> Result<Vec<ProductRecord>> {
        self.product_repo().list_with_document(visibility).await
    }

    pub async fn update_product(
        &self,
        id: i32,
        changes: ProductChanges,
    ) -> Result<Option<ProductRecord>> {
        self.product_repo().update(id, changes).await
    }

    pub async fn delete_product(&self, id: i32) -> Result<bool> {
        self.product_repo().delete(id).await
    }

    pub async fn attach_product_document(
        &self,
        id: i32,
        url: &str,
        storage_key: &str,
    ) -> Result<Option<ProductRecord>> {
        self.product_repo().set_document(id, url, storage_key).await
    }

    pub async fn clear_product_documents(&self, storage_key: &str) -> Result<u64> {
        self.product_repo().clear_document_by_key(storage_key).await
    }

    // -- document uploads ------------------------------------------------

    pub async fn record_upload(&self, new_document: NewDocument) -> Result<DocumentRecord> {
        self.document_repo().insert(new_document).await
    }

    pub async fn get_upload(&self, id: i32) -> Result<Option<DocumentRecord>> {
        self.document_repo().get(id).await
    }

    pub async fn delete_upload(&self, id: i32) -> Result<bool> {
        self.document_repo().delete(id).await
    }
}

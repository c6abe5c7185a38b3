use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    error::PersistenceError,
    models::{Credential, EntityKind, LinkedEntityFields, NewCredential, OneTimeToken},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// Relation
///
/// The two many-to-many associations every article and project carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    Tags,
    Platforms,
}

/// LinkTable
///
/// Physical layout of one link table. Names are compile-time constants, so they
/// are safe to splice into SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTable {
    pub table: &'static str,
    /// Column holding the article/project id.
    pub owner_column: &'static str,
    /// Column holding the tag/platform id.
    pub target_column: &'static str,
}

pub fn link_table(kind: EntityKind, relation: Relation) -> LinkTable {
    match (kind, relation) {
        (EntityKind::Article, Relation::Tags) => LinkTable {
            table: "articles_tags",
            owner_column: "article_id",
            target_column: "tag_id",
        },
        (EntityKind::Article, Relation::Platforms) => LinkTable {
            table: "platforms_articles",
            owner_column: "article_id",
            target_column: "platform_id",
        },
        (EntityKind::Project, Relation::Tags) => LinkTable {
            table: "projects_tags",
            owner_column: "project_id",
            target_column: "tag_id",
        },
        (EntityKind::Project, Relation::Platforms) => LinkTable {
            table: "platforms_projects",
            owner_column: "project_id",
            target_column: "platform_id",
        },
    }
}

/// TokenStore
///
/// Digest-keyed storage for one-time tokens. Implemented by transaction scopes so
/// that validation and consumption share the enclosing transaction.
#[async_trait]
pub trait TokenStore: Send {
    async fn insert_token(&mut self, token: &OneTimeToken) -> Result<(), PersistenceError>;

    /// Look a token up by digest. Postgres locks the row for the rest of the transaction.
    async fn find_token(
        &mut self,
        hashed_token: &str,
    ) -> Result<Option<OneTimeToken>, PersistenceError>;

    /// Flip `used` to true for an unused token. Returns the number of rows changed.
    async fn mark_token_used(&mut self, hashed_token: &str) -> Result<u64, PersistenceError>;
}

/// LinkStore
///
/// Row-level access to the link tables.
#[async_trait]
pub trait LinkStore: Send {
    async fn delete_links(
        &mut self,
        kind: EntityKind,
        relation: Relation,
        entity_id: i64,
    ) -> Result<u64, PersistenceError>;

    /// Insert one row per target id in a single statement. Empty input is a no-op.
    async fn insert_links(
        &mut self,
        kind: EntityKind,
        relation: Relation,
        entity_id: i64,
        target_ids: &[i64],
    ) -> Result<(), PersistenceError>;
}

/// RepositoryTx
///
/// A transaction scope. Every statement issued through it belongs to one unit of
/// work; dropping it without `commit` rolls all of them back.
#[async_trait]
pub trait RepositoryTx: TokenStore + LinkStore + Send {
    /// Overwrite the scalar fields of an article/project. Returns rows affected.
    async fn update_entity(
        &mut self,
        kind: EntityKind,
        id: i64,
        fields: &LinkedEntityFields,
    ) -> Result<u64, PersistenceError>;

    async fn email_available(&mut self, email: &str) -> Result<bool, PersistenceError>;

    async fn user_exists(&mut self, user_id: i64) -> Result<bool, PersistenceError>;

    async fn insert_credential(&mut self, credential: &NewCredential)
    -> Result<i64, PersistenceError>;

    async fn update_password(
        &mut self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<u64, PersistenceError>;

    async fn commit(self: Box<Self>) -> Result<(), PersistenceError>;

    async fn rollback(self: Box<Self>) -> Result<(), PersistenceError>;
}

/// Repository Trait
///
/// Pool-level entry point of the persistence layer. Anything that must be atomic
/// goes through `begin`; the remaining methods are single autocommitted statements.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across
/// Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn RepositoryTx>, PersistenceError>;

    async fn find_credential_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Credential>, PersistenceError>;

    /// Insert a new article/project and return its id.
    async fn insert_entity(
        &self,
        kind: EntityKind,
        fields: &LinkedEntityFields,
    ) -> Result<i64, PersistenceError>;

    /// Autocommitted counterpart of `LinkStore::insert_links`, used by the create path.
    async fn insert_links(
        &self,
        kind: EntityKind,
        relation: Relation,
        entity_id: i64,
        target_ids: &[i64],
    ) -> Result<(), PersistenceError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

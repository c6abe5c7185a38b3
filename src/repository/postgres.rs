use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction, query_builder::QueryBuilder};

use super::{LinkStore, Relation, Repository, RepositoryTx, TokenStore, link_table};
use crate::{
    auth::role::Role,
    error::PersistenceError,
    models::{Credential, EntityKind, LinkedEntityFields, NewCredential, OneTimeToken, TokenKind},
};

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// PgTx
///
/// A live `sqlx` transaction. sqlx rolls it back on drop if `commit` was never called.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

// --- Row Mapping ---

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: i64,
    email: String,
    password: String,
    role: String,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = PersistenceError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e| PersistenceError::Database(sqlx::Error::Decode(Box::new(e))))?;

        Ok(Credential {
            id: row.id,
            email: row.email,
            password_hash: row.password,
            role,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    hashed_token: String,
    #[sqlx(rename = "type")]
    kind: String,
    created_by: i64,
    user_id: Option<i64>,
    used: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<TokenRow> for OneTimeToken {
    type Error = PersistenceError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let kind = TokenKind::parse(&row.kind).ok_or_else(|| PersistenceError::Store {
            message: format!("unknown token type '{}'", row.kind),
        })?;

        Ok(OneTimeToken {
            hashed_token: row.hashed_token,
            kind,
            user_id: row.user_id,
            created_by: row.created_by,
            created_at: row.created_at,
            used: row.used,
        })
    }
}

// --- Shared statements ---

/// Bulk insert of link rows through `QueryBuilder::push_values`: one statement,
/// every id bound as a parameter.
async fn insert_link_rows(
    conn: &mut PgConnection,
    kind: EntityKind,
    relation: Relation,
    entity_id: i64,
    target_ids: &[i64],
) -> Result<(), PersistenceError> {
    if target_ids.is_empty() {
        return Ok(());
    }

    let layout = link_table(kind, relation);
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "INSERT INTO {} ({}, {}) ",
        layout.table, layout.owner_column, layout.target_column
    ));
    builder.push_values(target_ids, |mut row, target_id| {
        row.push_bind(entity_id).push_bind(*target_id);
    });

    builder.build().execute(conn).await?;
    Ok(())
}

// --- Transaction scope ---

#[async_trait]
impl TokenStore for PgTx {
    async fn insert_token(&mut self, token: &OneTimeToken) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO users_tokens (hashed_token, type, created_by, user_id, used, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&token.hashed_token)
        .bind(token.kind.as_str())
        .bind(token.created_by)
        .bind(token.user_id)
        .bind(token.used)
        .bind(token.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    /// `FOR UPDATE` holds the row until the transaction ends, so a concurrent
    /// redemption of the same token waits here and then observes `used = true`.
    async fn find_token(
        &mut self,
        hashed_token: &str,
    ) -> Result<Option<OneTimeToken>, PersistenceError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT hashed_token, type, created_by, user_id, used, created_at
            FROM users_tokens
            WHERE hashed_token = $1
            FOR UPDATE
            "#,
        )
        .bind(hashed_token)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(OneTimeToken::try_from).transpose()
    }

    async fn mark_token_used(&mut self, hashed_token: &str) -> Result<u64, PersistenceError> {
        let result = sqlx::query(
            r#"
            UPDATE users_tokens
            SET used = TRUE, modified_at = NOW()
            WHERE hashed_token = $1 AND used = FALSE
            "#,
        )
        .bind(hashed_token)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl LinkStore for PgTx {
    async fn delete_links(
        &mut self,
        kind: EntityKind,
        relation: Relation,
        entity_id: i64,
    ) -> Result<u64, PersistenceError> {
        let layout = link_table(kind, relation);
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            layout.table, layout.owner_column
        );

        let result = sqlx::query(&sql)
            .bind(entity_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_links(
        &mut self,
        kind: EntityKind,
        relation: Relation,
        entity_id: i64,
        target_ids: &[i64],
    ) -> Result<(), PersistenceError> {
        insert_link_rows(&mut self.tx, kind, relation, entity_id, target_ids).await
    }
}

#[async_trait]
impl RepositoryTx for PgTx {
    async fn update_entity(
        &mut self,
        kind: EntityKind,
        id: i64,
        fields: &LinkedEntityFields,
    ) -> Result<u64, PersistenceError> {
        let sql = format!(
            r#"
            UPDATE {}
            SET title = $1, description = $2, link = $3, date = $4, body = $5, modified_at = NOW()
            WHERE id = $6 AND deleted_at IS NULL
            "#,
            kind.table()
        );

        let result = sqlx::query(&sql)
            .bind(&fields.title)
            .bind(&fields.description)
            .bind(&fields.link)
            .bind(fields.date)
            .bind(&fields.body)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn email_available(&mut self, email: &str) -> Result<bool, PersistenceError> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(!taken)
    }

    async fn user_exists(&mut self, user_id: i64) -> Result<bool, PersistenceError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn insert_credential(
        &mut self,
        credential: &NewCredential,
    ) -> Result<i64, PersistenceError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (email, password, role) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&credential.email)
        .bind(&credential.password_hash)
        .bind(credential.role.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(id)
    }

    async fn update_password(
        &mut self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<u64, PersistenceError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password = $1, modified_at = NOW()
            WHERE id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), PersistenceError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PersistenceError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// --- Pool level ---

#[async_trait]
impl Repository for PostgresRepository {
    async fn begin(&self) -> Result<Box<dyn RepositoryTx>, PersistenceError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn find_credential_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Credential>, PersistenceError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, email, password, role
            FROM users
            WHERE email = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Credential::try_from).transpose()
    }

    async fn insert_entity(
        &self,
        kind: EntityKind,
        fields: &LinkedEntityFields,
    ) -> Result<i64, PersistenceError> {
        let sql = format!(
            r#"
            INSERT INTO {} (title, description, link, date, body)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
            kind.table()
        );

        let id: i64 = sqlx::query_scalar(&sql)
            .bind(&fields.title)
            .bind(&fields.description)
            .bind(&fields.link)
            .bind(fields.date)
            .bind(&fields.body)
            .fetch_one(&self.pool)
            .await?;

        Ok(id)
    }

    async fn insert_links(
        &self,
        kind: EntityKind,
        relation: Relation,
        entity_id: i64,
        target_ids: &[i64],
    ) -> Result<(), PersistenceError> {
        let mut conn = self.pool.acquire().await?;
        insert_link_rows(&mut conn, kind, relation, entity_id, target_ids).await
    }
}

use async_trait::async_trait;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LinkStore, Relation, Repository, RepositoryTx, TokenStore};
use crate::{
    error::PersistenceError,
    models::{Credential, EntityKind, LinkedEntityFields, NewCredential, OneTimeToken},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: i64,
    credentials: BTreeMap<i64, Credential>,
    tokens: BTreeMap<String, OneTimeToken>,
    entities: BTreeMap<(EntityKind, i64), LinkedEntityFields>,
    links: BTreeSet<(EntityKind, Relation, i64, i64)>,
    fail_link_inserts: Option<Relation>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_links(
        &mut self,
        kind: EntityKind,
        relation: Relation,
        entity_id: i64,
        target_ids: &[i64],
    ) -> Result<(), PersistenceError> {
        if target_ids.is_empty() {
            return Ok(());
        }
        if self.fail_link_inserts == Some(relation) {
            return Err(PersistenceError::Store {
                message: format!("injected failure inserting {relation:?} links"),
            });
        }
        for &target_id in target_ids {
            if !self.links.insert((kind, relation, entity_id, target_id)) {
                return Err(PersistenceError::UniqueViolation {
                    constraint: format!("{relation:?}_pkey").to_lowercase(),
                });
            }
        }
        Ok(())
    }
}

/// MemoryRepository
///
/// In-process implementation of `Repository` for tests and local experiments.
///
/// A transaction takes the single state lock for its whole lifetime and works on
/// a private copy, so transactions are fully serialized. `commit` publishes the
/// copy; dropping the scope discards it.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Seeding ---

    pub async fn seed_credential(&self, credential: NewCredential) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        state.credentials.insert(
            id,
            Credential {
                id,
                email: credential.email,
                password_hash: credential.password_hash,
                role: credential.role,
            },
        );
        id
    }

    pub async fn seed_entity(&self, kind: EntityKind, fields: LinkedEntityFields) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        state.entities.insert((kind, id), fields);
        id
    }

    pub async fn seed_links(&self, kind: EntityKind, relation: Relation, entity_id: i64, ids: &[i64]) {
        let mut state = self.state.lock().await;
        for &target_id in ids {
            state.links.insert((kind, relation, entity_id, target_id));
        }
    }

    pub async fn seed_token(&self, token: OneTimeToken) {
        let mut state = self.state.lock().await;
        state.tokens.insert(token.hashed_token.clone(), token);
    }

    /// Make every subsequent link insert into `relation` fail.
    pub async fn fail_link_inserts(&self, relation: Relation) {
        self.state.lock().await.fail_link_inserts = Some(relation);
    }

    // --- Inspection ---

    pub async fn links(&self, kind: EntityKind, relation: Relation, entity_id: i64) -> BTreeSet<i64> {
        let state = self.state.lock().await;
        state
            .links
            .iter()
            .filter(|(k, r, owner, _)| *k == kind && *r == relation && *owner == entity_id)
            .map(|(_, _, _, target)| *target)
            .collect()
    }

    pub async fn entity(&self, kind: EntityKind, id: i64) -> Option<LinkedEntityFields> {
        self.state.lock().await.entities.get(&(kind, id)).cloned()
    }

    pub async fn credential(&self, id: i64) -> Option<Credential> {
        self.state.lock().await.credentials.get(&id).cloned()
    }

    pub async fn token(&self, hashed_token: &str) -> Option<OneTimeToken> {
        self.state.lock().await.tokens.get(hashed_token).cloned()
    }

    pub async fn token_count(&self) -> usize {
        self.state.lock().await.tokens.len()
    }
}

/// MemoryTx
///
/// Holds the state lock plus the uncommitted working copy.
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl TokenStore for MemoryTx {
    async fn insert_token(&mut self, token: &OneTimeToken) -> Result<(), PersistenceError> {
        if self.working.tokens.contains_key(&token.hashed_token) {
            return Err(PersistenceError::UniqueViolation {
                constraint: "users_tokens_hashed_token_key".to_string(),
            });
        }
        self.working
            .tokens
            .insert(token.hashed_token.clone(), token.clone());
        Ok(())
    }

    async fn find_token(
        &mut self,
        hashed_token: &str,
    ) -> Result<Option<OneTimeToken>, PersistenceError> {
        Ok(self.working.tokens.get(hashed_token).cloned())
    }

    async fn mark_token_used(&mut self, hashed_token: &str) -> Result<u64, PersistenceError> {
        match self.working.tokens.get_mut(hashed_token) {
            Some(token) if !token.used => {
                token.used = true;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

#[async_trait]
impl LinkStore for MemoryTx {
    async fn delete_links(
        &mut self,
        kind: EntityKind,
        relation: Relation,
        entity_id: i64,
    ) -> Result<u64, PersistenceError> {
        let before = self.working.links.len();
        self.working
            .links
            .retain(|(k, r, owner, _)| !(*k == kind && *r == relation && *owner == entity_id));
        Ok((before - self.working.links.len()) as u64)
    }

    async fn insert_links(
        &mut self,
        kind: EntityKind,
        relation: Relation,
        entity_id: i64,
        target_ids: &[i64],
    ) -> Result<(), PersistenceError> {
        self.working.insert_links(kind, relation, entity_id, target_ids)
    }
}

#[async_trait]
impl RepositoryTx for MemoryTx {
    async fn update_entity(
        &mut self,
        kind: EntityKind,
        id: i64,
        fields: &LinkedEntityFields,
    ) -> Result<u64, PersistenceError> {
        match self.working.entities.get_mut(&(kind, id)) {
            Some(existing) => {
                *existing = fields.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn email_available(&mut self, email: &str) -> Result<bool, PersistenceError> {
        Ok(!self.working.credentials.values().any(|c| c.email == email))
    }

    async fn user_exists(&mut self, user_id: i64) -> Result<bool, PersistenceError> {
        Ok(self.working.credentials.contains_key(&user_id))
    }

    async fn insert_credential(
        &mut self,
        credential: &NewCredential,
    ) -> Result<i64, PersistenceError> {
        if !self.email_available(&credential.email).await? {
            return Err(PersistenceError::UniqueViolation {
                constraint: "users_email_key".to_string(),
            });
        }
        let id = self.working.allocate_id();
        self.working.credentials.insert(
            id,
            Credential {
                id,
                email: credential.email.clone(),
                password_hash: credential.password_hash.clone(),
                role: credential.role,
            },
        );
        Ok(id)
    }

    async fn update_password(
        &mut self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<u64, PersistenceError> {
        match self.working.credentials.get_mut(&user_id) {
            Some(credential) => {
                credential.password_hash = password_hash.to_string();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), PersistenceError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PersistenceError> {
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn begin(&self) -> Result<Box<dyn RepositoryTx>, PersistenceError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn find_credential_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Credential>, PersistenceError> {
        let state = self.state.lock().await;
        Ok(state.credentials.values().find(|c| c.email == email).cloned())
    }

    async fn insert_entity(
        &self,
        kind: EntityKind,
        fields: &LinkedEntityFields,
    ) -> Result<i64, PersistenceError> {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        state.entities.insert((kind, id), fields.clone());
        Ok(id)
    }

    async fn insert_links(
        &self,
        kind: EntityKind,
        relation: Relation,
        entity_id: i64,
        target_ids: &[i64],
    ) -> Result<(), PersistenceError> {
        self.state
            .lock()
            .await
            .insert_links(kind, relation, entity_id, target_ids)
    }
}

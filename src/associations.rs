//! Full replacement of an entity's tag and platform links.

use std::collections::BTreeSet;

use crate::{
    error::Error,
    models::{EntityKind, LinkedEntityFields},
    repository::{LinkStore, Relation, Repository, RepositoryTx},
};

/// replace_all
///
/// Make the `relation` links of `entity_id` exactly `target_ids`: delete every
/// existing row, then insert the new set in one statement (skipped when empty).
///
/// This never commits. Both steps run on the caller's transaction, so a failure in
/// either leaves the previous set untouched once the caller rolls back.
pub async fn replace_all<S>(
    store: &mut S,
    kind: EntityKind,
    entity_id: i64,
    relation: Relation,
    target_ids: &BTreeSet<i64>,
) -> Result<(), Error>
where
    S: LinkStore + ?Sized,
{
    let removed = store.delete_links(kind, relation, entity_id).await?;

    if !target_ids.is_empty() {
        let ids: Vec<i64> = target_ids.iter().copied().collect();
        store.insert_links(kind, relation, entity_id, &ids).await?;
    }

    tracing::debug!(
        entity = kind.resource(),
        entity_id,
        relation = ?relation,
        removed,
        inserted = target_ids.len(),
        "links replaced"
    );
    Ok(())
}

/// edit_linked_entity
///
/// Overwrite an article/project and both of its link sets in one transaction.
/// Either every change lands or none does.
pub async fn edit_linked_entity(
    repo: &dyn Repository,
    kind: EntityKind,
    id: i64,
    fields: &LinkedEntityFields,
    tags: &[i64],
    platforms: &[i64],
) -> Result<(), Error> {
    let tags: BTreeSet<i64> = tags.iter().copied().collect();
    let platforms: BTreeSet<i64> = platforms.iter().copied().collect();

    let mut tx = repo.begin().await?;

    let updated = tx.update_entity(kind, id, fields).await?;
    if updated == 0 {
        tx.rollback().await?;
        return Err(Error::NotFound {
            resource: kind.resource().to_string(),
            id: id.to_string(),
        });
    }

    replace_all(&mut *tx, kind, id, Relation::Tags, &tags).await?;
    replace_all(&mut *tx, kind, id, Relation::Platforms, &platforms).await?;

    tx.commit().await?;

    tracing::info!(entity = kind.resource(), id, "entity updated");
    Ok(())
}

/// create_linked_entity
///
/// Insert an article/project, then its platform links, then its tag links, each
/// as its own statement. Not atomic: a failed link insert leaves the entity row
/// (and any links already written) in place.
pub async fn create_linked_entity(
    repo: &dyn Repository,
    kind: EntityKind,
    fields: &LinkedEntityFields,
    tags: &[i64],
    platforms: &[i64],
) -> Result<i64, Error> {
    let id = repo.insert_entity(kind, fields).await?;

    let platforms: Vec<i64> = platforms.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    let tags: Vec<i64> = tags.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();

    repo.insert_links(kind, Relation::Platforms, id, &platforms).await?;
    repo.insert_links(kind, Relation::Tags, id, &tags).await?;

    tracing::info!(entity = kind.resource(), id, "entity created");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;

    fn fields(title: &str) -> LinkedEntityFields {
        LinkedEntityFields {
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn set(ids: &[i64]) -> BTreeSet<i64> {
        ids.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_replace_all_overwrites() {
        let repo = MemoryRepository::new();
        let id = repo.seed_entity(EntityKind::Article, fields("a")).await;
        repo.seed_links(EntityKind::Article, Relation::Tags, id, &[1, 2, 3]).await;

        let mut tx = repo.begin().await.unwrap();
        replace_all(&mut *tx, EntityKind::Article, id, Relation::Tags, &set(&[3, 4]))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(repo.links(EntityKind::Article, Relation::Tags, id).await, set(&[3, 4]));
    }

    #[tokio::test]
    async fn test_replace_all_is_idempotent() {
        let repo = MemoryRepository::new();
        let id = repo.seed_entity(EntityKind::Project, fields("p")).await;

        for _ in 0..2 {
            let mut tx = repo.begin().await.unwrap();
            replace_all(&mut *tx, EntityKind::Project, id, Relation::Tags, &set(&[1, 2, 3]))
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        assert_eq!(
            repo.links(EntityKind::Project, Relation::Tags, id).await,
            set(&[1, 2, 3])
        );
    }

    #[tokio::test]
    async fn test_empty_set_clears_links() {
        let repo = MemoryRepository::new();
        let id = repo.seed_entity(EntityKind::Article, fields("a")).await;
        repo.seed_links(EntityKind::Article, Relation::Platforms, id, &[5]).await;
        // Would fail if an insert were attempted.
        repo.fail_link_inserts(Relation::Platforms).await;

        let mut tx = repo.begin().await.unwrap();
        replace_all(&mut *tx, EntityKind::Article, id, Relation::Platforms, &BTreeSet::new())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(repo.links(EntityKind::Article, Relation::Platforms, id).await.is_empty());
    }

    #[tokio::test]
    async fn test_edit_is_atomic() {
        let repo = MemoryRepository::new();
        let id = repo.seed_entity(EntityKind::Article, fields("before")).await;
        repo.seed_links(EntityKind::Article, Relation::Tags, id, &[1, 2]).await;
        repo.seed_links(EntityKind::Article, Relation::Platforms, id, &[10]).await;
        repo.fail_link_inserts(Relation::Platforms).await;

        let result =
            edit_linked_entity(&repo, EntityKind::Article, id, &fields("after"), &[3], &[11]).await;
        assert!(result.is_err());

        assert_eq!(repo.entity(EntityKind::Article, id).await.unwrap().title, "before");
        assert_eq!(repo.links(EntityKind::Article, Relation::Tags, id).await, set(&[1, 2]));
        assert_eq!(
            repo.links(EntityKind::Article, Relation::Platforms, id).await,
            set(&[10])
        );
    }

    #[tokio::test]
    async fn test_edit_replaces_everything() {
        let repo = MemoryRepository::new();
        let id = repo.seed_entity(EntityKind::Project, fields("before")).await;
        repo.seed_links(EntityKind::Project, Relation::Tags, id, &[1]).await;

        edit_linked_entity(&repo, EntityKind::Project, id, &fields("after"), &[2, 2, 3], &[9])
            .await
            .unwrap();

        assert_eq!(repo.entity(EntityKind::Project, id).await.unwrap().title, "after");
        assert_eq!(repo.links(EntityKind::Project, Relation::Tags, id).await, set(&[2, 3]));
        assert_eq!(repo.links(EntityKind::Project, Relation::Platforms, id).await, set(&[9]));
    }

    #[tokio::test]
    async fn test_edit_missing_entity_is_not_found() {
        let repo = MemoryRepository::new();

        let result =
            edit_linked_entity(&repo, EntityKind::Article, 404, &fields("x"), &[1], &[]).await;

        assert!(matches!(result, Err(Error::NotFound { .. })));
        assert!(repo.links(EntityKind::Article, Relation::Tags, 404).await.is_empty());
    }

    #[tokio::test]
    async fn test_create_is_not_atomic() {
        let repo = MemoryRepository::new();
        repo.fail_link_inserts(Relation::Tags).await;

        let result =
            create_linked_entity(&repo, EntityKind::Article, &fields("new"), &[1], &[2]).await;
        assert!(result.is_err());

        // Entity and platform links from before the failure survive.
        let id = 1;
        assert_eq!(repo.entity(EntityKind::Article, id).await.unwrap().title, "new");
        assert_eq!(repo.links(EntityKind::Article, Relation::Platforms, id).await, set(&[2]));
    }
}

// Warden
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Generic repository over the entity tables
//!
//! [`Repository`] knows nothing about access control: callers authorize first and only then
//! read or write. Each public operation runs in exactly one [`Store::run`] unit of work.

use crate::error::StoreError;
use crate::models::{Group, link_rights};
use crate::store::Store;
use async_trait::async_trait;
use sqlx::query_builder::Separated;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::marker::PhantomData;
use tracing::debug;

/// Column an entity can be looked up by
pub trait Column: Copy + Send + Sync + 'static {
    fn name(&self) -> &'static str;
}

/// Value compared against a column in [`Repository::get_by_field`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    Text(String),
    Null,
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Option<i64>> for Value {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Value::Null, Value::Integer)
    }
}

/// A table-backed entity
#[async_trait]
pub trait Entity: for<'r> FromRow<'r, SqliteRow> + Send + Sync + Unpin + 'static {
    const TABLE: &'static str;

    /// Columns selected when reading a row
    const COLUMNS: &'static [&'static str];

    type Field: Column;

    /// Payload creating a new row
    type New: Insertable;

    fn id(&self) -> i64;

    /// Load related rows that are not part of the entity's own table.
    async fn load_relations(&mut self, _conn: &mut SqliteConnection) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Payload inserted as one row
#[async_trait]
pub trait Insertable: Send + Sync + 'static {
    const COLUMNS: &'static [&'static str];

    /// Bind one value per entry of `COLUMNS`, in the same order.
    fn bind_values<'args>(&self, values: &mut Separated<'_, 'args, Sqlite, &'static str>);

    /// Hook running in the same transaction after the row was written.
    async fn after_insert(&self, _id: i64, _conn: &mut SqliteConnection) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Partial update of a row
pub trait Patchable: Send + Sync + 'static {
    fn is_empty(&self) -> bool;

    /// Push `column = value` assignments for every field that is set.
    fn bind_assignments<'args>(&self, set: &mut Separated<'_, 'args, Sqlite, &'static str>);
}

/// Entity whose rows may be patched after creation
pub trait Mutable: Entity {
    type Patch: Patchable;
}

fn select_from<E: Entity>() -> String {
    format!("SELECT {} FROM {} WHERE ", E::COLUMNS.join(", "), E::TABLE)
}

async fn fetch_by_id<E: Entity>(conn: &mut SqliteConnection, id: i64) -> Result<Option<E>, StoreError> {
    let mut builder = QueryBuilder::<Sqlite>::new(select_from::<E>());
    builder.push("id = ").push_bind(id);

    match builder.build_query_as::<E>().fetch_optional(&mut *conn).await? {
        Some(mut entity) => {
            entity.load_relations(&mut *conn).await?;
            Ok(Some(entity))
        }
        None => Ok(None),
    }
}

pub(crate) async fn insert_row<E: Entity>(conn: &mut SqliteConnection, new: &E::New) -> Result<E, StoreError> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("INSERT INTO {} ({}) ", E::TABLE, <E::New as Insertable>::COLUMNS.join(", ")));
    builder.push_values(std::iter::once(new), |mut values, new| new.bind_values(&mut values));
    builder.push(format!(" RETURNING {}", E::COLUMNS.join(", ")));

    let mut entity = builder.build_query_as::<E>().fetch_one(&mut *conn).await?;
    new.after_insert(entity.id(), &mut *conn).await?;
    entity.load_relations(&mut *conn).await?;
    Ok(entity)
}

/// Create, read and update operations for one entity type
pub struct Repository<E> {
    store: Store,
    entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(store: Store) -> Self {
        Self { store, entity: PhantomData }
    }

    /// Fetch a row by primary key. Absence is `Ok(None)`, never an error.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<E>, StoreError> {
        self.store.run(move |conn| Box::pin(async move { fetch_by_id::<E>(conn, id).await })).await
    }

    /// Equality lookup on one column, empty when nothing matches.
    pub async fn get_by_field(&self, field: E::Field, value: impl Into<Value>) -> Result<Vec<E>, StoreError> {
        let value = value.into();
        let column = field.name();

        self.store
            .run(move |conn| {
                Box::pin(async move {
                    let mut builder = QueryBuilder::<Sqlite>::new(select_from::<E>());
                    builder.push(column);
                    match value {
                        Value::Integer(value) => builder.push(" = ").push_bind(value),
                        Value::Text(value) => builder.push(" = ").push_bind(value),
                        Value::Null => builder.push(" IS NULL"),
                    };
                    builder.push(" ORDER BY id");

                    let mut entities = builder.build_query_as::<E>().fetch_all(&mut *conn).await?;
                    for entity in entities.iter_mut() {
                        entity.load_relations(&mut *conn).await?;
                    }
                    Ok(entities)
                })
            })
            .await
    }

    /// Persist one row. A uniqueness violation surfaces as [`StoreError::AlreadyExists`].
    pub async fn insert(&self, new: E::New) -> Result<E, StoreError> {
        let entity = self.store.run(move |conn| Box::pin(async move { insert_row::<E>(conn, &new).await })).await?;
        debug!("Inserted {} row {}", E::TABLE, entity.id());
        Ok(entity)
    }

    /// Persist several rows atomically: either all of them are written or none is.
    pub async fn insert_many(&self, news: Vec<E::New>) -> Result<Vec<E>, StoreError> {
        let entities = self
            .store
            .run(move |conn| {
                Box::pin(async move {
                    let mut entities = Vec::with_capacity(news.len());
                    for new in &news {
                        entities.push(insert_row::<E>(&mut *conn, new).await?);
                    }
                    Ok(entities)
                })
            })
            .await?;
        debug!("Inserted {} {} rows", entities.len(), E::TABLE);
        Ok(entities)
    }

    /// Apply `patch` to the row behind `entity` and return the re-read row.
    ///
    /// Concurrent patches of one row are ordered by the store's isolation only.
    pub async fn patch(&self, entity: E, patch: E::Patch) -> Result<E, StoreError>
    where
        E: Mutable,
    {
        if patch.is_empty() {
            return Ok(entity);
        }
        let id = entity.id();

        self.store
            .run(move |conn| {
                Box::pin(async move {
                    let mut builder = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", E::TABLE));
                    {
                        let mut set = builder.separated(", ");
                        patch.bind_assignments(&mut set);
                    }
                    builder.push(" WHERE id = ").push_bind(id);
                    builder.push(format!(" RETURNING {}", E::COLUMNS.join(", ")));

                    let mut updated = builder
                        .build_query_as::<E>()
                        .fetch_optional(&mut *conn)
                        .await?
                        .ok_or(StoreError::NotFound { table: E::TABLE, id })?;
                    updated.load_relations(&mut *conn).await?;
                    Ok(updated)
                })
            })
            .await
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl Repository<Group> {
    /// Associate additional rights with an existing group.
    pub async fn attach_rights(&self, group_id: i64, right_ids: Vec<i64>) -> Result<Group, StoreError> {
        self.store
            .run(move |conn| {
                Box::pin(async move {
                    if fetch_by_id::<Group>(&mut *conn, group_id).await?.is_none() {
                        return Err(StoreError::NotFound { table: "groups", id: group_id });
                    }
                    link_rights(&mut *conn, group_id, &right_ids).await?;
                    fetch_by_id::<Group>(&mut *conn, group_id)
                        .await?
                        .ok_or(StoreError::NotFound { table: "groups", id: group_id })
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreBuilder;
    use std::sync::Arc;
    use crate::models::{
        Access, NewGroup, NewPost, NewRight, NewUser, Post, PostField, PostPatch, ResourceType, Right, RightField, Scope, User, UserField,
    };

    fn post_read_all() -> NewRight {
        NewRight::new(ResourceType::Post, Access::Read, Scope::All)
    }

    #[tokio::test]
    async fn missing_row_is_none_every_time() {
        let store = Store::temporary().await;
        let posts = Repository::<Post>::new(store);

        assert_eq!(posts.get_by_id(42).await.unwrap(), None);
        assert_eq!(posts.get_by_id(42).await.unwrap(), None);
        assert!(posts.get_by_field(PostField::Id, 42).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_right_conflicts() {
        let store = Store::temporary().await;
        let rights = Repository::<Right>::new(store);

        let first = rights.insert(post_read_all()).await.unwrap();
        assert_eq!(first.object, ResourceType::Post);
        assert_eq!(first.scope, Scope::All);

        let second = rights.insert(post_read_all()).await;
        assert!(matches!(second, Err(StoreError::AlreadyExists { .. })));

        let stored = rights.get_by_field(RightField::Object, "post").await.unwrap();
        assert_eq!(stored, vec![first]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_inserts_yield_one_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("warden.db").display());
        let store = StoreBuilder::new().database_url(&url).max_connections(4).build().await.unwrap();
        let rights = Repository::<Right>::new(store.clone());

        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let rights = rights.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    rights.insert(post_read_all()).await
                })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }

        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        assert!(results.iter().any(|result| matches!(result, Err(StoreError::AlreadyExists { .. }))), "{results:?}");
        assert_eq!(rights.get_by_field(RightField::Object, "post").await.unwrap().len(), 1);
        store.close().await;
    }

    #[tokio::test]
    async fn insert_many_is_atomic() {
        let store = Store::temporary().await;
        let rights = Repository::<Right>::new(store);

        let batch = vec![
            NewRight::new(ResourceType::User, Access::Read, Scope::All),
            NewRight::new(ResourceType::User, Access::Write, Scope::All),
            NewRight::new(ResourceType::User, Access::Read, Scope::All),
        ];
        assert!(matches!(rights.insert_many(batch).await, Err(StoreError::AlreadyExists { .. })));
        assert!(rights.get_by_field(RightField::Object, "user").await.unwrap().is_empty());

        let batch = vec![
            NewRight::new(ResourceType::User, Access::Read, Scope::All),
            NewRight::new(ResourceType::User, Access::Write, Scope::Own),
        ];
        let created = rights.insert_many(batch).await.unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[1].scope, Scope::Own);
    }

    #[tokio::test]
    async fn groups_carry_their_rights() {
        let store = Store::temporary().await;
        let rights = Repository::<Right>::new(store.clone());
        let groups = Repository::<Group>::new(store);

        let created = rights
            .insert_many(vec![
                NewRight::new(ResourceType::Post, Access::Read, Scope::All),
                NewRight::new(ResourceType::Post, Access::Write, Scope::Own),
            ])
            .await
            .unwrap();

        let group = groups.insert(NewGroup::new("authors", &created[..1])).await.unwrap();
        assert_eq!(group.rights, vec![created[0].clone()]);

        let group = groups.attach_rights(group.id, vec![created[1].id, created[0].id]).await.unwrap();
        assert_eq!(group.rights, created);

        let loaded = groups.get_by_id(group.id).await.unwrap().unwrap();
        assert_eq!(loaded.rights.len(), 2);

        let duplicate = groups.insert(NewGroup::new("authors", &[])).await;
        assert!(matches!(duplicate, Err(StoreError::AlreadyExists { .. })));

        assert!(matches!(groups.attach_rights(999, vec![created[0].id]).await, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn users_are_looked_up_by_email_and_group_must_exist() {
        let store = Store::temporary().await;
        let users = Repository::<User>::new(store);

        let new_user = NewUser::with_password("alice@example.com", "Secret123", None).await.unwrap();
        let alice = users.insert(new_user).await.unwrap();
        assert_ne!(alice.password_hash, "Secret123");

        let found = users.get_by_field(UserField::Email, "alice@example.com").await.unwrap();
        assert_eq!(found, vec![alice.clone()]);

        let ungrouped = users.get_by_field(UserField::GroupId, None::<i64>).await.unwrap();
        assert_eq!(ungrouped.len(), 1);

        let orphan = NewUser::with_password("bob@example.com", "Secret123", Some(77)).await.unwrap();
        assert!(matches!(users.insert(orphan).await, Err(StoreError::MissingReference { .. })));
    }

    #[tokio::test]
    async fn patch_updates_only_given_fields() {
        let store = Store::temporary().await;
        let users = Repository::<User>::new(store.clone());
        let posts = Repository::<Post>::new(store);

        let owner = users.insert(NewUser::with_password("owner@example.com", "Secret123", None).await.unwrap()).await.unwrap();

        let post = posts
            .insert(NewPost {
                owner_id: Some(owner.id),
                title: "title".to_string(),
                text: "text".to_string(),
            })
            .await
            .unwrap();

        let patched = posts
            .patch(
                post.clone(),
                PostPatch {
                    title: Some("new title".to_string()),
                    text: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.title, "new title");
        assert_eq!(patched.text, "text");
        assert_eq!(posts.get_by_id(post.id).await.unwrap(), Some(patched.clone()));

        let unchanged = posts.patch(patched.clone(), PostPatch::default()).await.unwrap();
        assert_eq!(unchanged, patched);

        let ghost = Post { id: 404, ..patched };
        let missing = posts
            .patch(
                ghost,
                PostPatch {
                    title: Some("x".to_string()),
                    text: None,
                },
            )
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound { table: "posts", id: 404 })));
    }
}

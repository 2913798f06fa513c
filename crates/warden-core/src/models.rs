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

//! Entity definitions and their privilege vocabulary
//!
//! Every entity is a plain typed struct mirroring one table row. The payloads used to
//! create or modify rows are separate types so that, for example, a stored user can never
//! be constructed from a plaintext password.

use crate::error::{StoreError, UnknownVariant};
use crate::password;
use crate::repository::{Column, Entity, Insertable, Mutable, Patchable};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::query_builder::Separated;
use sqlx::{FromRow, Sqlite, SqliteConnection};
use std::fmt;

// ====== Privilege vocabulary ======

/// Resource type a right applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    User,
    Group,
    Right,
    Post,
}

impl ResourceType {
    pub const ALL: [ResourceType; 4] = [ResourceType::User, ResourceType::Group, ResourceType::Right, ResourceType::Post];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::User => "user",
            ResourceType::Group => "group",
            ResourceType::Right => "right",
            ResourceType::Post => "post",
        }
    }
}

/// Requested or granted action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    Write,
}

impl Access {
    pub const ALL: [Access; 2] = [Access::Read, Access::Write];

    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "write",
        }
    }
}

/// Whether a right covers only owned resources or every resource of its type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "self")]
    Own,
    #[serde(rename = "all")]
    All,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Own => "self",
            Scope::All => "all",
        }
    }
}

macro_rules! text_enum {
    ($ty:ident, $kind:literal, [$($variant:path),+]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                $(
                    if value == $variant.as_str() {
                        return Ok($variant);
                    }
                )+
                Err(UnknownVariant {
                    kind: $kind,
                    value: value.to_string(),
                })
            }
        }

        impl TryFrom<String> for $ty {
            type Error = UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

text_enum!(ResourceType, "object", [ResourceType::User, ResourceType::Group, ResourceType::Right, ResourceType::Post]);
text_enum!(Access, "access", [Access::Read, Access::Write]);
text_enum!(Scope, "scope", [Scope::Own, Scope::All]);

// ====== Right ======

/// One granted capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Right {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub object: ResourceType,
    #[sqlx(try_from = "String")]
    pub access: Access,
    #[sqlx(try_from = "String")]
    pub scope: Scope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRight {
    pub object: ResourceType,
    pub access: Access,
    pub scope: Scope,
}

impl NewRight {
    pub fn new(object: ResourceType, access: Access, scope: Scope) -> Self {
        Self { object, access, scope }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightField {
    Id,
    Object,
    Access,
    Scope,
}

impl Column for RightField {
    fn name(&self) -> &'static str {
        match self {
            RightField::Id => "id",
            RightField::Object => "object",
            RightField::Access => "access",
            RightField::Scope => "scope",
        }
    }
}

impl Entity for Right {
    const TABLE: &'static str = "rights";
    const COLUMNS: &'static [&'static str] = &["id", "object", "access", "scope"];
    type Field = RightField;
    type New = NewRight;

    fn id(&self) -> i64 {
        self.id
    }
}

impl Insertable for NewRight {
    const COLUMNS: &'static [&'static str] = &["object", "access", "scope"];

    fn bind_values<'args>(&self, values: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        values
            .push_bind(self.object.to_string())
            .push_bind(self.access.to_string())
            .push_bind(self.scope.to_string());
    }
}

// ====== Group ======

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: i64,
    pub name: String,
    /// Loaded eagerly by the repository
    #[sqlx(skip)]
    pub rights: Vec<Right>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
    pub right_ids: Vec<i64>,
}

impl NewGroup {
    pub fn new(name: impl Into<String>, rights: &[Right]) -> Self {
        Self {
            name: name.into(),
            right_ids: rights.iter().map(|right| right.id).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupPatch {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    Id,
    Name,
}

impl Column for GroupField {
    fn name(&self) -> &'static str {
        match self {
            GroupField::Id => "id",
            GroupField::Name => "name",
        }
    }
}

/// Insert a right unless an equal one is stored already, returning the stored row either way.
pub(crate) async fn ensure_right(conn: &mut SqliteConnection, right: &NewRight) -> Result<Right, StoreError> {
    let (object, access, scope) = (right.object.to_string(), right.access.to_string(), right.scope.to_string());

    sqlx::query("INSERT OR IGNORE INTO rights (object, access, scope) VALUES (?, ?, ?)")
        .bind(&object)
        .bind(&access)
        .bind(&scope)
        .execute(&mut *conn)
        .await?;

    let right = sqlx::query_as::<_, Right>("SELECT id, object, access, scope FROM rights WHERE object = ? AND access = ? AND scope = ?")
        .bind(object)
        .bind(access)
        .bind(scope)
        .fetch_one(&mut *conn)
        .await?;
    Ok(right)
}

/// Link rights to a group, ignoring pairs that are already linked.
pub(crate) async fn link_rights(conn: &mut SqliteConnection, group_id: i64, right_ids: &[i64]) -> Result<(), StoreError> {
    for right_id in right_ids {
        sqlx::query("INSERT OR IGNORE INTO group_rights (group_id, right_id) VALUES (?, ?)")
            .bind(group_id)
            .bind(*right_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl Entity for Group {
    const TABLE: &'static str = "groups";
    const COLUMNS: &'static [&'static str] = &["id", "name"];
    type Field = GroupField;
    type New = NewGroup;

    fn id(&self) -> i64 {
        self.id
    }

    async fn load_relations(&mut self, conn: &mut SqliteConnection) -> Result<(), StoreError> {
        self.rights = sqlx::query_as::<_, Right>(
            "
            SELECT
                rights.id,
                rights.object,
                rights.access,
                rights.scope
            FROM
                rights
            JOIN
                group_rights ON group_rights.right_id = rights.id
            WHERE
                group_rights.group_id = ?
            ORDER BY
                rights.id
            ",
        )
        .bind(self.id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Insertable for NewGroup {
    const COLUMNS: &'static [&'static str] = &["name"];

    fn bind_values<'args>(&self, values: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        values.push_bind(self.name.clone());
    }

    async fn after_insert(&self, id: i64, conn: &mut SqliteConnection) -> Result<(), StoreError> {
        link_rights(conn, id, &self.right_ids).await
    }
}

impl Patchable for GroupPatch {
    fn is_empty(&self) -> bool {
        self.name.is_none()
    }

    fn bind_assignments<'args>(&self, set: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        if let Some(name) = &self.name {
            set.push("name = ").push_bind_unseparated(name.clone());
        }
    }
}

impl Mutable for Group {
    type Patch = GroupPatch;
}

// ====== User ======

/// Registered account. The password hash is never serialized back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub group_id: Option<i64>,
}

impl User {
    /// Check a candidate password against the stored hash, off the async executor.
    pub async fn check_password(&self, candidate: &str) -> Result<bool, crate::error::AuthError> {
        password::verify(self.password_hash.clone(), candidate.to_string()).await
    }
}

/// Payload creating a user. Only constructible with an already hashed password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    password_hash: String,
    pub group_id: Option<i64>,
}

impl NewUser {
    /// Hash `password` with a fresh salt and build the insert payload.
    pub async fn with_password(email: impl Into<String>, password: &str, group_id: Option<i64>) -> Result<Self, crate::error::AuthError> {
        let password_hash = password::hash(password.to_string()).await?;
        Ok(Self {
            email: email.into(),
            password_hash,
            group_id,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub email: Option<String>,
    pub group_id: Option<Option<i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Id,
    Email,
    GroupId,
}

impl Column for UserField {
    fn name(&self) -> &'static str {
        match self {
            UserField::Id => "id",
            UserField::Email => "email",
            UserField::GroupId => "group_id",
        }
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &["id", "email", "password_hash", "group_id"];
    type Field = UserField;
    type New = NewUser;

    fn id(&self) -> i64 {
        self.id
    }
}

impl Insertable for NewUser {
    const COLUMNS: &'static [&'static str] = &["email", "password_hash", "group_id"];

    fn bind_values<'args>(&self, values: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        values.push_bind(self.email.clone()).push_bind(self.password_hash.clone()).push_bind(self.group_id);
    }
}

impl Patchable for UserPatch {
    fn is_empty(&self) -> bool {
        self.email.is_none() && self.group_id.is_none()
    }

    fn bind_assignments<'args>(&self, set: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        if let Some(email) = &self.email {
            set.push("email = ").push_bind_unseparated(email.clone());
        }
        if let Some(group_id) = self.group_id {
            set.push("group_id = ").push_bind_unseparated(group_id);
        }
    }
}

impl Mutable for User {
    type Patch = UserPatch;
}

// ====== AccessToken ======

/// Opaque bearer token issued on login. Rows are never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AccessToken {
    pub id: i64,
    pub token: String,
    pub user_id: i64,
    pub creation_time: DateTime<Utc>,
}

impl AccessToken {
    /// Expiry is computed at read time from the creation timestamp.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.is_expired_at(Utc::now(), ttl)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.creation_time > ttl
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccessToken {
    pub token: String,
    pub user_id: i64,
    pub creation_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTokenField {
    Id,
    Token,
    UserId,
}

impl Column for AccessTokenField {
    fn name(&self) -> &'static str {
        match self {
            AccessTokenField::Id => "id",
            AccessTokenField::Token => "token",
            AccessTokenField::UserId => "user_id",
        }
    }
}

impl Entity for AccessToken {
    const TABLE: &'static str = "access_tokens";
    const COLUMNS: &'static [&'static str] = &["id", "token", "user_id", "creation_time"];
    type Field = AccessTokenField;
    type New = NewAccessToken;

    fn id(&self) -> i64 {
        self.id
    }
}

impl Insertable for NewAccessToken {
    const COLUMNS: &'static [&'static str] = &["token", "user_id", "creation_time"];

    fn bind_values<'args>(&self, values: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        values.push_bind(self.token.clone()).push_bind(self.user_id).push_bind(self.creation_time);
    }
}

// ====== Post ======

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub owner_id: Option<i64>,
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub owner_id: Option<i64>,
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostPatch {
    pub title: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostField {
    Id,
    OwnerId,
    Title,
}

impl Column for PostField {
    fn name(&self) -> &'static str {
        match self {
            PostField::Id => "id",
            PostField::OwnerId => "owner_id",
            PostField::Title => "title",
        }
    }
}

impl Entity for Post {
    const TABLE: &'static str = "posts";
    const COLUMNS: &'static [&'static str] = &["id", "owner_id", "title", "text"];
    type Field = PostField;
    type New = NewPost;

    fn id(&self) -> i64 {
        self.id
    }
}

impl Insertable for NewPost {
    const COLUMNS: &'static [&'static str] = &["owner_id", "title", "text"];

    fn bind_values<'args>(&self, values: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        values.push_bind(self.owner_id).push_bind(self.title.clone()).push_bind(self.text.clone());
    }
}

impl Patchable for PostPatch {
    fn is_empty(&self) -> bool {
        self.title.is_none() && self.text.is_none()
    }

    fn bind_assignments<'args>(&self, set: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        if let Some(title) = &self.title {
            set.push("title = ").push_bind_unseparated(title.clone());
        }
        if let Some(text) = &self.text {
            set.push("text = ").push_bind_unseparated(text.clone());
        }
    }
}

impl Mutable for Post {
    type Patch = PostPatch;
}

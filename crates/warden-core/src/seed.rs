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

//! Default groups and rights for a fresh database

use crate::error::{AuthError, StoreError};
use crate::models::{Access, Group, NewGroup, NewRight, NewUser, ResourceType, Right, Scope, User, ensure_right};
use crate::repository::insert_row;
use crate::store::Store;
use sqlx::SqliteConnection;
use tracing::info;

pub const ADMIN_GROUP: &str = "admin";
pub const USER_GROUP: &str = "user";

/// Privileged account created alongside the default groups
#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Defaults {
    pub admin_group: Group,
    pub user_group: Group,
    pub admin: Option<User>,
}

fn admin_rights() -> Vec<NewRight> {
    ResourceType::ALL
        .iter()
        .flat_map(|object| Access::ALL.iter().map(move |access| NewRight::new(*object, *access, Scope::All)))
        .collect()
}

fn user_rights() -> Vec<NewRight> {
    vec![
        NewRight::new(ResourceType::User, Access::Write, Scope::Own),
        NewRight::new(ResourceType::User, Access::Read, Scope::Own),
        NewRight::new(ResourceType::Post, Access::Write, Scope::Own),
        // Regular users may read every post.
        NewRight::new(ResourceType::Post, Access::Read, Scope::All),
    ]
}

async fn ensure_rights(conn: &mut SqliteConnection, rights: Vec<NewRight>) -> Result<Vec<Right>, StoreError> {
    let mut stored = Vec::with_capacity(rights.len());
    for right in &rights {
        stored.push(ensure_right(&mut *conn, right).await?);
    }
    Ok(stored)
}

/// Install the `admin` and `user` groups with their rights.
///
/// Everything happens in one unit of work: either both groups, their rights and the admin
/// account are stored, or nothing is. Rights that already exist are reused. Returns
/// `Ok(None)` without touching anything when the admin group already exists.
pub async fn install_defaults(store: &Store, admin: Option<AdminAccount>) -> Result<Option<Defaults>, AuthError> {
    // Hashing is slow, so it happens before the transaction is opened.
    let new_admin = match admin {
        Some(account) => Some(NewUser::with_password(account.email, &account.password, None).await?),
        None => None,
    };

    let defaults = store
        .run(move |conn| {
            Box::pin(async move {
                let installed: Option<(i64,)> = sqlx::query_as("SELECT id FROM groups WHERE name = ?")
                    .bind(ADMIN_GROUP)
                    .fetch_optional(&mut *conn)
                    .await?;
                if installed.is_some() {
                    return Ok(None);
                }

                let admin_rights = ensure_rights(&mut *conn, admin_rights()).await?;
                let user_rights = ensure_rights(&mut *conn, user_rights()).await?;

                let admin_group = insert_row::<Group>(&mut *conn, &NewGroup::new(ADMIN_GROUP, &admin_rights)).await?;
                let user_group = insert_row::<Group>(&mut *conn, &NewGroup::new(USER_GROUP, &user_rights)).await?;

                let admin = match new_admin {
                    Some(mut new_user) => {
                        new_user.group_id = Some(admin_group.id);
                        Some(insert_row::<User>(&mut *conn, &new_user).await?)
                    }
                    None => None,
                };

                Ok(Some(Defaults { admin_group, user_group, admin }))
            })
        })
        .await?;

    match &defaults {
        Some(_) => info!("Installed default groups '{}' and '{}'", ADMIN_GROUP, USER_GROUP),
        None => info!("Default groups already installed"),
    }

    Ok(defaults)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessEvaluator, Identity, Target};
    use crate::models::{GroupField, Post, RightField};
    use crate::repository::Repository;

    #[tokio::test]
    async fn installs_once() {
        let store = Store::temporary().await;
        let account = AdminAccount {
            email: "admin@example.com".to_string(),
            password: "Admin1234".to_string(),
        };

        let defaults = install_defaults(&store, Some(account)).await.unwrap().unwrap();
        assert_eq!(defaults.admin_group.rights.len(), 8);
        assert_eq!(defaults.user_group.rights.len(), 4);
        assert_eq!(defaults.admin.as_ref().map(|admin| admin.group_id), Some(Some(defaults.admin_group.id)));

        assert!(install_defaults(&store, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reuses_rights_that_already_exist() {
        let store = Store::temporary().await;
        let existing = Repository::<Right>::new(store.clone())
            .insert(NewRight::new(ResourceType::User, Access::Read, Scope::Own))
            .await
            .unwrap();

        let defaults = install_defaults(&store, None).await.unwrap().unwrap();
        assert_eq!(defaults.user_group.rights.len(), 4);
        assert!(defaults.user_group.rights.iter().any(|right| right.id == existing.id));

        let stored = Repository::<Right>::new(store).get_by_field(RightField::Scope, "self").await.unwrap();
        assert_eq!(stored.len(), 3);
    }

    #[tokio::test]
    async fn failed_install_leaves_nothing_behind() {
        let store = Store::temporary().await;
        let users = Repository::<User>::new(store.clone());
        users
            .insert(NewUser::with_password("admin@example.com", "Other1234", None).await.unwrap())
            .await
            .unwrap();

        let account = AdminAccount {
            email: "admin@example.com".to_string(),
            password: "Admin1234".to_string(),
        };
        let err = install_defaults(&store, Some(account)).await.unwrap_err();
        assert!(matches!(err, AuthError::Store(StoreError::AlreadyExists { .. })), "{err:?}");

        let rights = Repository::<Right>::new(store.clone());
        assert!(rights.get_by_field(RightField::Scope, "all").await.unwrap().is_empty());
        assert!(Repository::<Group>::new(store.clone()).get_by_field(GroupField::Name, ADMIN_GROUP).await.unwrap().is_empty());

        // Nothing half-installed blocks a later attempt.
        let defaults = install_defaults(&store, None).await.unwrap().unwrap();
        assert_eq!(defaults.admin_group.rights.len(), 8);
    }

    #[tokio::test]
    async fn default_user_group_reads_all_posts() {
        let store = Store::temporary().await;
        let defaults = install_defaults(&store, None).await.unwrap().unwrap();

        let member = Identity::new(
            User {
                id: 99,
                email: "member@example.com".to_string(),
                password_hash: String::new(),
                group_id: Some(defaults.user_group.id),
            },
            Some(defaults.user_group),
        );
        let foreign_post = Post {
            id: 1,
            owner_id: Some(1),
            title: "t".to_string(),
            text: "x".to_string(),
        };

        let evaluator = AccessEvaluator::new();
        assert!(evaluator.authorize(&member, Target::of(&foreign_post), Access::Read).is_allowed());
        assert!(!evaluator.authorize(&member, Target::of(&foreign_post), Access::Write).is_allowed());
        assert!(!evaluator.authorize(&member, Target::type_of::<Right>(), Access::Read).is_allowed());
    }
}

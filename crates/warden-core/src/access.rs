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

//! Access evaluation over (resource type, access, scope) privileges
//!
//! A user's privileges are the rights of their group. Ownership of the target decides
//! whether `self` scoped rights count in addition to `all` scoped ones. The evaluator has
//! no side effects: a denial leaves nothing to undo.

use crate::error::AccessError;
use crate::models::{Access, Group, NewPost, Post, ResourceType, Right, Scope, User};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Entity guarded by the access model
pub trait Guarded {
    /// Constant resource tag of the entity type
    fn resource_type() -> ResourceType;

    /// User owning this instance, if any
    fn owner_id(&self) -> Option<i64>;
}

impl Guarded for User {
    fn resource_type() -> ResourceType {
        ResourceType::User
    }

    /// A user owns their own account.
    fn owner_id(&self) -> Option<i64> {
        Some(self.id)
    }
}

impl Guarded for Group {
    fn resource_type() -> ResourceType {
        ResourceType::Group
    }

    fn owner_id(&self) -> Option<i64> {
        None
    }
}

impl Guarded for Right {
    fn resource_type() -> ResourceType {
        ResourceType::Right
    }

    fn owner_id(&self) -> Option<i64> {
        None
    }
}

impl Guarded for Post {
    fn resource_type() -> ResourceType {
        ResourceType::Post
    }

    fn owner_id(&self) -> Option<i64> {
        self.owner_id
    }
}

/// A post about to be created already names its owner.
impl Guarded for NewPost {
    fn resource_type() -> ResourceType {
        ResourceType::Post
    }

    fn owner_id(&self) -> Option<i64> {
        self.owner_id
    }
}

/// What an access check is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A resource type as a whole; never owned by anyone
    Type(ResourceType),

    /// One concrete resource
    Instance { resource: ResourceType, owner_id: Option<i64> },
}

impl Target {
    pub fn of<T: Guarded>(item: &T) -> Self {
        Target::Instance {
            resource: T::resource_type(),
            owner_id: item.owner_id(),
        }
    }

    pub fn type_of<T: Guarded>() -> Self {
        Target::Type(T::resource_type())
    }

    pub fn resource(&self) -> ResourceType {
        match self {
            Target::Type(resource) => *resource,
            Target::Instance { resource, .. } => *resource,
        }
    }

    /// Whether `user_id` owns the target. Type level targets have no owner.
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        matches!(self, Target::Instance { owner_id: Some(owner), .. } if *owner == user_id)
    }
}

/// One (object, access, scope) triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Privilege {
    pub object: ResourceType,
    pub access: Access,
    pub scope: Scope,
}

impl From<&Right> for Privilege {
    fn from(right: &Right) -> Self {
        Self {
            object: right.object,
            access: right.access,
            scope: right.scope,
        }
    }
}

pub type PrivilegeSet = HashSet<Privilege>;

/// Authenticated user together with the group their privileges come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: User,
    pub group: Option<Group>,
}

impl Identity {
    pub fn new(user: User, group: Option<Group>) -> Self {
        Self { user, group }
    }

    /// Union of the group's rights; empty without a group.
    pub fn privileges(&self) -> PrivilegeSet {
        self.group.iter().flat_map(|group| group.rights.iter()).map(Privilege::from).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Decides whether an identity may perform an action on a target
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessEvaluator;

impl AccessEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn authorize(&self, identity: &Identity, target: Target, access: Access) -> Decision {
        let object = target.resource();
        let scopes: &[Scope] = if target.is_owned_by(identity.user.id) { &[Scope::Own, Scope::All] } else { &[Scope::All] };

        let privileges = identity.privileges();
        let allowed = scopes.iter().any(|scope| {
            privileges.contains(&Privilege {
                object,
                access,
                scope: *scope,
            })
        });

        if allowed {
            Decision::Allow
        } else {
            debug!("Denied {} on {} for user {}", access, object, identity.user.id);
            Decision::Deny
        }
    }

    /// Like [`AccessEvaluator::authorize`] but a denial is an error.
    pub fn ensure(&self, identity: &Identity, target: Target, access: Access) -> Result<(), AccessError> {
        match self.authorize(identity, target, access) {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(AccessError::Forbidden {
                resource: target.resource(),
                access,
            }),
        }
    }
}

//! Role and permission requirements evaluated against an [`IdentityContext`].

use std::fmt;

use crate::auth::context::IdentityContext;
use crate::error::{Result, TokenGateError};

/// A single access requirement.
///
/// Comparisons are case-insensitive. An anonymous identity carries no roles
/// or permissions, so every requirement that needs one fails closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    HasRole(String),
    /// `all = true`: every role must be held. `all = false`: at least one.
    HasRoles { roles: Vec<String>, all: bool },
    HasPermission(String),
    HasPermissions { permissions: Vec<String>, all: bool },
}

impl Requirement {
    pub fn role(role: impl Into<String>) -> Self {
        Self::HasRole(role.into())
    }

    pub fn any_role<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::HasRoles {
            roles: roles.into_iter().map(Into::into).collect(),
            all: false,
        }
    }

    pub fn all_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::HasRoles {
            roles: roles.into_iter().map(Into::into).collect(),
            all: true,
        }
    }

    pub fn permission(permission: impl Into<String>) -> Self {
        Self::HasPermission(permission.into())
    }

    pub fn any_permission<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::HasPermissions {
            permissions: permissions.into_iter().map(Into::into).collect(),
            all: false,
        }
    }

    pub fn all_permissions<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::HasPermissions {
            permissions: permissions.into_iter().map(Into::into).collect(),
            all: true,
        }
    }

    /// Returns `Forbidden` naming the unmet requirement, or `Ok(())`
    pub fn evaluate(&self, identity: &IdentityContext) -> Result<()> {
        let satisfied = match self {
            Self::HasRole(role) => identity.has_role(role),
            Self::HasRoles { roles, all } => {
                satisfies(roles, *all, |r| identity.has_role(r))
            }
            Self::HasPermission(permission) => identity.has_permission(permission),
            Self::HasPermissions { permissions, all } => {
                satisfies(permissions, *all, |p| identity.has_permission(p))
            }
        };

        if satisfied {
            Ok(())
        } else {
            Err(TokenGateError::forbidden(format!(
                "user does not have required {}",
                self
            )))
        }
    }
}

// Empty lists: "all of none" holds, "one of none" cannot.
fn satisfies<F>(required: &[String], all: bool, held: F) -> bool
where
    F: Fn(&str) -> bool,
{
    if all {
        required.iter().all(|r| held(r))
    } else {
        required.iter().any(|r| held(r))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HasRole(role) => write!(f, "role: {}", role),
            Self::HasRoles { roles, .. } => write!(f, "roles: {}", roles.join(",")),
            Self::HasPermission(permission) => write!(f, "permission: {}", permission),
            Self::HasPermissions { permissions, .. } => {
                write!(f, "permissions: {}", permissions.join(","))
            }
        }
    }
}

/// Gate an operation on an optional identity.
///
/// `None` means identity resolution never ran for this request, which is a
/// pipeline defect rather than an anonymous caller.
pub fn authorize(identity: Option<&IdentityContext>, requirements: &[Requirement]) -> Result<()> {
    let identity = identity.ok_or_else(TokenGateError::missing_context)?;
    let outcome = identity.authorize(requirements);
    if let Err(ref e) = outcome {
        log::warn!(
            "Authorization denied for user '{}' (context {}): {}",
            identity.user_id(),
            identity.correlation_id(),
            e.message()
        );
    }
    outcome
}

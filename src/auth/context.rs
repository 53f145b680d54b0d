//! Request scoped identity.

use serde::Serialize;

use crate::auth::authorize::Requirement;
use crate::auth::claims::AccessClaims;
use crate::error::Result;

/// Who is making the current request and what they may do.
///
/// Created once per request before identity resolution, filled in at most once
/// from verified token claims, then only read. The correlation id is fixed at
/// creation; roles and permissions are only ever replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityContext {
    #[serde(rename = "contextId")]
    correlation_id: String,
    user_id: String,
    roles: Vec<String>,
    permissions: Vec<String>,
}

impl IdentityContext {
    /// Anonymous context with a fresh correlation id
    pub fn new() -> Self {
        Self {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            user_id: String::new(),
            roles: Vec::new(),
            permissions: Vec::new(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_empty()
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Overwrites user id and roles from verified claims, keeping the correlation id
    pub fn resolve(self, claims: &AccessClaims) -> Self {
        self.with_user_id(claims.sub.as_str())
            .with_roles([claims.role.as_str()])
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| eq_ignore_case(r, role))
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| eq_ignore_case(p, permission))
    }

    /// Evaluates requirements in order, stopping at the first failure
    pub fn authorize(&self, requirements: &[Requirement]) -> Result<()> {
        requirements.iter().try_for_each(|r| r.evaluate(self))
    }
}

// Unicode-aware, so "ÉQUIPE" and "équipe" match
fn eq_ignore_case(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

impl Default for IdentityContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_new_context_is_anonymous() {
        let ctx = IdentityContext::new();
        assert!(ctx.is_anonymous());
        assert!(ctx.roles().is_empty());
        assert!(ctx.permissions().is_empty());
        assert!(!ctx.correlation_id().is_empty());
        assert_ne!(ctx.correlation_id(), IdentityContext::new().correlation_id());
    }

    #[test]
    fn test_resolve_keeps_correlation_id() {
        let ctx = IdentityContext::new().with_permissions(["tasks:read"]);
        let id = ctx.correlation_id().to_string();
        let claims =
            AccessClaims::new("user-7", "manager", Utc::now(), chrono::Duration::minutes(5)).unwrap();

        let ctx = ctx.resolve(&claims);
        assert_eq!(ctx.correlation_id(), id);
        assert_eq!(ctx.user_id(), "user-7");
        assert_eq!(ctx.roles(), ["manager".to_string()]);
        assert_eq!(ctx.permissions(), ["tasks:read".to_string()]);
    }

    #[test]
    fn test_roles_replaced_wholesale() {
        let ctx = IdentityContext::new()
            .with_roles(["a", "b"])
            .with_roles(["c"]);
        assert_eq!(ctx.roles(), ["c".to_string()]);
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let ctx = IdentityContext::new()
            .with_roles(["Admin"])
            .with_permissions(["Users:Write"]);
        assert!(ctx.has_role("admin"));
        assert!(ctx.has_permission("users:write"));
        assert!(!ctx.has_role("tech"));
    }

    #[test]
    fn test_non_ascii_case_folding() {
        let ctx = IdentityContext::new()
            .with_roles(["ÉQUIPE"])
            .with_permissions(["Größe:Lesen"]);
        assert!(ctx.has_role("équipe"));
        assert!(ctx.has_permission("GRÖßE:LESEN"));
        assert!(!ctx.has_role("equipe"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let ctx = IdentityContext::new().with_user_id("u1").with_roles(["tech"]);
        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["roles"][0], "tech");
        assert!(value["permissions"].as_array().unwrap().is_empty());
        assert_eq!(value["contextId"], ctx.correlation_id());
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Pseudo-group every requester belongs to
pub const EVERYONE: &str = "everyone";

/// Set of group names allowed to see an artifact in search and listings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadAcl(BTreeSet<String>);

impl ReadAcl {
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(groups.into_iter().map(Into::into).collect())
    }

    /// ACL readable by anyone
    pub fn everyone() -> Self {
        Self::new([EVERYONE])
    }

    pub fn contains(&self, group: &str) -> bool {
        self.0.contains(group)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// True when at least one of `groups` is a member of the ACL
    pub fn intersects(&self, groups: &BTreeSet<String>) -> bool {
        if self.0.len() <= groups.len() {
            self.0.iter().any(|g| groups.contains(g))
        } else {
            groups.iter().any(|g| self.0.contains(g))
        }
    }
}

impl<S: Into<String>> FromIterator<S> for ReadAcl {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Effective access rights of one request.
///
/// Built once by the access resolver; `groups` always contains [`EVERYONE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessContext {
    is_admin: bool,
    groups: BTreeSet<String>,
}

impl AccessContext {
    /// Unauthenticated requester
    pub fn anonymous() -> Self {
        Self {
            is_admin: false,
            groups: BTreeSet::from([EVERYONE.to_string()]),
        }
    }

    /// Holder of the admin credentials; ACL filtering does not apply
    pub fn admin() -> Self {
        Self {
            is_admin: true,
            ..Self::anonymous()
        }
    }

    /// Authenticated user with the groups the identity service reported
    pub fn user<I, S>(username: &str, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ctx = Self::anonymous();
        ctx.groups.insert(username.to_string());
        ctx.groups.extend(groups.into_iter().map(Into::into));
        ctx
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    pub fn can_read(&self, acl: &ReadAcl) -> bool {
        self.is_admin || acl.intersects(&self.groups)
    }
}

impl Default for AccessContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_sees_public_only() {
        let ctx = AccessContext::anonymous();
        assert!(ctx.can_read(&ReadAcl::everyone()));
        assert!(!ctx.can_read(&ReadAcl::new(["charmers"])));
        assert!(!ctx.can_read(&ReadAcl::default()));
    }

    #[test]
    fn test_user_groups() {
        let ctx = AccessContext::user("bob", ["test-user"]);
        assert!(ctx.groups().contains(EVERYONE));
        assert!(ctx.groups().contains("bob"));
        assert!(ctx.can_read(&ReadAcl::new(["charmers", "test-user"])));
        assert!(!ctx.can_read(&ReadAcl::new(["charmers"])));
    }

    #[test]
    fn test_admin_bypasses_acl() {
        let ctx = AccessContext::admin();
        assert!(ctx.can_read(&ReadAcl::default()));
        assert!(ctx.can_read(&ReadAcl::new(["charmers"])));
    }
}

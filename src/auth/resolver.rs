use crate::auth::cache::GroupCache;
use crate::auth::credentials::{BasicAuth, BasicCredential, Credentials};
use crate::config::AuthConfig;
use crate::models::AccessContext;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Capability token that did not verify
#[derive(Debug, Error)]
#[error("invalid capability: {0}")]
pub struct CapabilityError(pub String);

/// Verifies discharged capabilities issued by the identity service
#[async_trait]
pub trait CapabilityVerifier: Send + Sync + 'static {
    /// Username the capability asserts
    async fn verify(&self, token: &str) -> Result<String, CapabilityError>;
}

/// Request rejected during authentication
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("invalid user name or password")]
    InvalidBasicAuth,
}

/// Maps request credentials to an [`AccessContext`]
pub struct AccessResolver {
    admin_username: String,
    admin_password_digest: [u8; 32],
    verifier: Option<Arc<dyn CapabilityVerifier>>,
    groups: Option<GroupCache>,
}

impl AccessResolver {
    pub fn new(auth: &AuthConfig) -> Self {
        Self {
            admin_username: auth.admin_username.clone(),
            admin_password_digest: digest(&auth.admin_password),
            verifier: None,
            groups: None,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn CapabilityVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_groups(mut self, groups: GroupCache) -> Self {
        self.groups = Some(groups);
        self
    }

    /// Without a verifier every capability resolves as anonymous
    pub fn verifies_capabilities(&self) -> bool {
        self.verifier.is_some()
    }

    fn is_admin(&self, auth: &BasicAuth) -> bool {
        auth.username == self.admin_username
            && digest(&auth.password) == self.admin_password_digest
    }

    /// Resolve the requester's rights.
    ///
    /// Admin basic auth wins, then the first capability that verifies.
    /// Invalid credentials are ignored when another credential was
    /// presented; bad basic auth on its own is rejected.
    pub async fn resolve(&self, credentials: &Credentials) -> Result<AccessContext, AccessError> {
        if let Some(BasicCredential::Decoded(auth)) = &credentials.basic {
            if self.is_admin(auth) {
                debug!("admin credentials accepted");
                return Ok(AccessContext::admin());
            }
        }

        for token in &credentials.capabilities {
            if let Some(username) = self.verify(token).await {
                return Ok(self.user_context(&username).await);
            }
        }

        if credentials.basic.is_some() && credentials.capabilities.is_empty() {
            return Err(AccessError::InvalidBasicAuth);
        }

        if !credentials.is_empty() {
            debug!("no credential verified, continuing anonymously");
        }
        Ok(AccessContext::anonymous())
    }

    async fn verify(&self, token: &str) -> Option<String> {
        let verifier = self.verifier.as_ref()?;
        match verifier.verify(token).await {
            Ok(username) => Some(username),
            Err(err) => {
                debug!(error = %err, "capability rejected");
                None
            }
        }
    }

    async fn user_context(&self, username: &str) -> AccessContext {
        let Some(groups) = &self.groups else {
            return AccessContext::user(username, Vec::<String>::new());
        };

        match groups.groups(username).await {
            Ok(groups) => AccessContext::user(username, groups.iter().cloned()),
            Err(err) => {
                warn!(user = username, error = %err, "cannot resolve groups, using minimal access");
                AccessContext::user(username, Vec::<String>::new())
            }
        }
    }
}

fn digest(secret: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(secret.as_bytes()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::{IdentityClient, IdentityError};
    use crate::models::EVERYONE;
    use std::time::Duration;

    struct Tokens;

    #[async_trait]
    impl CapabilityVerifier for Tokens {
        async fn verify(&self, token: &str) -> Result<String, CapabilityError> {
            token
                .strip_prefix("valid-")
                .map(str::to_string)
                .ok_or_else(|| CapabilityError("bad signature".to_string()))
        }
    }

    struct Directory;

    #[async_trait]
    impl IdentityClient for Directory {
        async fn resolve_groups(&self, username: &str) -> Result<Vec<String>, IdentityError> {
            match username {
                "bob" => Ok(vec!["test-user".to_string()]),
                _ => Err(IdentityError::Status {
                    status: 500,
                    user: username.to_string(),
                }),
            }
        }
    }

    fn resolver() -> AccessResolver {
        let auth = AuthConfig {
            admin_username: "admin".to_string(),
            admin_password: "password".to_string(),
        };
        AccessResolver::new(&auth)
            .with_verifier(Arc::new(Tokens))
            .with_groups(GroupCache::new(
                Arc::new(Directory),
                100,
                Duration::from_secs(60),
            ))
    }

    #[tokio::test]
    async fn test_no_credentials_is_anonymous() {
        let ctx = resolver().resolve(&Credentials::none()).await.unwrap();
        assert_eq!(ctx, AccessContext::anonymous());
    }

    #[tokio::test]
    async fn test_admin() {
        let credentials = Credentials::none().with_basic(BasicAuth::new("admin", "password"));
        assert!(resolver().resolve(&credentials).await.unwrap().is_admin());
    }

    #[tokio::test]
    async fn test_bad_basic_auth_alone_is_rejected() {
        let credentials = Credentials::none().with_basic(BasicAuth::new("admin", "wrong"));
        assert!(matches!(
            resolver().resolve(&credentials).await,
            Err(AccessError::InvalidBasicAuth)
        ));
    }

    #[tokio::test]
    async fn test_capability_with_groups() {
        let credentials = Credentials::none().with_capability("valid-bob");
        let ctx = resolver().resolve(&credentials).await.unwrap();
        assert!(!ctx.is_admin());
        for group in [EVERYONE, "bob", "test-user"] {
            assert!(ctx.groups().contains(group), "missing {}", group);
        }
    }

    #[tokio::test]
    async fn test_group_lookup_failure_degrades() {
        let credentials = Credentials::none().with_capability("valid-alice");
        let ctx = resolver().resolve(&credentials).await.unwrap();
        assert_eq!(ctx, AccessContext::user("alice", Vec::<String>::new()));
    }

    #[tokio::test]
    async fn test_bad_basic_auth_with_valid_capability() {
        let credentials = Credentials::none()
            .with_basic(BasicAuth::new("admin", "wrong"))
            .with_capability("valid-bob");
        let ctx = resolver().resolve(&credentials).await.unwrap();
        assert!(ctx.groups().contains("test-user"));
    }

    #[tokio::test]
    async fn test_nothing_validates_falls_back_to_anonymous() {
        let credentials = Credentials::none()
            .with_basic(BasicAuth::new("admin", "wrong"))
            .with_capability("forged");
        let ctx = resolver().resolve(&credentials).await.unwrap();
        assert_eq!(ctx, AccessContext::anonymous());
    }

    #[tokio::test]
    async fn test_without_verifier_capabilities_are_anonymous() {
        let auth = AuthConfig {
            admin_username: "admin".to_string(),
            admin_password: "password".to_string(),
        };
        let standalone = AccessResolver::new(&auth).with_groups(GroupCache::new(
            Arc::new(Directory),
            100,
            Duration::from_secs(60),
        ));
        assert!(!standalone.verifies_capabilities());
        assert!(resolver().verifies_capabilities());

        let credentials = Credentials::none().with_capability("valid-bob");
        let ctx = standalone.resolve(&credentials).await.unwrap();
        assert_eq!(ctx, AccessContext::anonymous());

        let credentials = Credentials::none().with_basic(BasicAuth::new("admin", "password"));
        assert!(standalone.resolve(&credentials).await.unwrap().is_admin());
    }

    #[tokio::test]
    async fn test_invalid_capability_alone_is_anonymous() {
        let credentials = Credentials::none().with_capability("forged");
        let ctx = resolver().resolve(&credentials).await.unwrap();
        assert_eq!(ctx, AccessContext::anonymous());
    }
}

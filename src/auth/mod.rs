//! Request authentication and access-context resolution

mod cache;
mod credentials;
mod identity;
mod resolver;

pub use cache::GroupCache;
pub use credentials::{BasicAuth, BasicCredential, Credentials, CAPABILITY_COOKIE_PREFIX};
pub use identity::{HttpIdentityClient, IdentityClient, IdentityError};
pub use resolver::{AccessError, AccessResolver, CapabilityError, CapabilityVerifier};

use crate::error::AppError;

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        AppError::Unauthorized(err.to_string())
    }
}

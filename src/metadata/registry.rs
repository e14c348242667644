use crate::models::AccessContext;
use crate::search::{ParamError, SearchDocument, SearchError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure to compute one metadata section for one hit
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The underlying blob or record does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// The artifact store failed
    #[error("store error: {0}")]
    Store(String),

    /// A cross-referencing query against the index failed
    #[error(transparent)]
    Search(#[from] SearchError),

    /// No provider is registered under the name
    #[error("unrecognized metadata name {0:?}")]
    UnknownSection(String),

    /// The provider did not answer in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Computes one named metadata section for a search hit
#[async_trait]
pub trait MetadataProvider: Send + Sync + 'static {
    /// Section name as used in `include=`
    fn name(&self) -> &str;

    /// `Ok(None)` when the section does not apply to this artifact
    async fn resolve(
        &self,
        document: &SearchDocument,
        access: &AccessContext,
    ) -> Result<Option<Value>, MetadataError>;
}

/// Metadata providers keyed by section name
#[derive(Default, Clone)]
pub struct MetadataRegistry {
    providers: BTreeMap<String, Arc<dyn MetadataProvider>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any provider with the same name
    pub fn register(&mut self, provider: Arc<dyn MetadataProvider>) {
        debug!(section = provider.name(), "registered metadata provider");
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Builder form of [`MetadataRegistry::register`]
    pub fn with(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn MetadataProvider>> {
        self.providers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Reject requests naming a section no provider serves
    pub fn check_includes(&self, include: &[String]) -> Result<(), ParamError> {
        match include.iter().find(|name| !self.contains(name)) {
            Some(name) => Err(ParamError::InvalidValue {
                param: "include".to_string(),
                reason: MetadataError::UnknownSection(name.clone()).to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl MetadataProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn resolve(
            &self,
            _document: &SearchDocument,
            _access: &AccessContext,
        ) -> Result<Option<Value>, MetadataError> {
            Ok(Some(Value::Bool(true)))
        }
    }

    #[test]
    fn test_check_includes() {
        let registry = MetadataRegistry::new().with(Arc::new(Fixed));
        assert!(registry.contains("fixed"));
        assert!(registry.check_includes(&["fixed".to_string()]).is_ok());

        let err = registry
            .check_includes(&["fixed".to_string(), "bogus".to_string()])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"invalid include parameter: unrecognized metadata name "bogus""#
        );
    }
}

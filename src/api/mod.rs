pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::auth::AccessResolver;
use crate::metadata::ResultAssembler;
use crate::search::SearchService;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchService>,
    pub assembler: Arc<ResultAssembler>,
    pub access: Arc<AccessResolver>,
}

impl AppState {
    pub fn new(
        search: Arc<SearchService>,
        assembler: Arc<ResultAssembler>,
        access: Arc<AccessResolver>,
    ) -> Self {
        Self {
            search,
            assembler,
            access,
        }
    }
}

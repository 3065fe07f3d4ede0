pub mod health_handlers;
pub mod job_handlers;
pub mod resume_handlers;
pub mod upload_handlers;

use crate::services::Pagination;
use serde::Deserialize;

/// `?skip=&limit=` on list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl ListQuery {
    pub fn page(&self) -> Pagination {
        Pagination::new(self.skip, self.limit)
    }
}

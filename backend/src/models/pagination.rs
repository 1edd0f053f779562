use serde::Deserialize;

use crate::constants::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

/// 1-based page request as sent by clients (`?page=2&limit=20`).
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl From<PageQuery> for Page {
    fn from(query: PageQuery) -> Self {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
        Self {
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        PageQuery::default().into()
    }
}

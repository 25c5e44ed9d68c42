use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: i64 = 15;
pub const MAX_PER_PAGE: i64 = 100;

/// `?page=&per_page=` query parameters.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct PageParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageParams {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self { page, per_page }
    }

    /// Resolves to `(page, per_page)` with `page >= 1` and `per_page` in `1..=100`.
    pub fn resolve(&self, default_per_page: i64) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(default_per_page)
            .clamp(1, MAX_PER_PAGE);
        (page, per_page)
    }
}

/// One page of results with the paginator fields the frontend reads.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let last_page = ((total + per_page - 1) / per_page).max(1);
        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            let from = Self::offset(page, per_page).saturating_add(1);
            (Some(from), Some(from.saturating_add(data.len() as i64 - 1)))
        };
        Self {
            data,
            current_page: page,
            per_page,
            total,
            last_page,
            from,
            to,
        }
    }

    /// Row offset of `page`. Saturates for page numbers past the end of `i64`.
    pub fn offset(page: i64, per_page: i64) -> i64 {
        page.max(1).saturating_sub(1).saturating_mul(per_page)
    }
}

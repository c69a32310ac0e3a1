//! Page/items-per-page parameters and page count arithmetic.

use crate::error::AppError;

/// A validated page window: `page >= 1`, `1 <= items_per_page <= max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    items_per_page: u32,
}

impl Pagination {
    pub fn new(page: u32, items_per_page: u32, max_items_per_page: u32) -> Result<Self, AppError> {
        let mut problems = Vec::new();
        if page < 1 {
            problems.push("page: must be greater than 0".to_string());
        }
        if items_per_page < 1 {
            problems.push("items_per_page: must be greater than 0".to_string());
        } else if items_per_page > max_items_per_page {
            problems.push(format!(
                "items_per_page: must be less than or equal to {}",
                max_items_per_page
            ));
        }
        if !problems.is_empty() {
            return Err(AppError::Validation(problems));
        }
        Ok(Pagination {
            page,
            items_per_page,
        })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn items_per_page(&self) -> u32 {
        self.items_per_page
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.items_per_page)
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.items_per_page)
    }
}

/// `ceil(count / items_per_page)`, never less than 1 (an empty result still reports one page).
pub fn total_pages(count: i64, items_per_page: u32) -> u32 {
    let per_page = i64::from(items_per_page.max(1));
    let count = count.max(0);
    let pages = (count + per_page - 1) / per_page;
    u32::try_from(pages).unwrap_or(u32::MAX).max(1)
}

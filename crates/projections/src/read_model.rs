//! Read model trait and pagination shared by the query-side views.

use serde::{Deserialize, Serialize};

/// A read model providing query access to denormalized data.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of records the model currently holds.
    fn count(&self) -> usize;
}

/// Page request. Missing values default to page 1 with 10 entries; a page
/// below 1 is read as 1. The limit has no upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_LIMIT: u32 = 10;

    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page
            .map(|p| u32::try_from(p.max(1)).unwrap_or(u32::MAX))
            .unwrap_or(Self::DEFAULT_PAGE);
        let limit = limit
            .map(|l| u32::try_from(l.max(0)).unwrap_or(u32::MAX))
            .unwrap_or(Self::DEFAULT_LIMIT);
        Self { page, limit }
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.limit as usize)
    }

    /// Slices an already-ordered result set.
    pub fn apply<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len();
        let items = items
            .into_iter()
            .skip(self.offset())
            .take(self.limit as usize)
            .collect();
        Page {
            items,
            total,
            page: self.page,
            limit: self.limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: Self::DEFAULT_PAGE,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// One page of results plus the size of the whole set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        assert_eq!(PageRequest::new(None, None), PageRequest::default());
        let req = PageRequest::new(Some(0), Some(5));
        assert_eq!(req.page, 1);
        assert_eq!(req.offset(), 0);
        assert_eq!(PageRequest::new(Some(-3), None).page, 1);
    }

    #[test]
    fn offset_is_page_minus_one_times_limit() {
        assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn apply_slices_and_reports_total() {
        let page = PageRequest::new(Some(2), Some(2)).apply((1..=5).collect::<Vec<_>>());
        assert_eq!(page.items, vec![3, 4]);
        assert_eq!(page.total, 5);

        let past_end = PageRequest::new(Some(9), Some(2)).apply(vec![1, 2]);
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total, 2);
    }

    #[test]
    fn large_limit_is_not_capped() {
        let req = PageRequest::new(None, Some(10_000));
        assert_eq!(req.limit, 10_000);
    }
}

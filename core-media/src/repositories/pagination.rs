//! Offset pagination for catalog listings

use serde::{Deserialize, Serialize};

/// Zero-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// First page holding `page_size` items.
    pub fn first(page_size: u32) -> Self {
        Self::new(0, page_size)
    }

    pub fn next(&self) -> Self {
        Self::new(self.page + 1, self.page_size)
    }

    /// SQL `OFFSET`.
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.page_size)
    }

    /// SQL `LIMIT`.
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(50)
    }
}

/// One page of results plus totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let total_pages = if request.page_size == 0 {
            0
        } else {
            total.div_ceil(u64::from(request.page_size)) as u32
        };

        Self {
            items,
            total,
            page: request.page,
            total_pages,
            page_size: request.page_size,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            total_pages: self.total_pages,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_and_limit() {
        let request = PageRequest::new(2, 20);
        assert_eq!(request.offset(), 40);
        assert_eq!(request.limit(), 20);
        assert_eq!(request.next().offset(), 60);
        assert_eq!(PageRequest::default().page_size, 50);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page = Page::new(vec![1, 2, 3], 25, PageRequest::first(10));
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());

        let last = Page::new(vec![1], 25, PageRequest::new(2, 10));
        assert!(!last.has_next());
    }

    #[test]
    fn test_zero_page_size() {
        let page: Page<u8> = Page::new(Vec::new(), 25, PageRequest::first(0));
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next());
    }

    #[test]
    fn test_map_keeps_totals() {
        let page = Page::new(vec![1, 2], 12, PageRequest::first(2)).map(|x| x * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.total, 12);
        assert_eq!(page.total_pages, 6);
    }
}

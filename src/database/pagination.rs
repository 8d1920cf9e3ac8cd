use serde::{Deserialize, Serialize};

use crate::constants::{MAX_PAGE_SIZE, PAGE_SIZE};

/// `?page=&limit=` as sent by the client.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    /// Picks `page` and `limit` out of a raw query pair list. Unparseable
    /// values fall back to the defaults.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let find = |key: &str| {
            pairs
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.parse::<i64>().ok())
        };

        Self {
            page: find("page"),
            limit: find("limit"),
        }
    }

    pub fn page(&self) -> i64 {
        self.page.filter(|page| *page > 0).unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .filter(|limit| *limit > 0)
            .unwrap_or(PAGE_SIZE)
            .min(MAX_PAGE_SIZE)
    }

    /// Saturates for absurd page numbers, which then land past the last row.
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, query: PageQuery) -> Self {
        if rows.is_empty() && total_rows <= 0 {
            return Self::no_rows();
        }

        let page = query.page();
        let page_count = (total_rows + query.limit() - 1) / query.limit();

        Self {
            count: total_rows,
            next: (page < page_count).then_some(page + 1),
            previous: (page > 1).then_some((page - 1).min(page_count.max(1))),
            results: rows,
        }
    }

    pub fn no_rows() -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            results: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: i64, limit: i64) -> PageQuery {
        PageQuery {
            page: Some(page),
            limit: Some(limit),
        }
    }

    #[test]
    fn defaults_apply_to_missing_and_invalid_values() {
        let query = PageQuery::from_pairs(&[
            ("page".to_string(), "abc".to_string()),
            ("limit".to_string(), "-4".to_string()),
        ]);
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), PAGE_SIZE);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn limit_is_capped() {
        assert_eq!(query(1, 10_000).limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn offset_follows_page() {
        assert_eq!(query(3, 10).offset(), 20);
    }

    #[test]
    fn huge_page_does_not_overflow() {
        let query = PageQuery::from_pairs(&[("page".to_string(), i64::MAX.to_string())]);
        assert_eq!(query.offset(), i64::MAX);

        let page: PageContext<i32> = PageContext::from_rows(vec![], 0, query);
        assert_eq!(page, PageContext::no_rows());
    }

    #[test]
    fn middle_page_links_both_ways() {
        let page = PageContext::from_rows(vec![1, 2], 6, query(2, 2));
        assert_eq!(page.count, 6);
        assert_eq!(page.next, Some(3));
        assert_eq!(page.previous, Some(1));
    }

    #[test]
    fn last_page_has_no_next() {
        let page = PageContext::from_rows(vec![5], 5, query(3, 2));
        assert_eq!(page.next, None);
        assert_eq!(page.previous, Some(2));
    }

    #[test]
    fn empty_result_has_no_links() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 0, query(1, 2));
        assert_eq!(page, PageContext::no_rows());
    }
}

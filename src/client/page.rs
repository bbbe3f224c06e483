//! Page cursor types shared by every list endpoint

use url::Url;

/// GitHub caps `per_page` at 100 on every Actions list endpoint
pub const MAX_PER_PAGE: u32 = 100;

/// Cursor of a paginated list request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn first() -> Self {
        Self::first_with_size(MAX_PER_PAGE)
    }

    pub fn first_with_size(per_page: u32) -> Self {
        Self {
            page: 1,
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn at(self, page: u32) -> Self {
        Self { page, ..self }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

/// One page of records plus the cursor of the following page, if any
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page: Option<u32>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page: Option<u32>) -> Self {
        Self { items, next_page }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// Page number of the `rel="next"` entry of a `Link` header.
pub fn next_page_from_link(link: &str) -> Option<u32> {
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';').map(str::trim);
        let target = parts.next()?;
        let is_next = parts.any(|param| param == r#"rel="next""#);
        if !is_next {
            return None;
        }

        let url = Url::parse(target.strip_prefix('<')?.strip_suffix('>')?).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok())
    })
}

use cardpool_core::Pagination;
use serde::Serialize;

/// One page of a local list query.
///
/// Mirrors the paging envelope of the remote API: `number` and
/// `pageable.pageNumber` are 0-based while requests are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub pageable: Pageable,
    pub total_pages: u64,
    pub total_elements: u64,
    pub last: bool,
    pub first: bool,
    pub size: u32,
    pub number: u32,
    pub empty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pageable {
    pub page_number: u32,
    pub page_size: u32,
    pub offset: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, pagination: Pagination, total_elements: u64) -> Self {
        let size = pagination.size();
        let number = pagination.page() - 1;
        let empty = content.is_empty();

        Self {
            content,
            pageable: Pageable {
                page_number: number,
                page_size: size,
                offset: pagination.offset(),
            },
            total_pages: total_elements.div_ceil(u64::from(size)),
            total_elements,
            last: u64::from(pagination.page()) * u64::from(size) >= total_elements,
            first: number == 0,
            size,
            number,
            empty,
        }
    }
}

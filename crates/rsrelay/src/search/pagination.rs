//! Offset arithmetic for paged search.
//!
//! Pages are 1-based. `rows` must stay fixed across the pages of one search;
//! changing it mid-way shifts every offset.

/// Offset of the first document on `page`. Page 0 is treated as page 1.
pub fn start_for_page(page: u64, rows: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(rows)
}

/// Number of pages needed for `num_found` documents. Never less than 1.
pub fn total_pages(num_found: u64, rows: u64) -> u64 {
    if rows == 0 {
        return 1;
    }
    num_found.div_ceil(rows).max(1)
}

/// 1-based page that starts at (or contains) `start`.
pub fn page_for_start(start: u64, rows: u64) -> u64 {
    if rows == 0 {
        return 1;
    }
    start / rows + 1
}

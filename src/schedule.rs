//! Batch scheduling.
//!
//! Turns the catalog into a lazy stream of bounded batches:
//!
//! ```text
//! core          [/ /flights ... /about]              batch 1/1
//! cruises       [c1 .. c100] [c101 .. c130]          batch 1/2, 2/2
//! packages      (empty)                              no batches
//! ...
//! travel-from   [t1 .. t100] ... [t901 .. t936]      batch 1/10 .. 10/10
//! ```
//!
//! Groups come out in [`Group::PRIORITY`] order and pages keep catalog order,
//! so an interrupted build always has the highest-value pages done first and
//! two runs over the same catalog produce identical batches. Batches borrow
//! slices of the catalog; nothing is copied or materialized up front.

use crate::catalog::{Group, PageCatalog, PageRecord};

/// A bounded run of consecutive pages from one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a> {
    pub group: Group,
    /// Zero-based position within the group.
    pub index: usize,
    /// Number of batches in the group.
    pub count: usize,
    pub pages: &'a [PageRecord],
}

impl Batch<'_> {
    /// One-based position, for display.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Number of batches needed for `pages` pages. Zero pages means zero batches.
pub fn batch_count(pages: usize, chunk_size: usize) -> usize {
    pages.div_ceil(chunk_size.max(1))
}

/// Batches of a single group, in catalog order.
///
/// A `chunk_size` of zero is treated as one.
pub fn group_batches(
    catalog: &PageCatalog,
    group: Group,
    chunk_size: usize,
) -> impl Iterator<Item = Batch<'_>> {
    let chunk_size = chunk_size.max(1);
    let pages = catalog.pages(group);
    let count = batch_count(pages.len(), chunk_size);
    pages
        .chunks(chunk_size)
        .enumerate()
        .map(move |(index, pages)| Batch {
            group,
            index,
            count,
            pages,
        })
}

/// Every batch of the catalog, groups in priority order.
pub fn schedule(catalog: &PageCatalog, chunk_size: usize) -> impl Iterator<Item = Batch<'_>> {
    Group::PRIORITY
        .into_iter()
        .flat_map(move |group| group_batches(catalog, group, chunk_size))
}

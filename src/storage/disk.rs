pub mod pager;

pub use pager::Pager;

/// Size of one page of the backing file, matching the common host memory page.
pub const PAGE_SIZE: usize = 4096;

//! Per-architecture paging entry layouts.
//!
//! Both layouts compile everywhere so they stay testable from any host;
//! [`TableDesc`] and [`PageDesc`] alias the one in effect. ARM builds, or
//! any build with the `arm-short-descriptor` feature, use the
//! short-descriptor layout. Everything else uses the i686 layout.

pub mod armv7;
pub mod x86;

#[cfg(any(target_arch = "arm", feature = "arm-short-descriptor"))]
pub use armv7::{PageDesc, TableDesc};

#[cfg(not(any(target_arch = "arm", feature = "arm-short-descriptor")))]
pub use x86::{PageDesc, TableDesc};

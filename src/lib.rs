mod handle;
mod map;
mod utils;

pub use handle::{FREE_LIST_END, Handle};
pub use map::{HandleMap, Meta};

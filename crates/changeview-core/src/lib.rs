pub mod api;
pub mod cache;
pub mod change_tree;
pub mod config;
mod error;
pub mod merge_strategy;
pub mod models;
pub mod path_filter;
pub mod rev_walk;
pub mod store;
pub mod three_way;
pub mod tree_diff;

#[cfg(test)]
mod testing;

pub use error::{Error, ErrorKind, Result};

//! Controllers binding UI state to the fetch engine

mod tables;

pub use tables::{PageState, TableBindings, TableController};

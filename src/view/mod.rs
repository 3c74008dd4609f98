//! View derivation: client-side filters and pure selectors over mirrors.

pub mod filter;
pub mod select;

pub use filter::{ViewFilters, detail_spec};
pub use select::{board_column, epic_children, issues_for, sort_for_view};

pub mod error;
pub mod filter;
pub mod filter_order;
pub mod filter_where;

pub use error::FilterError;
pub use filter::FindFilter;

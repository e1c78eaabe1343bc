pub mod logs;
pub mod query;
pub mod transactions;

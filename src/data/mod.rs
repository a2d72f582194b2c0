//! Data structures shared by the bipartitioning methods.

pub mod fibo;

pub use fibo::FiboHeap;

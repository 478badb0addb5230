pub mod executor;
pub mod ordered;
pub mod unordered;

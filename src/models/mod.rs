pub mod availability;
pub mod item;
pub mod page;

// Re-exports for convenience
pub use availability::*;
pub use item::*;
pub use page::*;

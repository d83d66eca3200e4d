pub mod fetch;
pub mod lookup;
pub mod relay;

// Re-export command functions for convenience
pub use fetch::fetch;
pub use lookup::lookup;
pub use relay::relay;

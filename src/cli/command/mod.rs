pub mod fetch;
pub mod plan;

pub use fetch::fetch;
pub use plan::plan;

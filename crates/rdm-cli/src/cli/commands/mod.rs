mod batch;
mod get;

pub use batch::run_batch;
pub use get::run_get;

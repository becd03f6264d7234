pub mod store;
pub mod value;

pub use store::{LockOptions, ProgressStore};
pub use value::StepValue;

pub mod assessment;
pub mod clock;
pub mod config;
pub mod error;
pub mod insight;
pub mod memory;
pub mod model;
pub mod normalize;
pub mod notify;
pub mod scheduler;
pub mod source;
pub mod storage;
pub mod store;
pub mod task_api;

pub mod job;
pub mod pool;
pub mod summarise;

pub use job::{FileTask, Summary};
pub use pool::WorkerPool;
pub use summarise::summarise_task;

pub mod scanner;

pub use scanner::{list_siblings, FileDiscovery};

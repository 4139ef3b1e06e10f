pub mod file_store;
pub mod path_locks;
pub mod path_resolver;

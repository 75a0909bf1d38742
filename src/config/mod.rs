pub mod defs;
pub mod scheduler;
pub mod settings;

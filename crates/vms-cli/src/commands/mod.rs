pub mod check_config;
pub mod list;
pub mod sync;

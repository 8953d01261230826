pub mod capture_backend;
pub mod capture_delegate;
pub mod capture_provider;
pub mod kill_flag_store;

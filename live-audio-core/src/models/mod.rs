pub mod config;
pub mod error;
pub mod events;
pub mod kill_record;
pub mod state;

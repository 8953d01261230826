pub mod kill_flag;

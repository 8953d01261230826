mod delegate;
pub mod live_session;

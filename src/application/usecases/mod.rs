pub mod authenticate_admin;
pub mod cancel_broadcast;
pub mod get_broadcast;
pub mod get_channel_stats;
pub mod register_channel;
pub mod start_broadcast;

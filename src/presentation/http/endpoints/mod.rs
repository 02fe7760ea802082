pub mod auth;
pub mod broadcasts;
pub mod channels;
pub mod health;
pub mod root;

pub mod jwt;
pub mod messenger;

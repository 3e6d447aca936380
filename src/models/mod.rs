//! Data models

pub mod book;
pub mod borrowing;
pub mod payment;
pub mod user;

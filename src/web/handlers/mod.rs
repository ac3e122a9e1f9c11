//! # Web API Request Handlers

pub mod health;
pub mod library;
pub mod work;

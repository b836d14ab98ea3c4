//! HTTP request handlers

pub mod account;
pub mod dashboard;
pub mod health;
pub mod navigation;
pub mod startup;

pub use account::*;
pub use dashboard::*;
pub use health::*;
pub use navigation::*;
pub use startup::*;

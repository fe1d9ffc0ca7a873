// src/models/mod.rs
pub mod driver;
pub mod notification;
pub mod ride;
pub mod user;

pub use driver::*;
pub use notification::*;
pub use ride::*;
pub use user::*;

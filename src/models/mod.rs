pub mod comment;
pub mod follow;
pub mod poll;
pub mod user;
pub mod vote;

pub use comment::*;
pub use follow::*;
pub use poll::*;
pub use user::*;
pub use vote::*;

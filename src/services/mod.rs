pub mod comment_service;
pub mod follow_service;
pub mod poll_service;
pub mod user_service;
pub mod vote_service;

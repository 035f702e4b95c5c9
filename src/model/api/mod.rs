pub mod audit;
pub mod auth;
pub mod candidate;
pub mod election;
pub mod id;
pub mod results;
pub mod user;
pub mod vote;

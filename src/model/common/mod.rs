pub mod election;
pub mod role;

pub mod alter;
pub mod audit;
pub mod search;
pub mod user;

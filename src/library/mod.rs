pub mod cache;
pub mod model;
pub mod scanner;
pub mod tags;

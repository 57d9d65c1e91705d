pub mod controller;
pub mod timer;
pub mod traits;

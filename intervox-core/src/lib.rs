pub mod answer;
pub mod assessment;
pub mod setup;
pub mod store;
pub mod types;

pub use answer::*;
pub use assessment::*;
pub use setup::*;
pub use store::*;
pub use types::*;

pub mod features;
pub mod interpret;
pub mod model;
pub mod scorer;

pub use features::*;
pub use interpret::*;
pub use model::*;
pub use scorer::*;

pub mod instructions;
pub mod routing;
pub mod session;

pub use instructions::*;
pub use routing::*;
pub use session::*;

pub mod artifact;
pub mod detection;
pub mod request;
pub mod response;

pub use artifact::*;
pub use detection::*;
pub use request::*;
pub use response::*;

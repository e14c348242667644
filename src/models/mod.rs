pub mod acl;
pub mod artifact;

pub use acl::*;
pub use artifact::*;

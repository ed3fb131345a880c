pub mod signup;

pub use signup::{SignupRequest, SignupResult, SignupService};

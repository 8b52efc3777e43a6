//! Identity: display names, roles, and the live Session binding.

pub mod credentials;
pub mod registry;
pub mod role;
pub mod sanitize;

pub use credentials::SecretAuthenticator;
pub use registry::{BindOutcome, IdentityKey, IdentityRegistry, Member};
pub use role::{Role, can_moderate};

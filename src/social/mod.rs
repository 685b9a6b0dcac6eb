// Social domain: accounts, posts, likes and follows.
//
// `service` holds the operations; the other modules are the rules they
// apply (input validation, pagination, password hashing) and the error type
// they return.

pub mod error;
pub mod pagination;
pub mod password;
pub mod service;
pub mod validation;

pub use error::SocialError;
pub use pagination::Page;
pub use service::{PostDraft, ProfileChanges, Registration, Social};

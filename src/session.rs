//! Session data model: validated identifiers, redacted secrets, and the session record.

pub mod id;
pub mod record;
pub mod secret;

pub use id::*;
pub use record::*;
pub use secret::*;

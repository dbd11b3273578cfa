//! Handle reservation for marketplace profiles
//!
//! Decides whether a username or display name can be assigned to an account,
//! given the profile records currently holding handles. Premium holders keep
//! their handle; a non-premium holder's handle stays contestable.
//!
//! Verdicts are advisory. Uniqueness at write time belongs to the store.

pub mod errors;
pub mod format;
pub mod query;
pub mod resolution;
pub mod store;
pub mod types;

pub use errors::*;
pub use format::{FormatValidation, HandleFormatValidator, UsernameFormatValidator};
pub use query::{AvailabilityQuery, AvailabilityResponse};
pub use resolution::{resolve_availability, HandleReservationResolver};
pub use store::{MemoryProfileStore, ProfileStore};
pub use types::*;

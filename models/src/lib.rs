// models/src/lib.rs
//! Records shared by every crate in the workspace: patients, appointments,
//! doctors and user profiles, how they map to stored documents, and the
//! common error type.

pub mod document;
pub mod errors;
pub mod identifiers;
pub mod medical;

pub use document::{Document, Fields, FromDocument, ToDocument};
pub use errors::{HospitalError, HospitalResult, ValidationError, ValidationResult};
pub use identifiers::{generate_document_id, Collection};

// lib/src/repository/mod.rs
//
// Typed access to the collections. Repositories own the query shapes and
// the fallbacks used when the store refuses a query for lack of an index.

pub mod appointments;
pub mod doctors;
pub mod patients;
pub mod users;

use models::{Document, FromDocument};

pub use appointments::{AppointmentRepository, AppointmentStats};
pub use doctors::DoctorRepository;
pub use patients::PatientRepository;
pub use users::UserRepository;

pub(crate) fn decode_all<T: FromDocument>(docs: &[Document]) -> Vec<T> {
    docs.iter().map(T::from_document).collect()
}

// models/src/medical/mod.rs
pub mod appointment;
pub mod doctor;
pub mod patient;
pub mod prescription;
pub mod role;
pub mod user;

pub use appointment::{
    day_bounds, normalize_time_of_day, parse_time_of_day, Appointment, AppointmentStatus, AppointmentUpdate, NewAppointment,
};
pub use doctor::Doctor;
pub use patient::{Gender, NewPatient, Patient, PatientUpdate};
pub use prescription::{Medicine, PrescriptionPatient, PrescriptionRequest};
pub use role::Role;
pub use user::UserProfile;

// lib/src/prescription/mod.rs
//
// Prescription export: validate the form, lay it out, render it to PDF in
// memory, then move it into the export directory in one rename.

pub mod layout;
pub mod render;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use models::medical::{Doctor, Medicine, PrescriptionPatient, PrescriptionRequest};
use models::{HospitalError, HospitalResult, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::NamedTempFile;
use tracing::info;

use crate::config::ExportSettings;
use layout::{layout_prescription, PrescriptionSheet};

// Whitespace, path separators, quotes and control characters never reach the
// file name or the Content-Disposition header built from it.
static UNSAFE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\s/\\"\p{Cc}]+"#).expect("valid file name pattern"));

/// `prescription_<name>_<dd-MM-yyyy>.pdf`, with each run of whitespace or
/// unsafe characters in the name replaced by one underscore.
pub fn prescription_file_name(patient_name: &str, issued: NaiveDate) -> String {
    format!(
        "prescription_{}_{}.pdf",
        UNSAFE_NAME_RE.replace_all(patient_name.trim(), "_"),
        issued.format("%d-%m-%Y")
    )
}

#[derive(Debug, Clone)]
pub struct RenderedPrescription {
    pub file_name: String,
    pub pages: usize,
    pub bytes: Vec<u8>,
}

struct Checked<'a> {
    doctor: &'a Doctor,
    patient: &'a PrescriptionPatient,
    medicines: Vec<Medicine>,
}

/// Rows with a blank medicine name are dropped; at least one must remain.
fn check(request: &PrescriptionRequest) -> HospitalResult<Checked<'_>> {
    let patient = request
        .patient
        .as_ref()
        .ok_or(ValidationError::MissingSelection("patient"))?;
    let doctor = request
        .doctor
        .as_ref()
        .ok_or(ValidationError::MissingSelection("doctor"))?;
    let medicines: Vec<Medicine> = request.medicines.iter().filter(|m| !m.is_blank()).cloned().collect();
    if medicines.is_empty() {
        return Err(ValidationError::NoMedicines.into());
    }
    Ok(Checked { doctor, patient, medicines })
}

#[derive(Debug, Clone)]
pub struct PrescriptionExporter {
    settings: ExportSettings,
}

impl PrescriptionExporter {
    pub fn new(settings: ExportSettings) -> Self {
        PrescriptionExporter { settings }
    }

    pub fn directory(&self) -> &Path {
        &self.settings.directory
    }

    pub fn render(&self, request: &PrescriptionRequest, issued: NaiveDate) -> HospitalResult<RenderedPrescription> {
        let checked = check(request)?;
        let sheet = PrescriptionSheet {
            settings: &self.settings,
            doctor: checked.doctor,
            patient: checked.patient,
            diagnosis: &request.diagnosis,
            medicines: &checked.medicines,
            instructions: &request.instructions,
            next_visit: request.next_visit,
            notes: request.notes.as_deref(),
            issued,
        };
        let layout = layout_prescription(&sheet);
        let file_name = prescription_file_name(&checked.patient.name, issued);
        let bytes = render::render_pdf(&file_name, &layout)?;
        Ok(RenderedPrescription { file_name, pages: layout.pages.len(), bytes })
    }

    /// Renders and saves the prescription, returning the final path.
    pub fn export(&self, request: &PrescriptionRequest, issued: NaiveDate) -> HospitalResult<PathBuf> {
        let rendered = self.render(request, issued)?;
        self.save(&rendered)
    }

    /// Writes an already rendered prescription into the export directory.
    /// The file only appears once it is complete.
    pub fn save(&self, rendered: &RenderedPrescription) -> HospitalResult<PathBuf> {
        let dir = &self.settings.directory;
        fs::create_dir_all(dir)?;
        let target = dir.join(&rendered.file_name);

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&rendered.bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target)
            .map_err(|e| HospitalError::ExportError(format!("Failed to save {}: {}", target.display(), e.error)))?;
        info!("Saved prescription {} ({} pages)", target.display(), rendered.pages);
        Ok(target)
    }
}

// lib/src/prescription/layout.rs
//
// Places the prescription on A4 pages. Coordinates are millimetres from the
// top-left corner; text `y` is the baseline. Nothing here touches PDF
// objects, so page breaking can be checked without rendering.

use chrono::NaiveDate;
use models::medical::{Doctor, Medicine, PrescriptionPatient};

use crate::config::ExportSettings;

pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;

const CONTENT_TOP: f32 = 20.0;
const FOOTER_HEIGHT: f32 = 20.0;
const CONTENT_BOTTOM: f32 = PAGE_HEIGHT - FOOTER_HEIGHT - 5.0;
const SIGNATURE_Y: f32 = PAGE_HEIGHT - 50.0;
const LINE_HEIGHT: f32 = 5.0;
const WRAP_WIDTH: f32 = PAGE_WIDTH - 40.0;
const MEDICATIONS_Y: f32 = 165.0;
const TABLE_X: f32 = 15.0;
const TABLE_WIDTH: f32 = PAGE_WIDTH - 30.0;
const TABLE_HEAD_HEIGHT: f32 = 8.0;
const TABLE_ROW_HEIGHT: f32 = 7.0;

const PT_TO_MM: f32 = 25.4 / 72.0;
/// Mean Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const DARK: Rgb = Rgb(44, 62, 80);
pub const LIGHT: Rgb = Rgb(244, 247, 250);
pub const WHITE: Rgb = Rgb(255, 255, 255);
pub const BLACK: Rgb = Rgb(0, 0, 0);
pub const GREY: Rgb = Rgb(100, 100, 100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Rect { x: f32, y: f32, w: f32, h: f32, fill: Option<Rgb>, stroke: Option<Rgb> },
    Text { x: f32, y: f32, size: f32, color: Rgb, align: Align, bold: bool, text: String },
    Line { x1: f32, y1: f32, x2: f32, y2: f32, color: Rgb },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

impl Page {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub pages: Vec<Page>,
}

/// Everything printed on the prescription.
pub struct PrescriptionSheet<'a> {
    pub settings: &'a ExportSettings,
    pub doctor: &'a Doctor,
    pub patient: &'a PrescriptionPatient,
    pub diagnosis: &'a str,
    pub medicines: &'a [Medicine],
    pub instructions: &'a str,
    pub next_visit: Option<NaiveDate>,
    pub notes: Option<&'a str>,
    pub issued: NaiveDate,
}

pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_WIDTH * PT_TO_MM
}

/// Greedy word wrap. Words wider than a line are split.
pub fn wrap_text(text: &str, max_width: f32, size: f32) -> Vec<String> {
    let max_chars = ((max_width / (size * AVG_GLYPH_WIDTH * PT_TO_MM)).floor() as usize).max(1);
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                lines.push(word.drain(..max_chars).collect());
            }
            let word: String = word.into_iter().collect();
            if word.is_empty() {
                continue;
            }
            let needed = if line.is_empty() { word.chars().count() } else { line.chars().count() + 1 + word.chars().count() };
            if needed > max_chars {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

struct Cursor {
    done: Vec<Page>,
    current: Page,
    y: f32,
}

impl Cursor {
    fn push(&mut self, op: DrawOp) {
        self.current.ops.push(op);
    }

    fn text(&mut self, x: f32, y: f32, size: f32, color: Rgb, text: impl Into<String>) {
        self.push(DrawOp::Text { x, y, size, color, align: Align::Left, bold: false, text: text.into() });
    }

    fn styled(&mut self, x: f32, y: f32, size: f32, color: Rgb, align: Align, bold: bool, text: impl Into<String>) {
        self.push(DrawOp::Text { x, y, size, color, align, bold, text: text.into() });
    }

    fn new_page(&mut self) {
        self.done.push(std::mem::take(&mut self.current));
        self.y = CONTENT_TOP;
    }

    /// Starts a new page unless `height` more millimetres fit on this one.
    fn ensure(&mut self, height: f32) -> bool {
        if self.y + height > CONTENT_BOTTOM {
            self.new_page();
            true
        } else {
            false
        }
    }

    /// A shaded box with a bold label and wrapped body lines. The box is
    /// split across pages when the body does not fit.
    fn boxed(&mut self, label: &str, lines: &[String], min_height: f32) {
        self.ensure(min_height.max(18.0 + LINE_HEIGHT));
        let mut top = self.y;
        let mut rect_at = self.current.ops.len();
        let mut first_segment = true;
        self.styled(15.0, top + 10.0, 11.0, DARK, Align::Left, true, label);
        let mut line_y = top + 18.0;
        for line in lines {
            if line_y > CONTENT_BOTTOM - 2.0 {
                let segment = shade(top, line_y - top - 2.0);
                self.current.ops.insert(rect_at, segment);
                self.new_page();
                top = self.y;
                rect_at = self.current.ops.len();
                line_y = top + 8.0;
                first_segment = false;
            }
            self.text(20.0, line_y, 11.0, BLACK, line.clone());
            line_y += LINE_HEIGHT;
        }
        let mut height = line_y - top;
        if first_segment {
            height = height.max(min_height);
        }
        self.current.ops.insert(rect_at, shade(top, height));
        self.y = top + height;
    }

    fn table_head(&mut self) {
        let y = self.y;
        self.push(DrawOp::Rect { x: TABLE_X, y, w: TABLE_WIDTH, h: TABLE_HEAD_HEIGHT, fill: Some(DARK), stroke: None });
        self.styled(TABLE_X + 3.0, y + 5.5, 11.0, WHITE, Align::Left, true, "Medication - Dosage - Duration");
        self.y += TABLE_HEAD_HEIGHT;
    }

    fn finish(mut self) -> Vec<Page> {
        self.done.push(self.current);
        self.done
    }
}

fn shade(y: f32, h: f32) -> DrawOp {
    DrawOp::Rect { x: 10.0, y, w: PAGE_WIDTH - 20.0, h, fill: Some(LIGHT), stroke: None }
}

pub fn layout_prescription(sheet: &PrescriptionSheet<'_>) -> Layout {
    let mut c = Cursor { done: Vec::new(), current: Page::default(), y: 0.0 };
    let settings = sheet.settings;
    let mid = PAGE_WIDTH / 2.0;

    // Header band
    c.push(DrawOp::Rect { x: 0.0, y: 0.0, w: PAGE_WIDTH, h: 40.0, fill: Some(DARK), stroke: None });
    c.styled(mid, 20.0, 24.0, WHITE, Align::Center, true, settings.clinic_name.as_str());
    c.styled(mid, 30.0, 12.0, WHITE, Align::Center, false, settings.clinic_tagline.as_str());

    // Doctor
    c.push(DrawOp::Rect { x: 10.0, y: 45.0, w: PAGE_WIDTH - 20.0, h: 25.0, fill: Some(LIGHT), stroke: Some(DARK) });
    c.styled(15.0, 55.0, 12.0, DARK, Align::Left, true, sheet.doctor.name.as_str());
    c.text(15.0, 62.0, 10.0, DARK, sheet.doctor.specialization.as_str());
    c.text(PAGE_WIDTH - 60.0, 55.0, 10.0, DARK, format!("Phone: {}", sheet.doctor.phone));
    c.text(PAGE_WIDTH - 60.0, 62.0, 10.0, DARK, format!("Email: {}", sheet.doctor.email));

    c.styled(mid, 85.0, 14.0, DARK, Align::Center, true, "PRESCRIPTION");
    c.styled(PAGE_WIDTH - 25.0, 85.0, 10.0, GREY, Align::Right, false, format!("Date: {}", sheet.issued.format("%d/%m/%Y")));

    // Patient
    c.push(DrawOp::Rect { x: 10.0, y: 95.0, w: PAGE_WIDTH - 20.0, h: 30.0, fill: Some(LIGHT), stroke: None });
    c.styled(15.0, 105.0, 11.0, DARK, Align::Left, true, "Patient Information:");
    c.text(20.0, 113.0, 11.0, BLACK, format!("Name: {}", sheet.patient.name));
    let age = sheet.patient.age.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string());
    let gender = sheet.patient.gender.as_deref().unwrap_or("-");
    c.text(20.0, 120.0, 11.0, BLACK, format!("Age: {} years    Gender: {}", age, gender));

    // Diagnosis
    c.styled(15.0, 140.0, 11.0, DARK, Align::Left, true, "Diagnosis:");
    c.y = 148.0;
    for line in wrap_text(sheet.diagnosis, WRAP_WIDTH, 11.0) {
        c.ensure(LINE_HEIGHT);
        c.text(20.0, c.y, 11.0, BLACK, line);
        c.y += LINE_HEIGHT;
    }

    // Medication table
    c.y = (c.y + 7.0).max(MEDICATIONS_Y);
    c.ensure(5.0 + TABLE_HEAD_HEIGHT + TABLE_ROW_HEIGHT);
    c.styled(15.0, c.y, 11.0, DARK, Align::Left, true, "Medications:");
    c.y += 5.0;
    c.table_head();
    for (i, medicine) in sheet.medicines.iter().enumerate() {
        let row = format!("{} - {} - {}", medicine.name, medicine.dosage, medicine.duration);
        let lines = wrap_text(&row, TABLE_WIDTH - 6.0, 10.0);
        let height = (lines.len() as f32 * LINE_HEIGHT + 2.0).max(TABLE_ROW_HEIGHT);
        if c.ensure(height) {
            c.table_head();
        }
        if i % 2 == 1 {
            c.push(DrawOp::Rect { x: TABLE_X, y: c.y, w: TABLE_WIDTH, h: height, fill: Some(LIGHT), stroke: None });
        }
        let mut baseline = c.y + 5.0;
        for line in lines {
            c.text(TABLE_X + 3.0, baseline, 10.0, BLACK, line);
            baseline += LINE_HEIGHT;
        }
        c.y += height;
    }

    // Instructions, next visit, notes
    c.y += 10.0;
    c.boxed("Instructions:", &wrap_text(sheet.instructions, WRAP_WIDTH, 11.0), 35.0);
    if let Some(next) = sheet.next_visit {
        c.ensure(10.0);
        let baseline = c.y + 6.0;
        c.styled(15.0, baseline, 11.0, DARK, Align::Left, true, "Next Visit:");
        c.text(50.0, baseline, 11.0, BLACK, next.format("%d/%m/%Y").to_string());
        c.y = baseline + 4.0;
    }
    if let Some(notes) = sheet.notes.filter(|n| !n.trim().is_empty()) {
        c.y += 4.0;
        c.boxed("Doctor's Notes:", &wrap_text(notes, WRAP_WIDTH, 11.0), 30.0);
    }

    // Signature goes on the last page, below everything else.
    if c.y > SIGNATURE_Y - 5.0 {
        c.new_page();
    }
    c.push(DrawOp::Line { x1: PAGE_WIDTH - 80.0, y1: SIGNATURE_Y, x2: PAGE_WIDTH - 20.0, y2: SIGNATURE_Y, color: DARK });
    c.styled(PAGE_WIDTH - 50.0, SIGNATURE_Y + 5.0, 11.0, DARK, Align::Center, true, sheet.doctor.name.as_str());
    c.styled(PAGE_WIDTH - 50.0, SIGNATURE_Y + 12.0, 10.0, DARK, Align::Center, false, sheet.doctor.specialization.as_str());

    let mut pages = c.finish();
    for page in &mut pages {
        page.ops.push(DrawOp::Rect {
            x: 0.0,
            y: PAGE_HEIGHT - FOOTER_HEIGHT,
            w: PAGE_WIDTH,
            h: FOOTER_HEIGHT,
            fill: Some(DARK),
            stroke: None,
        });
        page.ops.push(DrawOp::Text {
            x: mid,
            y: PAGE_HEIGHT - 12.0,
            size: 8.0,
            color: WHITE,
            align: Align::Center,
            bold: false,
            text: settings.system_name.clone(),
        });
        page.ops.push(DrawOp::Text {
            x: mid,
            y: PAGE_HEIGHT - 6.0,
            size: 8.0,
            color: WHITE,
            align: Align::Center,
            bold: false,
            text: format!("24/7 Emergency Contact: {}", settings.emergency_contact),
        });
    }
    Layout { pages }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doctor() -> Doctor {
        Doctor {
            id: "doc1".into(),
            user_id: "u1".into(),
            name: "Dr. Smith".into(),
            specialization: "General Medicine".into(),
            email: "smith@clinic.org".into(),
            phone: "5550001234".into(),
        }
    }

    fn patient() -> PrescriptionPatient {
        PrescriptionPatient { id: "p1".into(), name: "Jane Doe".into(), age: Some(34), gender: Some("Female".into()) }
    }

    fn lay(medicines: &[Medicine], instructions: &str, notes: Option<&str>) -> Layout {
        let settings = ExportSettings::default();
        let (doctor, patient) = (doctor(), patient());
        layout_prescription(&PrescriptionSheet {
            settings: &settings,
            doctor: &doctor,
            patient: &patient,
            diagnosis: "Fever",
            medicines,
            instructions,
            next_visit: NaiveDate::from_ymd_opt(2024, 6, 10),
            notes,
            issued: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        })
    }

    fn signature_pages(layout: &Layout) -> Vec<usize> {
        layout
            .pages
            .iter()
            .enumerate()
            .filter(|(_, p)| p.ops.iter().any(|op| matches!(op, DrawOp::Line { .. })))
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn short_prescription_fits_one_page() {
        let layout = lay(&[Medicine::new("Paracetamol", "1-0-1", "5 days")], "After meals", None);
        assert_eq!(layout.pages.len(), 1);
        let texts: Vec<_> = layout.pages[0].texts().collect();
        assert!(texts.contains(&"Paracetamol - 1-0-1 - 5 days"));
        assert!(texts.contains(&"Date: 03/06/2024"));
        assert!(texts.contains(&"Age: 34 years    Gender: Female"));
        assert!(texts.contains(&"10/06/2024"));
        assert!(texts.contains(&"Hospital Clinic Management System"));
        assert_eq!(signature_pages(&layout), vec![0]);
    }

    #[test]
    fn long_content_flows_onto_more_pages() {
        let medicines: Vec<_> = (0..40).map(|i| Medicine::new(format!("Medicine {}", i), "1-0-1", "7 days")).collect();
        let instructions = "Take with plenty of water and rest. ".repeat(40);
        let layout = lay(&medicines, &instructions, Some("Review blood pressure at every visit."));
        assert!(layout.pages.len() >= 2);

        for page in &layout.pages {
            assert!(page.texts().any(|t| t.starts_with("24/7 Emergency Contact")));
            for op in &page.ops {
                if let DrawOp::Text { y, text, .. } = op {
                    if !text.starts_with("24/7") && text != "Hospital Clinic Management System" {
                        assert!(*y < PAGE_HEIGHT - FOOTER_HEIGHT, "{} overlaps the footer", text);
                    }
                }
            }
        }
        assert_eq!(signature_pages(&layout), vec![layout.pages.len() - 1]);
        let heads = layout.pages.iter().flat_map(|p| p.texts()).filter(|t| *t == "Medication - Dosage - Duration").count();
        assert!(heads >= 2);
    }

    #[test]
    fn wrapping_respects_width_and_splits_long_words() {
        let lines = wrap_text("alpha beta gamma delta", 20.0, 11.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, 11.0) <= 20.0 + f32::EPSILON);
        }
        let lines = wrap_text(&"x".repeat(100), 20.0, 11.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat().len(), 100);
        assert!(wrap_text("   ", 50.0, 11.0).is_empty());
    }
}

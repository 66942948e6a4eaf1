//! Prescription PDFs, rendered with `printpdf` on A4 and written under
//! `{UPLOADS_DIR}/prescriptions/`.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use printpdf::*;
use uuid::Uuid;

use crate::models::{DoctorSnapshot, Medication, PatientSnapshot};

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const TOP: Mm = Mm(280.0);
const BOTTOM: Mm = Mm(20.0);
const LEFT: Mm = Mm(20.0);
const INDENT: Mm = Mm(25.0);

/// Everything printed on a prescription.
pub struct PrescriptionDocument<'a> {
    pub prescription_id: Uuid,
    pub doctor: &'a DoctorSnapshot,
    pub patient: &'a PatientSnapshot,
    pub medications: &'a [Medication],
    pub advice: Option<&'a str>,
    pub issued_at: DateTime<Utc>,
}

/// Writes lines top to bottom, starting a new page when the current one is
/// full.
struct Cursor<'d> {
    doc: &'d PdfDocumentReference,
    layer: PdfLayerReference,
    y: Mm,
}

impl Cursor<'_> {
    fn line(&mut self, text: &str, size: f32, x: Mm, font: &IndirectFontRef, advance: Mm) {
        if self.y < BOTTOM {
            let (page, layer) = self.doc.add_page(PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP;
        }
        self.layer.use_text(text, size, x, self.y, font);
        self.y -= advance;
    }

    fn gap(&mut self, by: Mm) {
        self.y -= by;
    }
}

pub fn render_prescription(document: &PrescriptionDocument<'_>) -> Result<Vec<u8>> {
    let title = format!("Prescription {}", document.prescription_id);
    let (doc, page1, layer1) = PdfDocument::new(&title, PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| anyhow!("PDF font error: {e}"))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| anyhow!("PDF font error: {e}"))?;

    let mut cursor = Cursor {
        layer: doc.get_page(page1).get_layer(layer1),
        doc: &doc,
        y: TOP,
    };

    // Header
    let doctor_name = document.doctor.name.as_deref().unwrap_or("Doctor");
    cursor.line(doctor_name, 18.0, LEFT, &bold, Mm(7.0));
    if let Some(specialty) = document.doctor.specialty.as_deref() {
        cursor.line(specialty, 12.0, LEFT, &font, Mm(6.0));
    }
    cursor.gap(Mm(6.0));

    // Patient
    let patient = document.patient;
    cursor.line(
        &format!("Patient: {}", patient.name.as_deref().unwrap_or("N/A")),
        14.0,
        LEFT,
        &bold,
        Mm(6.0),
    );
    let dob = patient.dob.map(|d| d.to_string()).unwrap_or_else(|| "N/A".to_string());
    cursor.line(
        &format!("DOB: {dob}   Gender: {}", patient.gender.as_deref().unwrap_or("N/A")),
        12.0,
        LEFT,
        &font,
        Mm(6.0),
    );
    cursor.gap(Mm(6.0));

    cursor.line("Medications:", 14.0, LEFT, &bold, Mm(7.0));
    for (i, med) in document.medications.iter().enumerate() {
        let text = medication_line(i + 1, med);
        for line in wrap_text(&text, 85) {
            cursor.line(&line, 12.0, LEFT, &font, Mm(5.5));
        }
        if let Some(notes) = med.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            for line in wrap_text(&format!("Notes: {notes}"), 85) {
                cursor.line(&line, 11.0, INDENT, &font, Mm(5.0));
            }
        }
    }
    cursor.gap(Mm(6.0));

    if let Some(advice) = document.advice.filter(|a| !a.trim().is_empty()) {
        cursor.line("Advice / Instructions:", 14.0, LEFT, &bold, Mm(7.0));
        for line in wrap_text(advice, 90) {
            cursor.line(&line, 12.0, LEFT, &font, Mm(5.5));
        }
        cursor.gap(Mm(6.0));
    }

    cursor.line(
        &format!("Issued: {}", document.issued_at.format("%Y-%m-%d %H:%M UTC")),
        10.0,
        LEFT,
        &font,
        Mm(5.0),
    );

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf).map_err(|e| anyhow!("PDF save error: {e}"))?;
    buf.into_inner().map_err(|e| anyhow!("PDF buffer error: {e}"))
}

/// Saves a rendered prescription as `{uploads}/prescriptions/{id}.pdf`.
pub fn write_prescription(uploads_dir: &Path, prescription_id: Uuid, pdf: &[u8]) -> Result<PathBuf> {
    let dir = uploads_dir.join("prescriptions");
    std::fs::create_dir_all(&dir).with_context(|| format!("cannot create {}", dir.display()))?;
    let path = dir.join(format!("{prescription_id}.pdf"));
    std::fs::write(&path, pdf).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(path)
}

fn medication_line(number: usize, med: &Medication) -> String {
    let mut line = format!("{number}. {}", med.name);
    let details: Vec<&str> = [med.dosage.as_deref(), med.frequency.as_deref()]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect();
    if !details.is_empty() {
        line.push_str(" - ");
        line.push_str(&details.join(" | "));
    }
    line
}

fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    // Width in characters; names and advice are often not ASCII.
    let mut width = 0;

    for word in text.split_whitespace() {
        let word_width = word.chars().count();
        if width + word_width + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            width = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            width += 1;
        }
        current.push_str(word);
        width += word_width;
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn medication(name: &str) -> Medication {
        Medication {
            name: name.to_string(),
            dosage: Some("500mg".into()),
            frequency: Some("twice daily".into()),
            notes: Some("Take with food".into()),
        }
    }

    #[test]
    fn wrapping_counts_characters_not_bytes() {
        assert_eq!(wrap_text("Ibuprofène après repas", 22), vec!["Ibuprofène après repas"]);
        assert_eq!(wrap_text("ééééé ééééé ééééé", 11), vec!["ééééé ééééé", "ééééé"]);
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }

    #[test]
    fn renders_a_pdf() {
        let doctor = DoctorSnapshot {
            doctor_id: Uuid::new_v4(),
            name: Some("Dr. Sarah Chen".into()),
            email: None,
            specialty: Some("Cardiology".into()),
        };
        let patient = PatientSnapshot {
            patient_id: Uuid::new_v4(),
            name: Some("Ann Lee".into()),
            ..Default::default()
        };
        let meds = vec![medication("Amoxicillin"), medication("Ibuprofen")];
        let pdf = render_prescription(&PrescriptionDocument {
            prescription_id: Uuid::new_v4(),
            doctor: &doctor,
            patient: &patient,
            medications: &meds,
            advice: Some("Rest and drink fluids."),
            issued_at: Utc::now(),
        })
        .unwrap();

        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn long_prescriptions_spill_onto_new_pages() {
        let doctor = DoctorSnapshot::default();
        let patient = PatientSnapshot::default();
        let meds: Vec<Medication> = (0..80).map(|i| medication(&format!("Drug {i}"))).collect();
        let pdf = render_prescription(&PrescriptionDocument {
            prescription_id: Uuid::new_v4(),
            doctor: &doctor,
            patient: &patient,
            medications: &meds,
            advice: None,
            issued_at: Utc::now(),
        })
        .unwrap();

        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn medication_lines_skip_missing_details() {
        let bare = Medication {
            name: "Aspirin".into(),
            ..Default::default()
        };
        assert_eq!(medication_line(1, &bare), "1. Aspirin");
        assert_eq!(
            medication_line(2, &medication("Amoxicillin")),
            "2. Amoxicillin - 500mg | twice daily"
        );
    }

    #[test]
    fn wrap_text_breaks_on_words() {
        let lines = wrap_text("one two three four", 9);
        assert_eq!(lines, vec!["one two", "three", "four"]);
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }

    #[test]
    fn writes_under_prescriptions_dir() {
        let root = std::env::temp_dir().join(format!("medclinic-test-{}", Uuid::new_v4()));
        let id = Uuid::new_v4();
        let path = write_prescription(&root, id, b"%PDF-1.3").unwrap();
        assert_eq!(path, root.join("prescriptions").join(format!("{id}.pdf")));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.3");
        std::fs::remove_dir_all(root).unwrap();
    }
}

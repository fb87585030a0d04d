// lib/src/prescription/render.rs

use models::{HospitalError, HospitalResult};
use printpdf::path::PaintMode;
use printpdf::{BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Rect};

use super::layout::{text_width, Align, DrawOp, Layout, Rgb, PAGE_HEIGHT, PAGE_WIDTH};

fn pdf_err(e: impl std::fmt::Display) -> HospitalError {
    HospitalError::ExportError(format!("PDF rendering failed: {}", e))
}

fn color(c: Rgb) -> Color {
    Color::Rgb(printpdf::Rgb::new(
        f32::from(c.0) / 255.0,
        f32::from(c.1) / 255.0,
        f32::from(c.2) / 255.0,
        None,
    ))
}

/// Layout coordinates run down from the top; PDF coordinates run up from the bottom.
fn flip(y: f32) -> Mm {
    Mm(PAGE_HEIGHT - y)
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn draw(layer: &PdfLayerReference, fonts: &Fonts, op: &DrawOp) {
    match op {
        DrawOp::Rect { x, y, w, h, fill, stroke } => {
            let mode = match (fill, stroke) {
                (Some(_), Some(_)) => PaintMode::FillStroke,
                (None, Some(_)) => PaintMode::Stroke,
                _ => PaintMode::Fill,
            };
            if let Some(f) = fill {
                layer.set_fill_color(color(*f));
            }
            if let Some(s) = stroke {
                layer.set_outline_color(color(*s));
                layer.set_outline_thickness(0.5);
            }
            layer.add_rect(Rect::new(Mm(*x), flip(y + h), Mm(x + w), flip(*y)).with_mode(mode));
        }
        DrawOp::Text { x, y, size, color: c, align, bold, text } => {
            let left = match align {
                Align::Left => *x,
                Align::Center => x - text_width(text, *size) / 2.0,
                Align::Right => x - text_width(text, *size),
            };
            let font = if *bold { &fonts.bold } else { &fonts.regular };
            layer.set_fill_color(color(*c));
            layer.use_text(text.as_str(), *size, Mm(left.max(0.0)), flip(*y), font);
        }
        DrawOp::Line { x1, y1, x2, y2, color: c } => {
            layer.set_outline_color(color(*c));
            layer.set_outline_thickness(0.75);
            layer.add_line(Line {
                points: vec![(Point::new(Mm(*x1), flip(*y1)), false), (Point::new(Mm(*x2), flip(*y2)), false)],
                is_closed: false,
            });
        }
    }
}

/// Renders the laid-out pages into a complete PDF file in memory.
pub fn render_pdf(title: &str, layout: &Layout) -> HospitalResult<Vec<u8>> {
    let (doc, first_page, first_layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let fonts = Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?,
    };

    for (i, page) in layout.pages.iter().enumerate() {
        let layer = if i == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (p, l) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Layer {}", i + 1));
            doc.get_page(p).get_layer(l)
        };
        for op in &page.ops {
            draw(&layer, &fonts, op);
        }
    }

    doc.save_to_bytes().map_err(pdf_err)
}

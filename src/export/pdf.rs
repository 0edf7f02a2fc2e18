//! Users report as a PDF with a fixed letterhead.
//!
//! The page format is a declared [`ReportTemplate`]: named regions in
//! millimetres measured from the top-left corner of an A4 page. [`layout`]
//! turns the template, the letterhead texts and the records into positioned
//! cells without touching the PDF library; [`render`] only draws them.

use printpdf::image_crate::codecs::png::PngDecoder;
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rect, Rgb,
};
use std::io::Cursor;
use tracing::warn;

use super::ExportError;
use crate::config::ReportConfig;
use crate::models::User;

/// Rough Helvetica advance width as a fraction of the font size
const AVG_CHAR_WIDTH: f32 = 0.5;
const PT_TO_MM: f32 = 0.3528;
const CELL_PADDING: f32 = 2.0;

/// Rectangle in millimetres, origin at the top-left corner of the page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    Letterhead,
    Title,
    TableHeader,
    Row { shaded: bool },
}

impl CellStyle {
    pub fn font_size(&self) -> f32 {
        match self {
            CellStyle::Letterhead => 9.0,
            CellStyle::Title => 14.0,
            CellStyle::TableHeader => 10.0,
            CellStyle::Row { .. } => 9.0,
        }
    }

    pub fn bold(&self) -> bool {
        matches!(self, CellStyle::Title | CellStyle::TableHeader)
    }

    pub fn bordered(&self) -> bool {
        !matches!(self, CellStyle::Title)
    }

    fn fill(&self) -> Option<(f32, f32, f32)> {
        match self {
            CellStyle::TableHeader => Some((0.80, 0.80, 0.80)),
            CellStyle::Row { shaded: true } => Some((0.94, 0.94, 0.94)),
            _ => None,
        }
    }
}

/// A positioned piece of text
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub region: Region,
    pub text: String,
    pub style: CellStyle,
    pub align: Align,
}

/// Everything drawn on one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub logo: Option<Region>,
    pub cells: Vec<Cell>,
}

/// Table column: header text and width in millimetres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub title: &'static str,
    pub width: f32,
}

/// Declared report format
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTemplate {
    pub page_width: f32,
    pub page_height: f32,
    pub logo: Region,
    pub institution: Region,
    pub form_name: Region,
    pub form_title: Region,
    pub code: Region,
    pub version: Region,
    pub validity: Region,
    pub title: Region,
    /// Table area on the first page; its height bounds the rows that fit
    pub table: Region,
    /// Table area on continuation pages
    pub continuation_table: Region,
    pub row_height: f32,
    pub columns: [Column; 3],
}

impl Default for ReportTemplate {
    fn default() -> Self {
        Self {
            page_width: 210.0,
            page_height: 297.0,
            logo: Region::new(15.0, 12.0, 35.0, 25.0),
            institution: Region::new(50.0, 12.0, 110.0, 8.0),
            form_name: Region::new(50.0, 20.0, 110.0, 8.5),
            form_title: Region::new(50.0, 28.5, 110.0, 8.5),
            code: Region::new(160.0, 12.0, 35.0, 8.0),
            version: Region::new(160.0, 20.0, 35.0, 8.5),
            validity: Region::new(160.0, 28.5, 35.0, 8.5),
            title: Region::new(15.0, 45.0, 180.0, 10.0),
            table: Region::new(15.0, 60.0, 180.0, 222.0),
            continuation_table: Region::new(15.0, 15.0, 180.0, 267.0),
            row_height: 8.0,
            columns: [
                Column { title: "#", width: 15.0 },
                Column {
                    title: "Nombre",
                    width: 75.0,
                },
                Column {
                    title: "Correo electrónico",
                    width: 90.0,
                },
            ],
        }
    }
}

impl ReportTemplate {
    /// Data rows that fit under the repeated header in a table area
    pub fn rows_per_page(&self, table: &Region) -> usize {
        let lines = (table.height / self.row_height).floor() as usize;
        lines.saturating_sub(1).max(1)
    }
}

/// Cut `text` so it fits `width` millimetres at `font_size` points
pub fn fit_text(text: &str, width: f32, font_size: f32) -> String {
    let char_width = font_size * PT_TO_MM * AVG_CHAR_WIDTH;
    let max_chars = ((width - 2.0 * CELL_PADDING) / char_width).floor().max(0.0) as usize;

    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return text.chars().take(max_chars).collect();
    }

    let mut cut: String = text.chars().take(max_chars - 3).collect();
    cut.push_str("...");
    cut
}

fn cell(region: Region, text: &str, style: CellStyle, align: Align) -> Cell {
    Cell {
        region,
        text: fit_text(text, region.width, style.font_size()),
        style,
        align,
    }
}

fn table_rows(template: &ReportTemplate, table: &Region, first_index: usize, users: &[User], cells: &mut Vec<Cell>) {
    let mut x = table.x;
    for column in &template.columns {
        let region = Region::new(x, table.y, column.width, template.row_height);
        cells.push(cell(region, column.title, CellStyle::TableHeader, Align::Left));
        x += column.width;
    }

    for (offset, user) in users.iter().enumerate() {
        let number = first_index + offset + 1;
        let y = table.y + (offset + 1) as f32 * template.row_height;
        let style = CellStyle::Row {
            shaded: number % 2 == 0,
        };
        let values = [number.to_string(), user.name.clone(), user.email.clone()];

        let mut x = table.x;
        for (column, value) in template.columns.iter().zip(values.iter()) {
            let region = Region::new(x, y, column.width, template.row_height);
            cells.push(cell(region, value, style, Align::Left));
            x += column.width;
        }
    }
}

/// Place the letterhead, title and `(index, name, email)` rows onto pages.
/// The first page carries the letterhead; rows that do not fit continue on
/// further pages, each repeating the table header. Row numbers are 1-based
/// and every even row is shaded.
pub fn layout(template: &ReportTemplate, header: &ReportConfig, users: &[User]) -> Vec<PageLayout> {
    let first_capacity = template.rows_per_page(&template.table);
    let next_capacity = template.rows_per_page(&template.continuation_table);

    let split = first_capacity.min(users.len());
    let (first, rest) = users.split_at(split);

    let mut cells = vec![
        cell(template.institution, &header.institution, CellStyle::Letterhead, Align::Center),
        cell(template.form_name, &header.form_name, CellStyle::Letterhead, Align::Center),
        cell(template.form_title, &header.form_title, CellStyle::Letterhead, Align::Center),
        cell(template.code, &header.code, CellStyle::Letterhead, Align::Left),
        cell(template.version, &header.version, CellStyle::Letterhead, Align::Left),
        cell(template.validity, &header.validity, CellStyle::Letterhead, Align::Left),
        cell(template.title, &header.title, CellStyle::Title, Align::Center),
    ];
    table_rows(template, &template.table, 0, first, &mut cells);

    let mut pages = vec![PageLayout {
        logo: Some(template.logo),
        cells,
    }];

    for (chunk_index, chunk) in rest.chunks(next_capacity).enumerate() {
        let mut cells = Vec::new();
        let first_index = split + chunk_index * next_capacity;
        table_rows(template, &template.continuation_table, first_index, chunk, &mut cells);
        pages.push(PageLayout { logo: None, cells });
    }

    pages
}

/// Read a PNG logo; an unreadable file only drops the logo from the report
pub fn load_logo(path: &str) -> Option<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(path = %path, error = %e, "Report logo not available");
            None
        }
    }
}

fn rgb(r: f32, g: f32, b: f32) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn draw_cell(layer: &PdfLayerReference, fonts: &Fonts, page_height: f32, cell: &Cell) {
    let region = cell.region;
    let lower = page_height - region.bottom();

    let mode = match (cell.style.fill(), cell.style.bordered()) {
        (Some((r, g, b)), _) => {
            layer.set_fill_color(rgb(r, g, b));
            Some(PaintMode::FillStroke)
        }
        (None, true) => Some(PaintMode::Stroke),
        (None, false) => None,
    };
    if let Some(mode) = mode {
        layer.set_outline_color(rgb(0.0, 0.0, 0.0));
        layer.set_outline_thickness(0.5);
        layer.add_rect(
            Rect::new(
                Mm(region.x),
                Mm(lower),
                Mm(region.x + region.width),
                Mm(lower + region.height),
            )
            .with_mode(mode),
        );
    }

    if cell.text.is_empty() {
        return;
    }

    let size = cell.style.font_size();
    let text_width = cell.text.chars().count() as f32 * size * PT_TO_MM * AVG_CHAR_WIDTH;
    let x = match cell.align {
        Align::Left => region.x + CELL_PADDING,
        Align::Center => region.x + ((region.width - text_width) / 2.0).max(CELL_PADDING),
    };
    let baseline = lower + (region.height - size * PT_TO_MM) / 2.0 + size * PT_TO_MM * 0.2;
    let font = if cell.style.bold() { &fonts.bold } else { &fonts.regular };

    layer.set_fill_color(rgb(0.0, 0.0, 0.0));
    layer.use_text(cell.text.as_str(), size, Mm(x), Mm(baseline), font);
}

fn draw_logo(layer: &PdfLayerReference, page_height: f32, region: Region, png: &[u8]) -> Result<(), ExportError> {
    let decoder = PngDecoder::new(Cursor::new(png)).map_err(|e| ExportError::Pdf(e.to_string()))?;
    let image = Image::try_from(decoder).map_err(|e| ExportError::Pdf(e.to_string()))?;

    let dpi = 300.0;
    let natural_width = image.image.width.0 as f32 / dpi * 25.4;
    let natural_height = image.image.height.0 as f32 / dpi * 25.4;
    if natural_width <= 0.0 || natural_height <= 0.0 {
        return Err(ExportError::Pdf("empty logo image".to_string()));
    }
    let scale = (region.width / natural_width).min(region.height / natural_height);

    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(region.x)),
            translate_y: Some(Mm(page_height - region.y - natural_height * scale)),
            scale_x: Some(scale),
            scale_y: Some(scale),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
    Ok(())
}

/// Draw laid-out pages into a PDF held in memory
pub fn render(template: &ReportTemplate, title: &str, pages: &[PageLayout], logo: Option<&[u8]>) -> Result<Vec<u8>, ExportError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(template.page_width), Mm(template.page_height), "Reporte");

    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ExportError::Pdf(e.to_string()))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ExportError::Pdf(e.to_string()))?,
    };

    for (number, page) in pages.iter().enumerate() {
        let layer = if number == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) =
                doc.add_page(Mm(template.page_width), Mm(template.page_height), "Reporte");
            doc.get_page(page_index).get_layer(layer_index)
        };

        if let (Some(region), Some(png)) = (page.logo, logo) {
            if let Err(e) = draw_logo(&layer, template.page_height, region, png) {
                warn!(error = %e, "Skipping report logo");
            }
        }

        for cell in &page.cells {
            draw_cell(&layer, &fonts, template.page_height, cell);
        }
    }

    doc.save_to_bytes().map_err(|e| ExportError::Pdf(e.to_string()))
}

/// Lay out and render the users report
pub fn to_pdf(
    template: &ReportTemplate,
    header: &ReportConfig,
    users: &[User],
    logo: Option<&[u8]>,
) -> Result<Vec<u8>, ExportError> {
    let pages = layout(template, header, users);
    render(template, &header.title, &pages, logo)
}

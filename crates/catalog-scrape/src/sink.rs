//! Spreadsheet output: one row per object, with an embedded thumbnail.
//!
//! The workbook lives in memory and is written out in full by `save`, which
//! the orchestrator calls at every checkpoint and once at the end.

use crate::assets::{ImagePlan, ImageTarget};
use crate::config::ScrapeConfig;
use crate::error::SinkError;
use crate::model::{CatalogField, CellValue, ObjectId, Record};
use image::imageops::FilterType;
use image::ImageFormat;
use regex::Regex;
use rust_xlsxwriter::{Image, Workbook, Worksheet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Longest string a cell can hold.
const MAX_CELL_CHARS: usize = 32_767;
/// Default row height in points.
const DEFAULT_ROW_HEIGHT: f64 = 15.0;
const THUMBNAIL_COL_WIDTH: f64 = 20.0;
const URL_COL_WIDTH: f64 = 60.0;

fn illegal_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]").expect("valid regex"))
}

/// Remove control characters the file format rejects.
///
/// Tab, line feed and carriage return are kept.
pub fn sanitize_cell(value: &str) -> String {
    illegal_chars().replace_all(value, "").into_owned()
}

fn truncate_chars(mut value: String) -> String {
    if let Some((idx, _)) = value.char_indices().nth(MAX_CELL_CHARS) {
        value.truncate(idx);
    }
    value
}

/// Header row for the configured catalog fields and image cap.
pub fn header_row(fields: &[CatalogField], max_additional_images: usize) -> Vec<String> {
    let mut header = vec!["primaryImageThumbnail".to_string()];
    header.extend(fields.iter().map(|f| f.header().to_string()));
    header.push("primaryImageURL".into());
    header.push("primaryImageLocalPath".into());
    header.extend((1..=max_additional_images).map(|i| format!("additionalImage_{i}_URL")));
    header.extend((1..=max_additional_images).map(|i| format!("additionalImage_{i}_LocalPath")));
    header
}

/// Cells of one data row, starting at column 1 (column 0 is the thumbnail).
fn row_cells(
    record: &Record,
    plan: &ImagePlan,
    fields: &[CatalogField],
    max_additional_images: usize,
) -> Vec<CellValue> {
    let mut cells: Vec<CellValue> = fields.iter().map(|&f| record.value(f)).collect();

    let path_text = |t: &ImageTarget| CellValue::Text(t.path.to_string_lossy().into_owned());
    cells.push(CellValue::from(record.primary_image.as_str()));
    cells.push(plan.primary.as_ref().map(path_text).unwrap_or_default());

    let slot = |i: usize| plan.additional.get(i);
    cells.extend((0..max_additional_images).map(|i| {
        CellValue::from(slot(i).map(|t| t.url.as_str()).unwrap_or(""))
    }));
    cells.extend((0..max_additional_images).map(|i| slot(i).map(path_text).unwrap_or_default()));
    cells
}

/// Append-only workbook writer.
pub struct TabularSink {
    workbook: Workbook,
    path: PathBuf,
    fields: Vec<CatalogField>,
    max_additional_images: usize,
    thumbnail_px: u32,
    next_row: u32,
}

impl TabularSink {
    /// Start a workbook destined for `path`, with the header row written.
    pub fn create(path: impl Into<PathBuf>, config: &ScrapeConfig) -> Result<Self, SinkError> {
        let mut workbook = Workbook::new();
        let header = header_row(&config.catalog_fields, config.max_additional_images);
        {
            let sheet = workbook.add_worksheet();
            sheet.set_name(&config.sheet_name)?;
            for (col, name) in header.iter().enumerate() {
                sheet.write_string(0, col as u16, name)?;
            }

            let primary_url_col = (1 + config.catalog_fields.len()) as u16;
            sheet.set_column_width(0, THUMBNAIL_COL_WIDTH)?;
            sheet.set_column_width(primary_url_col, URL_COL_WIDTH)?;
            sheet.set_column_width(primary_url_col + 1, URL_COL_WIDTH)?;
        }

        Ok(Self {
            workbook,
            path: path.into(),
            fields: config.catalog_fields.clone(),
            max_additional_images: config.max_additional_images,
            thumbnail_px: config.thumbnail_px,
            next_row: 1,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of data rows written so far.
    pub fn data_rows(&self) -> usize {
        (self.next_row - 1) as usize
    }

    fn sheet(&mut self) -> Result<&mut Worksheet, SinkError> {
        Ok(self.workbook.worksheet_from_index(0)?)
    }

    fn write_cells(&mut self, row: u32, cells: &[CellValue]) -> Result<(), SinkError> {
        let sheet = self.sheet()?;
        for (i, cell) in cells.iter().enumerate() {
            let col = (i + 1) as u16;
            match cell {
                CellValue::Integer(n) => {
                    sheet.write_number(row, col, *n as f64)?;
                }
                CellValue::Text(text) => {
                    sheet.write_string(row, col, truncate_chars(sanitize_cell(text)))?;
                }
            }
        }
        Ok(())
    }

    /// Append a record's row, anchoring `thumbnail` (PNG bytes from
    /// [`load_thumbnail`]) in its first cell when given.
    pub fn append(
        &mut self,
        record: &Record,
        plan: &ImagePlan,
        thumbnail: Option<&[u8]>,
    ) -> Result<(), SinkError> {
        let row = self.next_row;
        let cells = row_cells(record, plan, &self.fields, self.max_additional_images);
        self.write_cells(row, &cells)?;
        self.next_row += 1;

        if let Some(png) = thumbnail {
            if let Err(e) = self.embed_thumbnail(row, png) {
                warn!(object_id = record.object_id, "thumbnail embed failed: {e}");
            }
        }
        Ok(())
    }

    /// Write a row carrying only the object ID.
    ///
    /// When the previous `append` for the same object failed part-way, the
    /// partial row is overwritten instead of leaving a gap.
    pub fn append_placeholder(&mut self, object_id: ObjectId) -> Result<(), SinkError> {
        let row = self.next_row;
        let record = Record::placeholder(object_id);
        let cells = row_cells(
            &record,
            &ImagePlan::default(),
            &self.fields,
            self.max_additional_images,
        );
        self.write_cells(row, &cells)?;
        self.next_row += 1;
        Ok(())
    }

    /// Anchor the thumbnail in column 0 of `row` and grow the row to fit.
    fn embed_thumbnail(&mut self, row: u32, png: &[u8]) -> Result<(), SinkError> {
        let image = Image::new_from_buffer(png)?;
        let height = f64::from(self.thumbnail_px) * 0.8;

        let sheet = self.sheet()?;
        sheet.insert_image(row, 0, &image)?;
        if height > DEFAULT_ROW_HEIGHT {
            sheet.set_row_height(row, height)?;
        }
        Ok(())
    }

    /// Write the whole workbook to its path.
    pub fn save(&mut self) -> Result<(), SinkError> {
        self.workbook.save(&self.path)?;
        debug!("saved {} data rows to {}", self.data_rows(), self.path.display());
        Ok(())
    }
}

/// Read a downloaded image and turn it into thumbnail PNG bytes.
pub fn load_thumbnail(path: &Path, px: u32) -> Result<Vec<u8>, SinkError> {
    thumbnail_png(&std::fs::read(path)?, px)
}

/// Resize an image to a `px` x `px` footprint and encode it as PNG.
///
/// Re-encoding lets formats the spreadsheet cannot embed (TIFF, WebP) show up
/// as thumbnails.
pub fn thumbnail_png(bytes: &[u8], px: u32) -> Result<Vec<u8>, SinkError> {
    let img = image::load_from_memory(bytes)?;
    let thumb = img.resize_exact(px, px, FilterType::Triangle);

    let mut buf = Vec::new();
    thumb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook, Reader, Xlsx};
    use image::{DynamicImage, GenericImageView};
    use std::io::Read;

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
        let range = workbook.worksheet_range("Met Swords").unwrap();
        range
            .rows()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn column(header: &[String], name: &str) -> usize {
        header.iter().position(|h| h == name).unwrap()
    }

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::new_rgb8(w, h)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_sanitize_cell() {
        assert_eq!(sanitize_cell("Blade\u{7} of kings"), "Blade of kings");
        assert_eq!(sanitize_cell("a\u{0}b\u{b}c\u{c}d\u{1f}e"), "abcde");
        assert_eq!(sanitize_cell("line\nnext\tcol\r"), "line\nnext\tcol\r");
    }

    #[test]
    fn test_truncate_chars() {
        let long = "é".repeat(MAX_CELL_CHARS + 10);
        assert_eq!(truncate_chars(long).chars().count(), MAX_CELL_CHARS);
        assert_eq!(truncate_chars("short".into()), "short");
    }

    #[test]
    fn test_header_row() {
        let header = header_row(&CatalogField::ALL, 8);
        assert_eq!(header.len(), 1 + 24 + 2 + 16);
        assert_eq!(header[0], "primaryImageThumbnail");
        assert_eq!(header[1], "objectID");
        assert_eq!(header[24], "referencesText");
        assert_eq!(header[25], "primaryImageURL");
        assert_eq!(header[27], "additionalImage_1_URL");
        assert_eq!(header[35], "additionalImage_1_LocalPath");
        assert_eq!(header[42], "additionalImage_8_LocalPath");
    }

    #[test]
    fn test_thumbnail_png_fixed_footprint() {
        let png = thumbnail_png(&png_bytes(600, 300), 150).unwrap();
        let loaded = image::load_from_memory(&png).unwrap();
        assert_eq!(loaded.dimensions(), (150, 150));
    }

    #[test]
    fn test_thumbnail_png_rejects_garbage() {
        assert!(matches!(
            thumbnail_png(b"not an image", 150),
            Err(SinkError::Image(_))
        ));
    }

    #[test]
    fn test_append_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.xlsx");
        let config = ScrapeConfig::default();
        let mut sink = TabularSink::create(&out, &config).unwrap();

        let mut record = Record::placeholder(22506);
        record.values.insert(CatalogField::Title, "Tachi\u{7}".into());
        record
            .values
            .insert(CatalogField::ObjectBeginDate, CellValue::Integer(1400));
        record.primary_image = "https://img/main.jpg".into();
        let plan = ImagePlan {
            primary: Some(ImageTarget {
                url: "https://img/main.jpg".into(),
                path: PathBuf::from("imgs/22506/22506_1.jpg"),
            }),
            additional: vec![ImageTarget {
                url: "https://img/b.png".into(),
                path: PathBuf::from("imgs/22506/22506_2.png"),
            }],
        };

        sink.append(&record, &plan, None).unwrap();
        sink.append_placeholder(7).unwrap();
        assert_eq!(sink.data_rows(), 2);
        sink.save().unwrap();

        let rows = read_rows(&out);
        assert_eq!(rows.len(), 3);
        let header = &rows[0];
        assert_eq!(rows[1][column(header, "objectID")], "22506");
        assert_eq!(rows[1][column(header, "title")], "Tachi");
        assert_eq!(rows[1][column(header, "objectBeginDate")], "1400");
        assert_eq!(rows[1][column(header, "primaryImageURL")], "https://img/main.jpg");
        assert_eq!(
            rows[1][column(header, "primaryImageLocalPath")],
            Path::new("imgs/22506/22506_1.jpg").to_string_lossy()
        );
        assert_eq!(rows[1][column(header, "additionalImage_1_URL")], "https://img/b.png");
        assert_eq!(rows[1][column(header, "additionalImage_2_URL")], "");
        assert_eq!(rows[2][column(header, "objectID")], "7");
        assert_eq!(rows[2][column(header, "title")], "");
    }

    fn zip_entry(archive: &mut zip::ZipArchive<std::fs::File>, name: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        archive.by_name(name).unwrap().read_to_end(&mut buf).unwrap();
        buf
    }

    /// `(col, row)` of every `<xdr:from>` anchor in a drawing part.
    fn anchor_origins(drawing: &str) -> Vec<(String, String)> {
        let tag = |block: &str, name: &str| {
            let open = format!("<xdr:{name}>");
            let start = block.find(&open).unwrap() + open.len();
            let end = block[start..].find('<').unwrap() + start;
            block[start..end].to_string()
        };
        drawing
            .split("<xdr:from>")
            .skip(1)
            .map(|rest| {
                let block = &rest[..rest.find("</xdr:from>").unwrap()];
                (tag(block, "col"), tag(block, "row"))
            })
            .collect()
    }

    fn row_tag<'a>(sheet: &'a str, row: u32) -> Option<&'a str> {
        let start = sheet.find(&format!("<row r=\"{row}\""))?;
        let end = sheet[start..].find('>')? + start;
        Some(&sheet[start..end])
    }

    #[test]
    fn test_load_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("1_1.png");
        std::fs::write(&good, png_bytes(40, 80)).unwrap();
        let png = load_thumbnail(&good, 150).unwrap();
        assert_eq!(image::load_from_memory(&png).unwrap().dimensions(), (150, 150));

        let broken = dir.path().join("2_1.jpg");
        std::fs::write(&broken, b"truncated").unwrap();
        assert!(matches!(load_thumbnail(&broken, 150), Err(SinkError::Image(_))));
        assert!(matches!(
            load_thumbnail(&dir.path().join("missing.jpg"), 150),
            Err(SinkError::Io(_))
        ));
    }

    #[test]
    fn test_thumbnail_anchored_in_first_cell() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.xlsx");
        let config = ScrapeConfig::default();
        let mut sink = TabularSink::create(&out, &config).unwrap();

        let png = thumbnail_png(&png_bytes(40, 80), config.thumbnail_px).unwrap();
        sink.append(&Record::placeholder(1), &ImagePlan::default(), Some(png.as_slice()))
            .unwrap();
        // Bytes that are not an image are skipped; the row is still written.
        sink.append(&Record::placeholder(2), &ImagePlan::default(), Some(&b"truncated"[..]))
            .unwrap();
        sink.append(&Record::placeholder(3), &ImagePlan::default(), None)
            .unwrap();
        assert_eq!(sink.data_rows(), 3);
        sink.save().unwrap();

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&out).unwrap()).unwrap();

        let drawing = zip_entry(&mut archive, "xl/drawings/drawing1.xml");
        let drawing = String::from_utf8(drawing).unwrap();
        assert_eq!(anchor_origins(&drawing), vec![("0".to_string(), "1".to_string())]);

        let media = zip_entry(&mut archive, "xl/media/image1.png");
        assert_eq!(image::load_from_memory(&media).unwrap().dimensions(), (150, 150));
        assert!(archive.by_name("xl/media/image2.png").is_err());

        let sheet = zip_entry(&mut archive, "xl/worksheets/sheet1.xml");
        let sheet = String::from_utf8(sheet).unwrap();
        assert!(row_tag(&sheet, 2).unwrap().contains(r#"ht="120""#));
        assert!(!row_tag(&sheet, 3).unwrap().contains("ht="));
        assert!(!row_tag(&sheet, 4).unwrap().contains("ht="));

        let rows = read_rows(&out);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[2][column(&rows[0], "objectID")], "2");
    }
}

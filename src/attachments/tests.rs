use super::*;
use anyhow::bail;
use std::cell::Cell;
use tempfile::TempDir;

struct FakeReader {
    text: &'static str,
    calls: Cell<usize>,
}

impl FakeReader {
    fn new(text: &'static str) -> Self {
        Self {
            text,
            calls: Cell::new(0),
        }
    }
}

impl ImageReader for FakeReader {
    fn read_text(&self, image: &[u8]) -> Result<String> {
        self.calls.set(self.calls.get() + 1);
        assert!(!image.is_empty());
        Ok(self.text.to_string())
    }
}

struct BrokenReader;

impl ImageReader for BrokenReader {
    fn read_text(&self, _image: &[u8]) -> Result<String> {
        bail!("vision model unavailable")
    }
}

fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).expect("can write attachment");
    path
}

#[test]
fn image_goes_through_reader() -> Result<()> {
    let dir = TempDir::new()?;
    let reader = FakeReader::new("x = zeros(3);");

    for name in ["shot.png", "shot.JPG", "shot.jpeg"] {
        let path = write(&dir, name, &[0x89, 0x50, 0x4e, 0x47]);
        let attachment = process_attachment(&path, &reader)?;
        assert_eq!(attachment.to_context(), "IMAGE CONTENT:\nx = zeros(3);");
    }
    assert_eq!(reader.calls.get(), 3);
    Ok(())
}

#[test]
fn reader_failure_is_an_error() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write(&dir, "shot.png", &[1, 2, 3]);
    assert!(process_attachment(&path, &BrokenReader).is_err());
    Ok(())
}

#[test]
fn matlab_source_is_read() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write(&dir, "fit.m", b"p = polyfit(x, y, 2);");
    let reader = FakeReader::new("unused");

    let attachment = process_attachment(&path, &reader)?;
    assert_eq!(
        attachment,
        Attachment::MatlabSource {
            content: "p = polyfit(x, y, 2);".to_string()
        }
    );
    assert_eq!(
        attachment.to_context(),
        "MATLAB FILE CONTENT:\np = polyfit(x, y, 2);"
    );
    assert_eq!(reader.calls.get(), 0);
    Ok(())
}

#[test]
fn binary_mat_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write(&dir, "data.mat", &[0x4d, 0x41, 0x54, 0xff, 0xfe, 0x00, 0xc3]);

    let attachment = process_attachment(&path, &FakeReader::new("unused"))?;
    assert_eq!(attachment, Attachment::BinaryMatlab);
    assert_eq!(
        attachment.to_context(),
        "Unable to read binary MATLAB file content."
    );
    Ok(())
}

#[test]
fn unsupported_extension_is_not_an_error() -> Result<()> {
    let dir = TempDir::new()?;
    let reader = FakeReader::new("unused");

    for name in ["report.docx", "notes", "archive.tar.gz"] {
        let path = write(&dir, name, b"content");
        let attachment = process_attachment(&path, &reader)?;
        assert_eq!(attachment, Attachment::Unsupported);
        assert_eq!(attachment.to_context(), "Unsupported file type.");
    }
    Ok(())
}

#[test]
fn missing_file_is_an_error() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("missing.m");
    assert!(process_attachment(&path, &FakeReader::new("unused")).is_err());
}

#[test]
fn combine_and_display() {
    let combined = combine_with_query("Why does this fail?", "MATLAB FILE CONTENT:\nx = [1 2");
    assert_eq!(
        combined,
        "Why does this fail?\n\nContext from uploaded file:\nMATLAB FILE CONTENT:\nx = [1 2"
    );
    assert_eq!(display_text(&combined), "Why does this fail?");
    assert_eq!(display_text("plain question"), "plain question");
}

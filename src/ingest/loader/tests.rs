use super::*;
use tempfile::TempDir;

#[test]
fn classify_by_extension() {
    assert_eq!(FileKind::from_path(Path::new("a.pdf")), Some(FileKind::Pdf));
    assert_eq!(FileKind::from_path(Path::new("A.PDF")), Some(FileKind::Pdf));
    assert_eq!(FileKind::from_path(Path::new("notes.txt")), Some(FileKind::Text));
    assert_eq!(FileKind::from_path(Path::new("README.Md")), Some(FileKind::Markdown));
    assert_eq!(FileKind::from_path(Path::new("solver.m")), Some(FileKind::Matlab));
    assert_eq!(FileKind::from_path(Path::new("data.mat")), None);
    assert_eq!(FileKind::from_path(Path::new("image.png")), None);
    assert_eq!(FileKind::from_path(Path::new("Makefile")), None);
}

#[test]
fn list_files_is_sorted_and_flat() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("b.txt"), "b")?;
    std::fs::write(dir.path().join("a.md"), "a")?;
    std::fs::write(dir.path().join("c.png"), [0_u8, 1, 2])?;
    std::fs::create_dir(dir.path().join("nested"))?;
    std::fs::write(dir.path().join("nested").join("d.txt"), "d")?;

    let names: Vec<String> = list_files(dir.path())?
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();

    assert_eq!(names, vec!["a.md", "b.txt", "c.png"]);
    Ok(())
}

#[test]
fn list_missing_directory_fails() {
    let dir = TempDir::new().expect("should create temp dir");
    assert!(list_files(&dir.path().join("missing")).is_err());
}

#[test]
fn load_text_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("plot_basics.m");
    std::fs::write(&path, "x = linspace(0, 1);\nplot(x, x.^2);\n")?;

    let units = load_file(&path, FileKind::Matlab)?;
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].source, "plot_basics.m");
    assert_eq!(units[0].page, None);
    assert!(units[0].text.contains("linspace"));
    Ok(())
}

#[test]
fn blank_file_yields_no_units() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("empty.txt");
    std::fs::write(&path, "  \n\n ")?;

    assert!(load_file(&path, FileKind::Text)?.is_empty());
    Ok(())
}

#[test]
fn invalid_pdf_is_an_error() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("broken.pdf");
    std::fs::write(&path, "this is not a pdf")?;

    assert!(load_file(&path, FileKind::Pdf).is_err());
    Ok(())
}

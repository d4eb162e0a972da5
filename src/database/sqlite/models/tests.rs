use chrono::Utc;

use super::*;

#[test]
fn document_status_display() {
    assert_eq!(DocumentStatus::Indexed.to_string(), "Indexed");
    assert_eq!(DocumentStatus::Skipped.to_string(), "Skipped");
    assert_eq!(DocumentStatus::Failed.to_string(), "Failed");
}

#[test]
fn document_status_serializes_lowercase() {
    let json = serde_json::to_string(&DocumentStatus::Skipped).expect("serializes");
    assert_eq!(json, "\"skipped\"");
}

#[test]
fn indexed_documents() {
    let mut document = Document {
        id: 1,
        source: "matlab_primer.pdf".to_string(),
        file_type: "pdf".to_string(),
        unit_count: 12,
        chunk_count: 40,
        status: DocumentStatus::Indexed,
        error_message: None,
        ingested_date: Utc::now().naive_utc(),
    };
    assert!(document.is_indexed());

    document.status = DocumentStatus::Failed;
    assert!(!document.is_indexed());
}

#[test]
fn status_parses_case_insensitively() {
    assert_eq!("indexed".parse(), Ok(DocumentStatus::Indexed));
    assert_eq!(" Skipped ".parse(), Ok(DocumentStatus::Skipped));
    assert_eq!("FAILED".parse(), Ok(DocumentStatus::Failed));
    assert!("pending".parse::<DocumentStatus>().is_err());
}

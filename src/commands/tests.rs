use super::*;
use tempfile::TempDir;

#[test]
fn parse_chat_commands() {
    assert_eq!(ChatCommand::parse("q"), Ok(ChatCommand::Quit));
    assert_eq!(ChatCommand::parse(" exit "), Ok(ChatCommand::Quit));
    assert_eq!(ChatCommand::parse("quit"), Ok(ChatCommand::Quit));
    assert_eq!(ChatCommand::parse("/new"), Ok(ChatCommand::NewChat));
    assert_eq!(ChatCommand::parse("/clear"), Ok(ChatCommand::Clear));
    assert_eq!(ChatCommand::parse("/sessions"), Ok(ChatCommand::Sessions));
    assert_eq!(ChatCommand::parse("/web on"), Ok(ChatCommand::Web(true)));
    assert_eq!(ChatCommand::parse("/web  off"), Ok(ChatCommand::Web(false)));
    assert_eq!(
        ChatCommand::parse("/attach ~/plots/figure 1.png"),
        Ok(ChatCommand::Attach(PathBuf::from("~/plots/figure 1.png")))
    );
    assert_eq!(
        ChatCommand::parse("How do I quit MATLAB?"),
        Ok(ChatCommand::Question("How do I quit MATLAB?".to_string()))
    );
}

#[test]
fn bad_chat_commands_give_hints() {
    assert_eq!(
        ChatCommand::parse("/web maybe"),
        Err("Usage: /web on|off".to_string())
    );
    assert_eq!(
        ChatCommand::parse("/attach"),
        Err("Usage: /attach <file>".to_string())
    );
    assert!(
        ChatCommand::parse("/theme dark")
            .expect_err("unknown command")
            .starts_with("Unknown command /theme dark")
    );
}

#[test]
fn citation_lines() {
    let citations = vec![
        ChunkMetadata {
            source: "getting_started.pdf".to_string(),
            page: Some(3),
            chunk_index: 10,
        },
        ChunkMetadata {
            source: "notes.md".to_string(),
            page: None,
            chunk_index: 11,
        },
    ];

    assert_eq!(
        format_citations(&citations),
        vec![
            "[1] getting_started.pdf (page 3)".to_string(),
            "[2] notes.md".to_string()
        ]
    );
    assert!(format_citations(&[]).is_empty());
}

#[test]
fn explicit_base_dir_wins() -> Result<()> {
    let dir = TempDir::new()?;
    assert_eq!(
        resolve_base_dir(Some(dir.path().to_path_buf()))?,
        dir.path().to_path_buf()
    );
    Ok(())
}

#[tokio::test]
async fn ingest_rejects_missing_directory() -> Result<()> {
    let dir = TempDir::new()?;
    let config = Config {
        base_dir: dir.path().to_path_buf(),
        ..Config::default()
    };

    let result = ingest_documents(config, &dir.path().join("missing")).await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn list_documents_on_empty_catalog() -> Result<()> {
    let dir = TempDir::new()?;
    let config = Config {
        base_dir: dir.path().to_path_buf(),
        ..Config::default()
    };

    assert!(list_documents(&config, None).await?.is_empty());
    assert!(config.database_path().exists());
    Ok(())
}

#[tokio::test]
async fn list_documents_filters_by_status() -> Result<()> {
    let dir = TempDir::new()?;
    let config = Config {
        base_dir: dir.path().to_path_buf(),
        ..Config::default()
    };

    let database = Database::initialize(&config).await?;
    for (source, status) in [
        ("a.txt", DocumentStatus::Indexed),
        ("b.pdf", DocumentStatus::Failed),
        ("c.md", DocumentStatus::Skipped),
    ] {
        database
            .record_document(&crate::database::sqlite::NewDocument {
                source: source.to_string(),
                file_type: "txt".to_string(),
                unit_count: 1,
                chunk_count: i64::from(status == DocumentStatus::Indexed),
                status,
                error_message: None,
            })
            .await?;
    }

    let failed = list_documents(&config, Some(DocumentStatus::Failed)).await?;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].source, "b.pdf");
    assert_eq!(list_documents(&config, None).await?.len(), 3);
    Ok(())
}

#[test]
fn list_sessions_for_unknown_user() -> Result<()> {
    let dir = TempDir::new()?;
    let config = Config {
        base_dir: dir.path().to_path_buf(),
        ..Config::default()
    };

    list_sessions(&config, "nobody")?;
    assert!(!config.user_store_path().exists());
    Ok(())
}

#[test]
fn unsupported_attachment_stays_out_of_question() -> Result<()> {
    let dir = TempDir::new()?;
    let config = Config {
        base_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    let notes = dir.path().join("notes.docx");
    std::fs::write(&notes, "binary-ish")?;

    assert_eq!(question_context(&Attachment::Unsupported), None);
    assert_eq!(
        attach_to(&config, "How do I plot?", &notes),
        "How do I plot?"
    );
    Ok(())
}

#[test]
fn matlab_attachment_joins_question() -> Result<()> {
    let dir = TempDir::new()?;
    let config = Config {
        base_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    let script = dir.path().join("solver.m");
    std::fs::write(&script, "x = 1:5;")?;

    let question = attach_to(&config, "Why does this fail?", &script);
    assert!(question.starts_with("Why does this fail?\n\nContext from uploaded file:\n"));
    assert!(question.ends_with("x = 1:5;"));
    Ok(())
}

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde_json::Value;
use strum::IntoEnumIterator;
use thesia_client::ThesisApiClient;
use thesia_core::errors::ApiError;
use thesia_core::models::{ProjectDocument, ProjectField};
use thesia_core::{AiBackend, ThesiaConfig};

use crate::app::App;

pub async fn status(config: ThesiaConfig) -> Result<()> {
    let api = ThesisApiClient::from_config(&config);
    match api.health_check().await {
        Ok(()) => println!("AI backend   {} (ok)", api.base_url()),
        Err(e) => println!("AI backend   {} ({})", api.base_url(), e.notice().title),
    }

    match App::build(config) {
        Ok(app) => {
            app.session.initialize().await;
            match app.session.session() {
                Some(session) => println!(
                    "Signed in    {}",
                    session.user.display_name().unwrap_or(session.user_id())
                ),
                None => println!("Signed in    no"),
            }
        }
        Err(e) => println!("Sign-in      unavailable ({:#})", e),
    }
    Ok(())
}

pub async fn login(config: ThesiaConfig) -> Result<()> {
    let app = App::build(config)?;
    app.session.initialize().await;
    if let Some(session) = app.session.session() {
        println!(
            "Already signed in as {}",
            session.user.display_name().unwrap_or(session.user_id())
        );
        return Ok(());
    }
    app.session.sign_in().await;
    Ok(())
}

pub async fn callback(config: ThesiaConfig, url: &str) -> Result<()> {
    let app = App::build(config)?;
    let session = app
        .auth
        .complete_sign_in(url)
        .await
        .context("Sign-in was not completed")?;
    println!(
        "Signed in as {}",
        session.user.display_name().unwrap_or(session.user_id())
    );
    Ok(())
}

pub async fn logout(config: ThesiaConfig) -> Result<()> {
    let app = App::build(config)?;
    app.session.initialize().await;
    app.session.sign_out().await;
    println!("Signed out");
    Ok(())
}

pub async fn show(config: ThesiaConfig) -> Result<()> {
    let mut app = App::build(config)?;
    if !app.open_dashboard().await? {
        return Ok(());
    }
    print!("{}", render_document(&app.project.document()));
    Ok(())
}

pub async fn set(config: ThesiaConfig, field: &str, value: String) -> Result<()> {
    let field = parse_field(field)?;
    let mut app = App::build(config)?;
    if !app.open_dashboard().await? {
        return Ok(());
    }

    app.project.set_field(field, value);
    if matches!(
        field,
        ProjectField::Grade | ProjectField::Area | ProjectField::SubArea | ProjectField::Level
    ) {
        if let Some(verdict) = app.dashboard.validate_profile().await {
            println!("Profile check:");
            print_json(&verdict);
        }
    }

    app.finish().await;
    println!("{} updated", field);
    Ok(())
}

pub async fn reset(config: ThesiaConfig) -> Result<()> {
    let mut app = App::build(config)?;
    if !app.open_dashboard().await? {
        return Ok(());
    }
    app.project.reset();
    app.finish().await;
    println!("Project cleared");
    Ok(())
}

pub async fn evaluate(config: ThesiaConfig) -> Result<()> {
    let mut app = App::build(config)?;
    if !app.open_dashboard().await? {
        return Ok(());
    }
    let result = app.dashboard.evaluate_viability().await;
    report(result)
}

pub async fn validate_profile(config: ThesiaConfig) -> Result<()> {
    let mut app = App::build(config)?;
    if !app.open_dashboard().await? {
        return Ok(());
    }
    match app.dashboard.validate_profile().await {
        Some(verdict) => print_json(&verdict),
        None => println!("Nothing to validate: set grade, area and level first"),
    }
    app.finish().await;
    Ok(())
}

pub async fn analyze(config: ThesiaConfig, path: &Path) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("not a file path: {}", path.display()))?
        .to_string();
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut app = App::build(config)?;
    if !app.open_dashboard().await? {
        return Ok(());
    }
    let result = app.dashboard.analyze_regulations(&file_name, bytes).await;
    app.finish().await;
    report(result)
}

pub async fn structure(config: ThesiaConfig) -> Result<()> {
    let mut app = App::build(config)?;
    if !app.open_dashboard().await? {
        return Ok(());
    }
    let result = app.dashboard.generate_structure().await;
    report(result)
}

pub async fn estimate(config: ThesiaConfig, params_millions: f64) -> Result<()> {
    let app = App::build(config)?;
    let result = app.dashboard.estimate_resources(params_millions).await;
    report(result)
}

fn parse_field(name: &str) -> Result<ProjectField> {
    ProjectField::from_str(name).map_err(|_| {
        let known: Vec<String> = ProjectField::iter().map(|f| f.to_string()).collect();
        anyhow::anyhow!("unknown field '{}' (expected one of: {})", name, known.join(", "))
    })
}

/// Prints a result, or the user-facing notice for a failure before returning it.
fn report(result: Result<Value, ApiError>) -> Result<()> {
    match result {
        Ok(value) => {
            print_json(&value);
            Ok(())
        }
        Err(err) => {
            let notice = err.notice();
            eprintln!("{}: {}", notice.title, notice.message);
            if let Some(url) = &notice.action_url {
                eprintln!("Recharge at {}", url);
            }
            Err(err.into())
        }
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", value),
    }
}

fn render_document(document: &ProjectDocument) -> String {
    let mut out = String::new();
    for field in ProjectField::iter() {
        let value = document.field(field);
        let shown = if value.is_empty() { "-" } else { value };
        out.push_str(&format!("{:<10} {}\n", field.to_string(), shown));
    }

    let results = [
        ("profileValidation", &document.profile_validation),
        ("regulationStructure", &document.regulation_structure),
        ("analysisResult", &document.analysis_result),
    ];
    for (name, result) in results {
        if let Some(value) = result {
            let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            out.push_str(&format!("\n{}:\n{}\n", name, text));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_kebab_case_fields() {
        assert_eq!(parse_field("sub-area").unwrap(), ProjectField::SubArea);
        assert_eq!(parse_field("title").unwrap(), ProjectField::Title);

        let err = parse_field("grado").unwrap_err().to_string();
        assert!(err.contains("unknown field 'grado'"));
        assert!(err.contains("sub-area"));
    }

    #[test]
    fn renders_fields_and_results() {
        let document = ProjectDocument {
            title: "Impact of AI".to_string(),
            analysis_result: Some(json!({"estructura": ["I"]})),
            ..Default::default()
        };

        let text = render_document(&document);

        assert!(text.starts_with("title      Impact of AI\n"));
        assert!(text.contains("objective  -\n"));
        assert!(text.contains("analysisResult:"));
        assert!(!text.contains("profileValidation"));
    }

    #[test]
    fn failures_are_returned_after_reporting() {
        let err = report(Err(ApiError::InsufficientBalance {
            detail: "Insufficient Balance".to_string(),
        }))
        .unwrap_err();
        assert!(err.to_string().contains("Insufficient balance"));
        assert!(report(Ok(json!({"ok": true}))).is_ok());

        let err = report(Err(ApiError::InvalidRequest(
            "parameter count must be positive, got 0".to_string(),
        )))
        .unwrap_err();
        assert!(err.to_string().contains("must be positive"));
    }
}

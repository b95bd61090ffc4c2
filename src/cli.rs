// src/cli.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::core::{AnalysisSession, ConnectionProber};
use crate::types::{AnalysisResult, Envelope, HistoryEntry, ResumeFile};

#[derive(Parser)]
#[command(name = "cvscan")]
#[command(about = "Score résumés against job descriptions with the ATS analysis service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Service base URL, overriding configuration and API_BASE_URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Analyze a résumé against a job description
    Analyze {
        #[arg(long)]
        resume: PathBuf,
        /// Job description text
        #[arg(long, conflicts_with = "job_file")]
        job: Option<String>,
        /// File holding the job description
        #[arg(long)]
        job_file: Option<PathBuf>,
    },
    /// Upload a résumé without analyzing it
    Upload { file: PathBuf },
    /// List past analyses
    History,
    /// Check backend health
    Health,
    /// Diagnose connectivity to every endpoint
    Probe,
}

pub async fn handle_command(cli: Cli) -> Result<()> {
    let config = match &cli.base_url {
        Some(url) => ClientConfig::load()?.with_base_url(url.as_str()),
        None => ClientConfig::load()?,
    };
    info!("Using analysis service at {}", config.base_url);

    let session = AnalysisSession::from_config(&config)?;

    match cli.command {
        Command::Analyze {
            resume,
            job,
            job_file,
        } => {
            let job_description = read_job_description(job, job_file).await?;
            let file = load_resume(&resume, &config).await?;

            let envelope = session.analyze(job_description, file).await?;
            let result = require_data(envelope)?;

            if cli.json {
                print_json(&result)?;
            } else {
                print_analysis(&result);
            }
        }

        Command::Upload { file } => {
            let file = load_resume(&file, &config).await?;
            let receipt = require_data(session.upload(file).await?)?;

            if cli.json {
                print_json(&receipt)?;
            } else {
                println!("✅ Uploaded {} (id: {})", receipt.file_name, receipt.file_id);
            }
        }

        Command::History => {
            let entries = require_data(session.history().await?)?;

            if cli.json {
                print_json(&entries)?;
            } else {
                print_history(&entries);
            }
        }

        Command::Health => {
            let envelope = session.check_health().await?;

            if cli.json {
                print_json(&envelope)?;
            } else if let Some(health) = envelope.data() {
                println!("✅ Backend is {} ({})", health.status, health.timestamp);
            } else {
                println!(
                    "❌ Backend reported a failure: {}",
                    envelope
                        .error()
                        .or(envelope.message())
                        .unwrap_or("no details")
                );
            }
        }

        Command::Probe => {
            let result = ConnectionProber::new(session.api().clone()).probe().await;
            result.log_report();

            if cli.json {
                print_json(&result)?;
            } else {
                for (endpoint, ok) in &result.api_endpoints {
                    println!("{} {}", if *ok { "✅" } else { "❌" }, endpoint);
                }
                for suggestion in &result.suggestions {
                    println!("💡 {}", suggestion);
                }
            }

            if !result.backend_reachable {
                anyhow::bail!("Backend is not reachable");
            }
        }
    }

    Ok(())
}

async fn read_job_description(job: Option<String>, job_file: Option<PathBuf>) -> Result<String> {
    let text = match (job, job_file) {
        (Some(text), _) => text,
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read job description: {}", path.display()))?,
        (None, None) => anyhow::bail!("Provide a job description with --job or --job-file"),
    };

    if text.trim().is_empty() {
        anyhow::bail!("Job description is empty");
    }
    Ok(text)
}

async fn load_resume(path: &Path, config: &ClientConfig) -> Result<ResumeFile> {
    let file = ResumeFile::from_path(path).await?;
    file.validate(config.max_upload_bytes)?;
    Ok(file)
}

fn require_data<T>(envelope: Envelope<T>) -> Result<T> {
    if !envelope.is_success() {
        let reason = envelope
            .error()
            .or(envelope.message())
            .unwrap_or("request was not successful")
            .to_string();
        anyhow::bail!("Service rejected the request: {}", reason);
    }

    envelope
        .into_data()
        .ok_or_else(|| anyhow::anyhow!("Service returned no data"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_analysis(result: &AnalysisResult) {
    println!("📊 ATS score:        {}/100", result.ats_score);
    println!("🎯 Match percentage: {}%", result.match_percentage);

    print_list("Missing keywords", &result.missing_keywords);
    print_list("Strengths", &result.strengths);
    print_list("Recommendations", &result.recommendations);

    if let Some(detail) = &result.detailed_analysis {
        print_list("Skills match", &detail.skills_match);
        print_list("Experience match", &detail.experience_match);
        print_list("Education match", &detail.education_match);
        print_list("Improvement areas", &detail.improvement_areas);
    }
}

fn print_history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        warn!("No analyses recorded yet");
        return;
    }

    for entry in entries {
        let when = entry
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let name = entry.file_name.as_deref().unwrap_or("(unnamed)");
        match &entry.result {
            Some(result) => println!(
                "{}  {:<30}  ATS {:>3}  match {:>3}%",
                when, name, result.ats_score, result.match_percentage
            ),
            None => println!("{}  {:<30}  (no scores)", when, name),
        }
    }
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{}:", title);
    for item in items {
        println!("  - {}", item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_analyze_command() {
        let cli = Cli::try_parse_from([
            "cvscan",
            "--json",
            "analyze",
            "--resume",
            "cv.pdf",
            "--job",
            "Rust developer",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Command::Analyze { resume, job, job_file } => {
                assert_eq!(resume, PathBuf::from("cv.pdf"));
                assert_eq!(job.as_deref(), Some("Rust developer"));
                assert!(job_file.is_none());
            }
            _ => panic!("expected analyze command"),
        }
    }

    #[test]
    fn test_job_and_job_file_conflict() {
        let parsed = Cli::try_parse_from([
            "cvscan", "analyze", "--resume", "cv.pdf", "--job", "x", "--job-file", "job.txt",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_global_base_url_after_subcommand() {
        let cli = Cli::try_parse_from(["cvscan", "probe", "--base-url", "http://h:1/api"]).unwrap();
        assert_eq!(cli.base_url.as_deref(), Some("http://h:1/api"));
        assert!(matches!(cli.command, Command::Probe));
    }

    #[tokio::test]
    async fn test_job_description_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Senior Rust engineer").unwrap();

        let text = read_job_description(None, Some(file.path().to_path_buf()))
            .await
            .unwrap();
        assert_eq!(text, "Senior Rust engineer");
    }

    #[tokio::test]
    async fn test_missing_or_blank_job_description_is_rejected() {
        assert!(read_job_description(None, None).await.is_err());
        assert!(read_job_description(Some("   ".to_string()), None)
            .await
            .is_err());
    }

    #[test]
    fn test_require_data() {
        assert_eq!(require_data(Envelope::ok(3)).unwrap(), 3);

        let err = require_data::<u8>(Envelope::failure("quota exceeded")).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }
}

use std::{fs, io, path::Path};

use anyhow::{Context, Result};
use jira2bz_bugzilla::{render_document, transform_issue_with, SkipReason, Transform};
use jira2bz_config::Jira2BzConfig;
use jira2bz_domain::AttachmentMeta;
use jira2bz_jira::{
    export::{is_missing_issue, parse_attachment_refs, parse_issue_export},
    JiraClient,
};
use tracing::{info, warn};

use crate::layout::Layout;

/// The two downloads the fetch stages need from the source tracker.
pub trait SourceTracker {
    fn fetch_issue_xml(&self, key: &str) -> Result<Vec<u8>>;
    fn fetch_attachment(&self, id: &str, file_name: &str) -> Result<Option<Vec<u8>>>;
}

impl SourceTracker for JiraClient {
    fn fetch_issue_xml(&self, key: &str) -> Result<Vec<u8>> {
        JiraClient::fetch_issue_xml(self, key)
    }

    fn fetch_attachment(&self, id: &str, file_name: &str) -> Result<Option<Vec<u8>>> {
        JiraClient::fetch_attachment(self, id, file_name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub processed: usize,
    pub written: usize,
    pub skipped: usize,
    pub missing: usize,
}

impl StageReport {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            ..Self::default()
        }
    }
}

/// Stores the raw export of every issue byte for byte, not-found pages included.
pub fn fetch_issues<S: SourceTracker>(
    tracker: &S,
    layout: &Layout,
    numbers: &[u32],
) -> Result<StageReport> {
    let mut report = StageReport::new("fetch");
    create_dir(layout.raw_dir())?;

    for &number in numbers {
        let key = layout.key(number);
        let body = tracker.fetch_issue_xml(&key)?;
        let path = layout.raw_issue_path(number);
        fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
        info!(key = %key, path = %path.display(), "fetched issue");
        report.processed += 1;
        report.written += 1;
    }

    Ok(report)
}

/// Attachments are filed under the configured key, the same key
/// [`transform_issues`] reads them back with.
pub fn fetch_attachments<S: SourceTracker>(
    tracker: &S,
    layout: &Layout,
    numbers: &[u32],
) -> Result<StageReport> {
    let mut report = StageReport::new("attachments");

    for &number in numbers {
        let key = layout.key(number);
        report.processed += 1;
        let Some(body) = read_raw_issue(layout, number)? else {
            report.missing += 1;
            continue;
        };
        if is_missing_issue(&body) {
            report.skipped += 1;
            continue;
        }
        let attachments = match parse_attachment_refs(&body) {
            Ok(attachments) => attachments,
            Err(error) => {
                warn!(key = %key, error = %format!("{error:#}"), "unreadable issue export, skipping");
                report.skipped += 1;
                continue;
            }
        };

        for meta in &attachments {
            let Some(bytes) = tracker.fetch_attachment(&meta.id, &meta.file_name)? else {
                warn!(
                    key = %key,
                    attachment = %meta.id,
                    file_name = %meta.file_name,
                    "attachment download refused"
                );
                report.missing += 1;
                continue;
            };
            create_dir(&layout.attachment_dir(&key))?;
            let path = layout.attachment_path(&key, &meta.id, &meta.file_name);
            fs::write(&path, bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(key = %key, path = %path.display(), "fetched attachment");
            report.written += 1;
        }
    }

    Ok(report)
}

pub fn transform_issues(
    config: &Jira2BzConfig,
    layout: &Layout,
    numbers: &[u32],
) -> Result<StageReport> {
    let mut report = StageReport::new("transform");
    create_dir(layout.output_dir())?;

    for &number in numbers {
        let key = layout.key(number);
        report.processed += 1;
        let Some(body) = read_raw_issue(layout, number)? else {
            report.missing += 1;
            continue;
        };
        if is_missing_issue(&body) {
            info!(key = %key, "issue does not exist, skipping");
            report.skipped += 1;
            continue;
        }

        let transformed = parse_issue_export(&body).and_then(|issue| {
            transform_issue_with(&issue, &config.mappings, &config.export, |meta| {
                load_attachment(layout, &key, meta)
            })
        });
        let bug = match transformed {
            Ok(Transform::Bug(bug)) => bug,
            Ok(Transform::Skipped(SkipReason::SkippedVersion(version))) => {
                info!(key = %key, version = %version, "version is skip-listed, skipping");
                report.skipped += 1;
                continue;
            }
            // Disk failures end the run; a malformed export only loses its own issue.
            Err(error) if error.downcast_ref::<io::Error>().is_some() => return Err(error),
            Err(error) => {
                warn!(key = %key, error = %format!("{error:#}"), "cannot transform issue, skipping");
                report.skipped += 1;
                continue;
            }
        };

        let path = layout.output_path(number);
        fs::write(&path, render_document(&bug, &config.export))
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(
            key = %key,
            path = %path.display(),
            comments = bug.comments.len(),
            attachments = bug.attachments.len(),
            "wrote bugzilla document"
        );
        report.written += 1;
    }

    Ok(report)
}

fn read_raw_issue(layout: &Layout, number: u32) -> Result<Option<String>> {
    let path = layout.raw_issue_path(number);
    match fs::read(&path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "raw issue file not found, skipping");
            Ok(None)
        }
        Err(error) => Err(error).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn load_attachment(layout: &Layout, key: &str, meta: &AttachmentMeta) -> Result<Option<Vec<u8>>> {
    let path = layout.attachment_path(key, &meta.id, &meta.file_name);
    match fs::read(&path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("failed to create {}", path.display()))
}

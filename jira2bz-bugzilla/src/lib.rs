use std::collections::HashMap;

use anyhow::{Context, Result};
use base64::Engine;
use chrono::{DateTime, FixedOffset};
use jira2bz_config::{ExportConfig, Mappings, DEFAULT_PERSON_KEY};
use jira2bz_domain::{AttachmentMeta, LongDesc, Person, SourceIssue, TargetAttachment, TargetBug};
use tracing::warn;

mod render;

pub use render::{escape_xml_attr, escape_xml_text, render_document};

const DATE_FORMAT: &str = "%Y-%m-%d";
const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";
const SECOND_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ATTACHMENT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    SkippedVersion(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transform {
    Bug(TargetBug),
    Skipped(SkipReason),
}

/// Turns a parsed JIRA issue into a Bugzilla bug.
///
/// `load_attachment` returns the stored bytes of an attachment, or `None`
/// when nothing was downloaded for it; such attachments are left out of the
/// bug. It is not called for issues that end up skipped.
pub fn transform_issue_with<F>(
    issue: &SourceIssue,
    mappings: &Mappings,
    export: &ExportConfig,
    mut load_attachment: F,
) -> Result<Transform>
where
    F: FnMut(&AttachmentMeta) -> Result<Option<Vec<u8>>>,
{
    let product = resolve_version(mappings, issue);
    if let Some(version) = product.as_deref() {
        if mappings.skip_versions.contains(version) {
            return Ok(Transform::Skipped(SkipReason::SkippedVersion(
                version.to_string(),
            )));
        }
    }
    let product = product.unwrap_or_default();
    let component = resolve_component(mappings, &product, issue.component.as_deref());

    let created = parse_timestamp(&issue.created)
        .with_context(|| format!("invalid <created> on {}", issue.key))?;
    let updated = parse_timestamp(&issue.updated)
        .with_context(|| format!("invalid <updated> on {}", issue.key))?;

    let reporter = map_person(mappings, &issue.reporter);
    let assigned_to = issue
        .assignee
        .as_deref()
        .map(|username| map_person(mappings, username));

    let mut comments = Vec::with_capacity(issue.comments.len() + 1);
    comments.push(LongDesc {
        who: reporter.clone(),
        when: updated.format(SECOND_FORMAT).to_string(),
        text: issue.description.clone(),
    });
    for comment in &issue.comments {
        let created = parse_timestamp(&comment.created)
            .with_context(|| format!("invalid comment timestamp on {}", issue.key))?;
        comments.push(LongDesc {
            who: map_person(mappings, &comment.author.to_lowercase()),
            when: created.format(DATE_FORMAT).to_string(),
            text: comment.body.clone(),
        });
    }

    let mut attachments = Vec::with_capacity(issue.attachments.len());
    for meta in &issue.attachments {
        let Some(bytes) = load_attachment(meta)? else {
            warn!(
                key = %issue.key,
                attachment = %meta.id,
                file_name = %meta.file_name,
                "attachment file missing, leaving it out"
            );
            continue;
        };
        attachments.push(embed_attachment(mappings, &issue.key, meta, &bytes)?);
    }

    Ok(Transform::Bug(TargetBug {
        bug_id: issue.key.clone(),
        creation_ts: created.format(MINUTE_FORMAT).to_string(),
        short_desc: issue.title.clone(),
        delta_ts: updated.format(SECOND_FORMAT).to_string(),
        product,
        component,
        status: map_status(mappings, &issue.status_id),
        resolution: map_resolution(mappings, issue.resolution.as_deref()),
        reporter,
        assigned_to,
        priority: format!("P{}", issue.priority_id),
        severity: export.severity.clone(),
        comments,
        attachments,
    }))
}

/// Unmapped status codes become an empty status.
pub fn map_status(mappings: &Mappings, status_id: &str) -> String {
    mappings
        .statuses
        .get(status_id)
        .cloned()
        .unwrap_or_default()
}

/// `None` means the bug carries no resolution element at all.
pub fn map_resolution(mappings: &Mappings, resolution: Option<&str>) -> Option<String> {
    let raw = resolution.map(str::trim).filter(|value| !value.is_empty())?;
    mappings
        .resolutions
        .get(raw)
        .filter(|mapped| !mapped.is_empty())
        .cloned()
}

pub fn map_person(mappings: &Mappings, username: &str) -> Person {
    Person {
        name: lookup_with_default(&mappings.people_names, username),
        email: lookup_with_default(&mappings.people_emails, username),
    }
}

/// Fix-version wins over version; the result goes through the version table.
pub fn resolve_version(mappings: &Mappings, issue: &SourceIssue) -> Option<String> {
    let raw = issue
        .fix_version
        .as_deref()
        .or(issue.version.as_deref())?;
    Some(
        mappings
            .versions
            .get(raw)
            .cloned()
            .unwrap_or_else(|| raw.to_string()),
    )
}

pub fn resolve_component(mappings: &Mappings, version: &str, component: Option<&str>) -> String {
    let component = component.unwrap_or_default();
    mappings
        .components
        .get(&format!("{version}:{component}"))
        .cloned()
        .unwrap_or_else(|| component.to_string())
}

fn embed_attachment(
    mappings: &Mappings,
    key: &str,
    meta: &AttachmentMeta,
    bytes: &[u8],
) -> Result<TargetAttachment> {
    let created = parse_timestamp(&meta.created)
        .with_context(|| format!("invalid timestamp on attachment {} of {}", meta.id, key))?;

    Ok(TargetAttachment {
        id: meta.id.clone(),
        date: created.format(SECOND_FORMAT).to_string(),
        file_name: meta.file_name.clone(),
        description: meta.file_name.clone(),
        content_type: ATTACHMENT_CONTENT_TYPE.to_string(),
        attacher: map_person(mappings, &meta.author.to_lowercase()).email,
        data_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
    })
}

fn lookup_with_default(table: &HashMap<String, String>, username: &str) -> String {
    table
        .get(username)
        .or_else(|| table.get(DEFAULT_PERSON_KEY))
        .cloned()
        .unwrap_or_default()
}

fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>> {
    let trimmed = value.trim();
    DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .with_context(|| format!("unrecognised timestamp '{}'", trimmed))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use anyhow::anyhow;
    use base64::Engine;
    use jira2bz_config::{ExportConfig, Mappings};
    use jira2bz_domain::{AttachmentMeta, Comment, Person, SourceIssue};

    use super::{
        map_person, map_resolution, map_status, parse_timestamp, resolve_component,
        resolve_version, transform_issue_with, SkipReason, Transform,
    };

    fn mappings() -> Mappings {
        let mut mappings = Mappings::default();
        mappings.people_names = HashMap::from([
            ("john_doe".to_string(), "John Doe".to_string()),
            ("default".to_string(), "Migration Bot".to_string()),
        ]);
        mappings.people_emails = HashMap::from([
            ("john_doe".to_string(), "john.doe@example.com".to_string()),
            ("default".to_string(), "bot@example.com".to_string()),
        ]);
        mappings.versions =
            HashMap::from([("Example 1.0".to_string(), "Example".to_string())]);
        mappings.components = HashMap::from([(
            "Example:Component".to_string(),
            "Core Component".to_string(),
        )]);
        mappings.skip_versions = ["Example 2.0".to_string()].into_iter().collect();
        mappings
    }

    fn issue() -> SourceIssue {
        SourceIssue {
            id: "10070".to_string(),
            key: "BUG-7".to_string(),
            title: "[BUG-7] Crash when saving & closing".to_string(),
            description: "Steps: open <file>".to_string(),
            status_id: "5".to_string(),
            priority_id: "3".to_string(),
            resolution: Some("Fixed".to_string()),
            reporter: "john_doe".to_string(),
            assignee: Some("someone_else".to_string()),
            created: "Mon, 5 Jan 2009 10:22:33 -0500".to_string(),
            updated: "Tue, 6 Jan 2009 14:01:02 -0500".to_string(),
            version: Some("Example 2.0".to_string()),
            fix_version: Some("Example 1.0".to_string()),
            component: Some("Component".to_string()),
            comments: vec![Comment {
                author: "John_Doe".to_string(),
                created: "Mon, 5 Jan 2009 11:00:00 -0500".to_string(),
                body: "Reproduced.".to_string(),
            }],
            attachments: vec![
                AttachmentMeta {
                    id: "10042".to_string(),
                    file_name: "crash.log".to_string(),
                    author: "JOHN_DOE".to_string(),
                    created: "Mon, 5 Jan 2009 10:30:00 -0500".to_string(),
                },
                AttachmentMeta {
                    id: "10043".to_string(),
                    file_name: "lost.png".to_string(),
                    author: "john_doe".to_string(),
                    created: "Mon, 5 Jan 2009 10:31:00 -0500".to_string(),
                },
            ],
        }
    }

    fn transform(issue: &SourceIssue) -> Transform {
        transform_issue_with(issue, &mappings(), &ExportConfig::default(), |meta| {
            Ok((meta.id == "10042").then(|| b"log bytes\x00\xff".to_vec()))
        })
        .expect("transform")
    }

    #[test]
    fn maps_issue_into_bug() {
        let Transform::Bug(bug) = transform(&issue()) else {
            panic!("expected a bug");
        };

        assert_eq!(bug.bug_id, "BUG-7");
        assert_eq!(bug.short_desc, "[BUG-7] Crash when saving & closing");
        assert_eq!(bug.creation_ts, "2009-01-05 10:22");
        assert_eq!(bug.delta_ts, "2009-01-06 14:01:02");
        assert_eq!(bug.product, "Example");
        assert_eq!(bug.component, "Core Component");
        assert_eq!(bug.status, "RESOLVED");
        assert_eq!(bug.resolution.as_deref(), Some("FIXED"));
        assert_eq!(bug.priority, "P3");
        assert_eq!(bug.severity, "Sev2");
        assert_eq!(
            bug.reporter,
            Person {
                name: "John Doe".to_string(),
                email: "john.doe@example.com".to_string(),
            }
        );
    }

    #[test]
    fn description_becomes_first_comment_at_update_time() {
        let Transform::Bug(bug) = transform(&issue()) else {
            panic!("expected a bug");
        };

        assert_eq!(bug.comments.len(), 2);
        assert_eq!(bug.comments[0].text, "Steps: open <file>");
        assert_eq!(bug.comments[0].when, "2009-01-06 14:01:02");
        assert_eq!(bug.comments[0].who.email, "john.doe@example.com");
        assert_eq!(bug.comments[1].text, "Reproduced.");
        assert_eq!(bug.comments[1].when, "2009-01-05");
        assert_eq!(bug.comments[1].who.name, "John Doe");
    }

    #[test]
    fn missing_attachment_is_left_out() {
        let Transform::Bug(bug) = transform(&issue()) else {
            panic!("expected a bug");
        };

        assert_eq!(bug.attachments.len(), 1);
        let attachment = &bug.attachments[0];
        assert_eq!(attachment.id, "10042");
        assert_eq!(attachment.file_name, "crash.log");
        assert_eq!(attachment.description, "crash.log");
        assert_eq!(attachment.content_type, "application/octet-stream");
        assert_eq!(attachment.attacher, "john.doe@example.com");
        assert_eq!(attachment.date, "2009-01-05 10:30:00");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&attachment.data_base64)
            .expect("base64");
        assert_eq!(decoded, b"log bytes\x00\xff");
    }

    #[test]
    fn skip_listed_version_skips_without_loading_attachments() {
        let mut source = issue();
        source.fix_version = None;

        let result = transform_issue_with(&source, &mappings(), &ExportConfig::default(), |_| {
            Err(anyhow!("attachments must not be loaded"))
        })
        .expect("transform");

        assert_eq!(
            result,
            Transform::Skipped(SkipReason::SkippedVersion("Example 2.0".to_string()))
        );
    }

    #[test]
    fn fix_version_takes_priority_over_skipped_version() {
        let source = issue();
        assert_eq!(
            resolve_version(&mappings(), &source).as_deref(),
            Some("Example")
        );
        assert!(matches!(transform(&source), Transform::Bug(_)));
    }

    #[test]
    fn unmapped_version_and_component_pass_through() {
        let mut source = issue();
        source.fix_version = Some("Other 3.1".to_string());
        source.component = Some("Parser".to_string());

        let version = resolve_version(&mappings(), &source).expect("version");
        assert_eq!(version, "Other 3.1");
        assert_eq!(
            resolve_component(&mappings(), &version, source.component.as_deref()),
            "Parser"
        );
        assert_eq!(resolve_component(&mappings(), &version, None), "");
    }

    #[test]
    fn unknown_people_get_default_pair() {
        let person = map_person(&mappings(), "stranger");
        assert_eq!(person.name, "Migration Bot");
        assert_eq!(person.email, "bot@example.com");

        let Transform::Bug(bug) = transform(&issue()) else {
            panic!("expected a bug");
        };
        assert_eq!(bug.assigned_to.expect("assignee").email, "bot@example.com");
    }

    #[test]
    fn unassigned_issue_has_no_assignee() {
        let mut source = issue();
        source.assignee = None;
        let Transform::Bug(bug) = transform(&source) else {
            panic!("expected a bug");
        };
        assert_eq!(bug.assigned_to, None);
    }

    #[test]
    fn resolution_is_omitted_when_unknown_or_empty() {
        let mappings = mappings();
        assert_eq!(map_resolution(&mappings, None), None);
        assert_eq!(map_resolution(&mappings, Some("  ")), None);
        assert_eq!(map_resolution(&mappings, Some("Unresolved")), None);
        assert_eq!(map_resolution(&mappings, Some("Mystery")), None);
        assert_eq!(
            map_resolution(&mappings, Some("Won't Fix")).as_deref(),
            Some("WONTFIX")
        );
    }

    #[test]
    fn unmapped_status_is_empty() {
        let mappings = mappings();
        assert_eq!(map_status(&mappings, "4"), "REOPENED");
        assert_eq!(map_status(&mappings, "2"), "");
        assert_eq!(map_status(&mappings, "777"), "");
    }

    #[test]
    fn bad_timestamps_are_errors() {
        let mut source = issue();
        source.created = "yesterday".to_string();
        let error = transform_issue_with(&source, &mappings(), &ExportConfig::default(), |_| {
            Ok(None)
        })
        .expect_err("invalid timestamp");
        assert!(error.to_string().contains("<created>"));
    }

    #[test]
    fn accepts_rfc3339_timestamps() {
        let parsed = parse_timestamp("2009-01-05T10:22:33-05:00").expect("timestamp");
        assert_eq!(parsed.format("%Y-%m-%d %H:%M").to_string(), "2009-01-05 10:22");
    }
}

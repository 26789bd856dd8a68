//! Parser for the per-issue XML export (`jira.issueviews:issue-xml`).

use anyhow::{anyhow, Context, Result};
use jira2bz_domain::{AttachmentMeta, Comment, SourceIssue};
use roxmltree::{Document, Node, ParsingOptions};

const MISSING_ISSUE_MARKER: &str = "Could not find issue with issue key";
const UNASSIGNED_USERNAME: &str = "-1";

/// True when the body is JIRA's "issue not found" page rather than an export.
///
/// The marker only counts inside an `<h1>` heading, so an export whose text
/// quotes it is still an export.
pub fn is_missing_issue(body: &str) -> bool {
    match parse_document(body) {
        Ok(document) => {
            find_item(&document).is_err()
                && document
                    .descendants()
                    .filter(|node| node.has_tag_name("h1"))
                    .any(|node| text_of(node).contains(MISSING_ISSUE_MARKER))
        }
        // Error pages are HTML and need not be well-formed XML.
        Err(_) => heading_texts(body).any(|heading| heading.contains(MISSING_ISSUE_MARKER)),
    }
}

fn heading_texts(body: &str) -> impl Iterator<Item = &str> {
    body.split("<h1").skip(1).filter_map(|rest| {
        let (_, heading) = rest.split_once('>')?;
        heading.split("</h1>").next()
    })
}

pub fn parse_issue_export(body: &str) -> Result<SourceIssue> {
    let document = parse_document(body)?;
    let item = find_item(&document)?;

    let key_node = child(item, "key").ok_or_else(|| anyhow!("issue export has no <key>"))?;
    let key = non_empty(text_of(key_node)).ok_or_else(|| anyhow!("issue export has empty <key>"))?;
    let title = child_text(item, "title")
        .and_then(non_empty)
        .ok_or_else(|| anyhow!("issue {} has no <title>", key))?;

    Ok(SourceIssue {
        id: key_node.attribute("id").unwrap_or_default().to_string(),
        title,
        description: child_text(item, "description").unwrap_or_default(),
        status_id: child_attribute(item, "status", "id").unwrap_or_default(),
        priority_id: child_attribute(item, "priority", "id").unwrap_or_default(),
        resolution: child_text(item, "resolution").and_then(non_empty),
        reporter: child_attribute(item, "reporter", "username").unwrap_or_default(),
        assignee: child_attribute(item, "assignee", "username")
            .and_then(non_empty)
            .filter(|username| username != UNASSIGNED_USERNAME),
        created: child_text(item, "created")
            .and_then(non_empty)
            .ok_or_else(|| anyhow!("issue {} has no <created>", key))?,
        updated: child_text(item, "updated")
            .and_then(non_empty)
            .ok_or_else(|| anyhow!("issue {} has no <updated>", key))?,
        version: child_text(item, "version").and_then(non_empty),
        fix_version: child_text(item, "fixVersion").and_then(non_empty),
        component: child_text(item, "component").and_then(non_empty),
        comments: item
            .descendants()
            .filter(|node| node.has_tag_name("comment"))
            .map(into_comment)
            .collect(),
        attachments: collect_attachments(item),
        key,
    })
}

/// Reads only the attachment references, for the download stage.
pub fn parse_attachment_refs(body: &str) -> Result<Vec<AttachmentMeta>> {
    let document = parse_document(body)?;
    let item = find_item(&document)?;
    Ok(collect_attachments(item))
}

fn parse_document(body: &str) -> Result<Document<'_>> {
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;
    Document::parse_with_options(body, options).with_context(|| "invalid issue export XML")
}

fn find_item<'a, 'input>(document: &'a Document<'input>) -> Result<Node<'a, 'input>> {
    document
        .descendants()
        .find(|node| node.has_tag_name("item"))
        .ok_or_else(|| anyhow!("issue export has no <item>"))
}

fn collect_attachments(item: Node) -> Vec<AttachmentMeta> {
    item.descendants()
        .filter(|node| node.has_tag_name("attachment"))
        .filter_map(|node| {
            let id = node.attribute("id").map(str::trim).filter(|id| !id.is_empty())?;
            let file_name = node.attribute("name").filter(|name| !name.is_empty())?;
            Some(AttachmentMeta {
                id: id.to_string(),
                file_name: file_name.to_string(),
                author: node.attribute("author").unwrap_or_default().to_string(),
                created: node.attribute("created").unwrap_or_default().to_string(),
            })
        })
        .collect()
}

fn into_comment(node: Node) -> Comment {
    Comment {
        author: node.attribute("author").unwrap_or_default().to_string(),
        created: node.attribute("created").unwrap_or_default().to_string(),
        body: text_of(node),
    }
}

fn child<'a, 'input>(parent: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    parent
        .children()
        .find(|node| node.is_element() && node.has_tag_name(name))
}

fn child_text(parent: Node, name: &str) -> Option<String> {
    child(parent, name).map(text_of)
}

fn child_attribute(parent: Node, name: &str, attribute: &str) -> Option<String> {
    child(parent, name)
        .and_then(|node| node.attribute(attribute))
        .map(str::to_string)
}

fn text_of(node: Node) -> String {
    node.descendants()
        .filter(|descendant| descendant.is_text())
        .filter_map(|descendant| descendant.text())
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

use jira2bz_config::ExportConfig;
use jira2bz_domain::{LongDesc, Person, TargetAttachment, TargetBug};

/// Escapes `&`, `<` and `>` for use as XML element text.
///
/// Only ever apply this to raw text, never to markup built from it.
pub fn escape_xml_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Like [`escape_xml_text`], and also safe inside a double-quoted attribute.
pub fn escape_xml_attr(value: &str) -> String {
    escape_xml_text(value).replace('"', "&quot;")
}

pub fn render_document(bug: &TargetBug, export: &ExportConfig) -> String {
    let mut out = String::from("<?xml version='1.0' standalone='yes'?>\n");
    if export.dtd.is_empty() {
        out.push_str("<!DOCTYPE bugzilla>\n");
    } else {
        out.push_str(&format!("<!DOCTYPE bugzilla SYSTEM '{}'>\n", export.dtd));
    }
    out.push_str(&format!(
        "<bugzilla version=\"{}\" urlbase=\"{}\" maintainer=\"{}\" exporter=\"{}\">\n",
        escape_xml_attr(&export.version),
        escape_xml_attr(&export.urlbase),
        escape_xml_attr(&export.maintainer),
        escape_xml_attr(&export.exporter),
    ));
    out.push_str("  <bug>\n");

    let fields: [(&str, &str); 14] = [
        ("bug_id", bug.bug_id.as_str()),
        ("creation_ts", bug.creation_ts.as_str()),
        ("short_desc", bug.short_desc.as_str()),
        ("delta_ts", bug.delta_ts.as_str()),
        ("reporter_accessible", "1"),
        ("cclist_accessible", "1"),
        ("classification_id", "1"),
        ("classification", "Unclassified"),
        ("product", bug.product.as_str()),
        ("component", bug.component.as_str()),
        ("version", "unspecified"),
        ("rep_platform", "All"),
        ("op_sys", "All"),
        ("bug_status", bug.status.as_str()),
    ];
    for (name, value) in fields {
        push_element(&mut out, 4, name, value);
    }
    if let Some(resolution) = &bug.resolution {
        push_element(&mut out, 4, "resolution", resolution);
    }
    push_person(&mut out, 4, "reporter", &bug.reporter);
    if let Some(assignee) = &bug.assigned_to {
        push_person(&mut out, 4, "assigned_to", assignee);
    }
    push_element(&mut out, 4, "status_whiteboard", "N/A");
    push_element(&mut out, 4, "priority", &bug.priority);
    push_element(&mut out, 4, "bug_severity", &bug.severity);
    push_element(&mut out, 4, "target_milestone", "unspecified");
    push_element(&mut out, 4, "everconfirmed", "1");

    for comment in &bug.comments {
        push_long_desc(&mut out, comment);
    }
    for attachment in &bug.attachments {
        push_attachment(&mut out, attachment);
    }

    out.push_str("  </bug>\n");
    out.push_str("</bugzilla>\n");
    out
}

fn push_long_desc(out: &mut String, comment: &LongDesc) {
    out.push_str("    <long_desc isprivate=\"0\">\n");
    push_person(out, 6, "who", &comment.who);
    push_element(out, 6, "bug_when", &comment.when);
    push_element(out, 6, "thetext", &comment.text);
    out.push_str("    </long_desc>\n");
}

fn push_attachment(out: &mut String, attachment: &TargetAttachment) {
    out.push_str("    <attachment isobsolete=\"0\" ispatch=\"0\" isprivate=\"0\">\n");
    push_element(out, 6, "attachid", &attachment.id);
    push_element(out, 6, "date", &attachment.date);
    push_element(out, 6, "filename", &attachment.file_name);
    push_element(out, 6, "desc", &attachment.description);
    push_element(out, 6, "type", &attachment.content_type);
    push_element(out, 6, "attacher", &attachment.attacher);
    out.push_str(&format!(
        "      <data encoding=\"base64\">{}</data>\n",
        attachment.data_base64
    ));
    out.push_str("    </attachment>\n");
}

fn push_person(out: &mut String, indent: usize, name: &str, person: &Person) {
    out.push_str(&format!(
        "{:indent$}<{name} name=\"{}\">{}</{name}>\n",
        "",
        escape_xml_attr(&person.name),
        escape_xml_text(&person.email),
    ));
}

fn push_element(out: &mut String, indent: usize, name: &str, value: &str) {
    out.push_str(&format!(
        "{:indent$}<{name}>{}</{name}>\n",
        "",
        escape_xml_text(value)
    ));
}

use std::path::PathBuf;

use anyhow::Result;
use jira2bz_config::Jira2BzConfig;
use jira2bz_domain::issue_key;

/// Where each stage reads and writes its files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    project_key: String,
    raw_dir: PathBuf,
    attachments_dir: PathBuf,
    output_dir: PathBuf,
}

impl Layout {
    pub fn from_config(config: &Jira2BzConfig) -> Result<Self> {
        Ok(Self {
            project_key: config.project_key()?.to_string(),
            raw_dir: config.raw_dir(),
            attachments_dir: config.attachments_dir(),
            output_dir: config.output_dir(),
        })
    }

    pub fn key(&self, number: u32) -> String {
        issue_key(&self.project_key, number)
    }

    pub fn raw_dir(&self) -> &PathBuf {
        &self.raw_dir
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    pub fn raw_issue_path(&self, number: u32) -> PathBuf {
        self.raw_dir.join(format!("{}.xml", self.key(number)))
    }

    pub fn attachment_dir(&self, key: &str) -> PathBuf {
        self.attachments_dir.join(key)
    }

    pub fn attachment_path(&self, key: &str, id: &str, file_name: &str) -> PathBuf {
        self.attachment_dir(key)
            .join(format!("{}_{}", id, flatten_file_name(file_name)))
    }

    /// Transformed documents are zero padded so they sort by issue number.
    pub fn output_path(&self, number: u32) -> PathBuf {
        self.output_dir
            .join(format!("{}-{:04}.xml", self.project_key, number))
    }
}

// Attachment names come from the server; keep them inside the issue directory.
fn flatten_file_name(file_name: &str) -> String {
    file_name.replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::Layout;

    fn layout() -> Layout {
        Layout {
            project_key: "BUG".to_string(),
            raw_dir: PathBuf::from("work/jira"),
            attachments_dir: PathBuf::from("work/attachments"),
            output_dir: PathBuf::from("work/bugzilla"),
        }
    }

    #[test]
    fn names_raw_and_output_files() {
        let layout = layout();
        assert_eq!(layout.raw_issue_path(7), PathBuf::from("work/jira/BUG-7.xml"));
        assert_eq!(
            layout.output_path(7),
            PathBuf::from("work/bugzilla/BUG-0007.xml")
        );
        assert_eq!(
            layout.output_path(12345),
            PathBuf::from("work/bugzilla/BUG-12345.xml")
        );
    }

    #[test]
    fn places_attachments_per_issue() {
        let layout = layout();
        assert_eq!(
            layout.attachment_path("BUG-7", "10042", "crash.log"),
            PathBuf::from("work/attachments/BUG-7/10042_crash.log")
        );
    }

    #[test]
    fn flattens_path_separators_in_attachment_names() {
        let layout = layout();
        assert_eq!(
            layout.attachment_path("BUG-7", "1", "../etc/passwd"),
            PathBuf::from("work/attachments/BUG-7/1_.._etc_passwd")
        );
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceIssue {
    pub id: String,
    pub key: String,
    pub title: String,
    pub description: String,
    pub status_id: String,
    pub priority_id: String,
    pub resolution: Option<String>,
    pub reporter: String,
    pub assignee: Option<String>,
    pub created: String,
    pub updated: String,
    pub version: Option<String>,
    pub fix_version: Option<String>,
    pub component: Option<String>,
    pub comments: Vec<Comment>,
    pub attachments: Vec<AttachmentMeta>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comment {
    pub author: String,
    pub created: String,
    pub body: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentMeta {
    pub id: String,
    pub file_name: String,
    pub author: String,
    pub created: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    pub email: String,
}

/// A bug ready to be rendered into a Bugzilla import document.
///
/// Every text field holds the unescaped value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetBug {
    pub bug_id: String,
    pub creation_ts: String,
    pub short_desc: String,
    pub delta_ts: String,
    pub product: String,
    pub component: String,
    pub status: String,
    pub resolution: Option<String>,
    pub reporter: Person,
    pub assigned_to: Option<Person>,
    pub priority: String,
    pub severity: String,
    pub comments: Vec<LongDesc>,
    pub attachments: Vec<TargetAttachment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LongDesc {
    pub who: Person,
    pub when: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetAttachment {
    pub id: String,
    pub date: String,
    pub file_name: String,
    pub description: String,
    pub content_type: String,
    pub attacher: String,
    pub data_base64: String,
}

/// Largest range a single run accepts; [`IssueSelection::numbers`] materialises it.
pub const MAX_SELECTION_LEN: u64 = 100_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssueSelection {
    Range { first: u32, last: u32 },
    List(Vec<u32>),
}

impl IssueSelection {
    /// How many issues the selection names, computed without building the list.
    pub fn count(&self) -> u64 {
        match self {
            Self::Range { first, last } if first <= last => u64::from(*last - *first) + 1,
            Self::Range { .. } => 0,
            Self::List(values) => values.len() as u64,
        }
    }

    /// Issue numbers in ascending order, each at most once.
    pub fn numbers(&self) -> Vec<u32> {
        match self {
            Self::Range { first, last } => (*first..=*last).collect(),
            Self::List(values) => {
                let mut numbers = values.clone();
                numbers.sort_unstable();
                numbers.dedup();
                numbers
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Range { first, last } => format!("range={first}..={last}"),
            Self::List(values) => format!("ids={}", values.len()),
        }
    }
}

pub fn issue_key(project: &str, number: u32) -> String {
    format!("{project}-{number}")
}

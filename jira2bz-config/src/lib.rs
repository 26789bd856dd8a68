use std::{
    collections::{HashMap, HashSet},
    env, fs,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

pub const DEFAULT_PERSON_KEY: &str = "default";

const PASSWORD_ENV: &str = "JIRA2BZ_PASSWORD";
const DEFAULT_WORK_DIR: &str = ".";
const DEFAULT_RAW_DIR: &str = "jira";
const DEFAULT_ATTACHMENTS_DIR: &str = "attachments";
const DEFAULT_OUTPUT_DIR: &str = "bugzilla";
const DEFAULT_EXPORT_VERSION: &str = "3.2";
const DEFAULT_SEVERITY: &str = "Sev2";

const DEFAULT_STATUSES: [(&str, &str); 7] = [
    ("1", "NEW"),
    ("2", ""),
    ("3", "NEW"),
    ("4", "REOPENED"),
    ("5", "RESOLVED"),
    ("6", "CLOSED"),
    ("10000", "WAITING"),
];

const DEFAULT_RESOLUTIONS: [(&str, &str); 7] = [
    ("Fixed", "FIXED"),
    ("Unresolved", ""),
    ("Won't Fix", "WONTFIX"),
    ("Duplicate", "DUPLICATE"),
    ("Incomplete", "INVALID"),
    ("Cannot Reproduce", "WORKSFORME"),
    ("Not a bug", "INVALID"),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationConfig {
    pub project_key: Option<String>,
    pub first_issue: Option<u32>,
    pub last_issue: Option<u32>,
    pub work_dir: PathBuf,
    pub raw_dir: PathBuf,
    pub attachments_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// Values stamped on every generated Bugzilla document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportConfig {
    pub version: String,
    pub urlbase: String,
    pub maintainer: String,
    pub exporter: String,
    pub dtd: String,
    pub severity: String,
}

/// Lookup tables from JIRA values to Bugzilla values.
///
/// `people_names` and `people_emails` fall back to the entry keyed
/// [`DEFAULT_PERSON_KEY`]. `components` is keyed by `"<version>:<component>"`
/// where the version is the already mapped one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mappings {
    pub statuses: HashMap<String, String>,
    pub resolutions: HashMap<String, String>,
    pub people_names: HashMap<String, String>,
    pub people_emails: HashMap<String, String>,
    pub versions: HashMap<String, String>,
    pub components: HashMap<String, String>,
    pub skip_versions: HashSet<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Jira2BzConfig {
    pub jira_server: Option<String>,
    pub jira_user: Option<String>,
    pub jira_password: Option<String>,
    pub auth_method: Option<String>,
    pub insecure: bool,
    pub migration: MigrationConfig,
    pub export: ExportConfig,
    pub mappings: Mappings,
}

#[derive(Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    general: RawGeneral,
    #[serde(default)]
    migration: RawMigration,
    #[serde(default)]
    export: RawExport,
    #[serde(default)]
    mappings: RawMappings,
    jira_server: Option<String>,
    jira_user: Option<String>,
    jira_password: Option<String>,
    auth_method: Option<String>,
    insecure: Option<bool>,
}

#[derive(Default, Deserialize)]
struct RawGeneral {
    jira_server: Option<String>,
    jira_user: Option<String>,
    jira_password: Option<String>,
    auth_method: Option<String>,
    insecure: Option<bool>,
}

#[derive(Default, Deserialize)]
struct RawMigration {
    project_key: Option<String>,
    first_issue: Option<u32>,
    last_issue: Option<u32>,
    work_dir: Option<String>,
    raw_dir: Option<String>,
    attachments_dir: Option<String>,
    output_dir: Option<String>,
}

#[derive(Default, Deserialize)]
struct RawExport {
    version: Option<String>,
    urlbase: Option<String>,
    maintainer: Option<String>,
    exporter: Option<String>,
    dtd: Option<String>,
    severity: Option<String>,
}

#[derive(Default, Deserialize)]
struct RawMappings {
    statuses: Option<HashMap<String, String>>,
    resolutions: Option<HashMap<String, String>>,
    #[serde(default)]
    people_names: HashMap<String, String>,
    #[serde(default)]
    people_emails: HashMap<String, String>,
    #[serde(default)]
    versions: HashMap<String, String>,
    #[serde(default)]
    components: HashMap<String, String>,
    #[serde(default)]
    skip_versions: Vec<String>,
}

impl Jira2BzConfig {
    pub fn load_default() -> Result<Self> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let payload = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let raw: RawConfig =
            serde_yaml::from_str(&payload).with_context(|| "invalid YAML config format")?;
        Ok(Self::from_raw(raw))
    }

    pub fn auth_method(&self) -> &str {
        match self
            .auth_method
            .as_deref()
            .map(|value| value.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("bearer") => "bearer",
            _ => "basic",
        }
    }

    pub fn project_key(&self) -> Result<&str> {
        self.migration
            .project_key
            .as_deref()
            .ok_or_else(|| anyhow!("migration.project_key not configured"))
    }

    /// The configured issue range, used when no selection is given on the command line.
    pub fn issue_range(&self) -> Result<(u32, u32)> {
        let first = self
            .migration
            .first_issue
            .ok_or_else(|| anyhow!("migration.first_issue not configured"))?;
        let last = self
            .migration
            .last_issue
            .ok_or_else(|| anyhow!("migration.last_issue not configured"))?;
        if first > last {
            bail!(
                "migration.first_issue ({}) is greater than migration.last_issue ({})",
                first,
                last
            );
        }
        Ok((first, last))
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.migration.work_dir.join(&self.migration.raw_dir)
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.migration.work_dir.join(&self.migration.attachments_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.migration.work_dir.join(&self.migration.output_dir)
    }

    fn from_raw(raw: RawConfig) -> Self {
        let jira_server =
            first_some(raw.general.jira_server, raw.jira_server).and_then(normalize_jira_server);
        let jira_user = first_some(raw.general.jira_user, raw.jira_user).and_then(non_empty);
        let jira_password =
            resolve_jira_password(first_some(raw.general.jira_password, raw.jira_password));
        let auth_method = first_some(raw.general.auth_method, raw.auth_method).and_then(non_empty);
        let insecure = raw.general.insecure.or(raw.insecure).unwrap_or(false);

        Self {
            jira_server,
            jira_user,
            jira_password,
            auth_method,
            insecure,
            migration: migration_from_raw(raw.migration),
            export: export_from_raw(raw.export),
            mappings: mappings_from_raw(raw.mappings),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_EXPORT_VERSION.to_string(),
            urlbase: String::new(),
            maintainer: String::new(),
            exporter: String::new(),
            dtd: String::new(),
            severity: DEFAULT_SEVERITY.to_string(),
        }
    }
}

impl Default for Mappings {
    fn default() -> Self {
        Self {
            statuses: table(&DEFAULT_STATUSES),
            resolutions: table(&DEFAULT_RESOLUTIONS),
            people_names: HashMap::new(),
            people_emails: HashMap::new(),
            versions: HashMap::new(),
            components: HashMap::new(),
            skip_versions: HashSet::new(),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    if let Some(override_path) = env::var_os("JIRA2BZ_CONFIG_FILE") {
        return PathBuf::from(override_path);
    }

    let mut base = env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.push(".config");
    base.push("jira2bz");
    base.push("config.yaml");
    base
}

fn migration_from_raw(raw: RawMigration) -> MigrationConfig {
    let dir = |value: Option<String>, default: &str| {
        PathBuf::from(value.and_then(non_empty).unwrap_or_else(|| default.to_string()))
    };

    MigrationConfig {
        project_key: raw.project_key.and_then(non_empty),
        first_issue: raw.first_issue,
        last_issue: raw.last_issue,
        work_dir: dir(raw.work_dir, DEFAULT_WORK_DIR),
        raw_dir: dir(raw.raw_dir, DEFAULT_RAW_DIR),
        attachments_dir: dir(raw.attachments_dir, DEFAULT_ATTACHMENTS_DIR),
        output_dir: dir(raw.output_dir, DEFAULT_OUTPUT_DIR),
    }
}

fn export_from_raw(raw: RawExport) -> ExportConfig {
    let defaults = ExportConfig::default();
    ExportConfig {
        version: raw.version.and_then(non_empty).unwrap_or(defaults.version),
        urlbase: raw.urlbase.and_then(non_empty).unwrap_or(defaults.urlbase),
        maintainer: raw
            .maintainer
            .and_then(non_empty)
            .unwrap_or(defaults.maintainer),
        exporter: raw.exporter.and_then(non_empty).unwrap_or(defaults.exporter),
        dtd: raw
            .dtd
            .and_then(non_empty)
            .map(|dtd| percent_encode_quotes(&dtd))
            .unwrap_or(defaults.dtd),
        severity: raw.severity.and_then(non_empty).unwrap_or(defaults.severity),
    }
}

// The DTD reference ends up in an XML system literal, which cannot escape quotes.
fn percent_encode_quotes(uri: &str) -> String {
    uri.replace('\'', "%27").replace('"', "%22")
}

fn mappings_from_raw(raw: RawMappings) -> Mappings {
    let defaults = Mappings::default();
    Mappings {
        statuses: raw.statuses.unwrap_or(defaults.statuses),
        resolutions: raw.resolutions.unwrap_or(defaults.resolutions),
        people_names: raw.people_names,
        people_emails: raw.people_emails,
        versions: raw.versions,
        components: raw.components,
        skip_versions: raw.skip_versions.into_iter().collect(),
    }
}

fn table(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

fn normalize_jira_server(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Some(trimmed.trim_end_matches('/').to_string())
    } else {
        Some(format!("https://{}", trimmed.trim_end_matches('/')))
    }
}

fn first_some<T>(first: Option<T>, second: Option<T>) -> Option<T> {
    first.or(second)
}

fn resolve_jira_password(configured: Option<String>) -> Option<String> {
    if let Some(password) = env::var(PASSWORD_ENV).ok().and_then(non_empty) {
        return Some(password);
    }
    resolve_jira_password_with(configured?, fetch_secret)
}

fn resolve_jira_password_with<F>(value: String, fetch: F) -> Option<String>
where
    F: Fn(&str, &str) -> Option<String>,
{
    let password = non_empty(value)?;
    let Some((provider, key)) = parse_secret_reference(password.as_str()) else {
        return Some(password);
    };
    fetch(provider, key)
}

fn parse_secret_reference(value: &str) -> Option<(&str, &str)> {
    let (provider, key) = value.split_once("::")?;
    if key.trim().is_empty() {
        return None;
    }
    if matches!(provider, "pass" | "passage" | "env") {
        Some((provider, key.trim()))
    } else {
        None
    }
}

fn fetch_secret(provider: &str, key: &str) -> Option<String> {
    if provider == "env" {
        return env::var(key).ok().and_then(non_empty);
    }

    let output = Command::new(provider).arg("show").arg(key).output().ok()?;
    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    non_empty(stdout.trim().to_string())
}

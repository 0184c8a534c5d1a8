use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_INDENT: &str = "\t";
pub const DEFAULT_CALL: &str = "t.Skip";
pub const DEFAULT_PREFIX: &str = "✅ CONVERTED TO HCL";

/// Fixed parts of the inserted line: `{indent}{call}("{prefix}: {label}")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerStyle {
    pub indent: String,
    pub call: String,
    pub prefix: String,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT.to_string(),
            call: DEFAULT_CALL.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestTarget {
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTargets {
    pub path: String,
    pub tests: Vec<TestTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetTable {
    pub marker: MarkerStyle,
    pub files: Vec<FileTargets>,
}

impl TargetTable {
    pub fn pair_count(&self) -> usize {
        self.files.iter().map(|file| file.tests.len()).sum()
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTable {
    #[serde(default)]
    marker: Option<RawMarker>,
    #[serde(default)]
    files: Vec<RawFileTargets>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMarker {
    #[serde(default)]
    indent: Option<String>,
    #[serde(default)]
    call: Option<String>,
    #[serde(default)]
    prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFileTargets {
    path: String,
    #[serde(default)]
    tests: Vec<RawTestTarget>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTestTarget {
    name: String,
    #[serde(default)]
    label: String,
}

impl RawMarker {
    fn into_style(self) -> MarkerStyle {
        let defaults = MarkerStyle::default();
        MarkerStyle {
            indent: self.indent.unwrap_or(defaults.indent),
            call: self.call.unwrap_or(defaults.call),
            prefix: self.prefix.unwrap_or(defaults.prefix),
        }
    }
}

impl RawFileTargets {
    fn into_targets(self) -> Result<FileTargets, ConfigError> {
        let path = self.path.trim().to_string();
        if path.is_empty() {
            return Err(ConfigError::Invalid("file entry has an empty path".to_string()));
        }
        let mut tests = Vec::with_capacity(self.tests.len());
        for test in self.tests {
            let name = test.name.trim().to_string();
            if name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "test entry in `{path}` has an empty name"
                )));
            }
            tests.push(TestTarget {
                name,
                label: test.label,
            });
        }
        Ok(FileTargets { path, tests })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Yaml(err) => write!(f, "{err}"),
            Self::Invalid(message) => write!(f, "invalid table: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

pub fn load_table_file(path: &Path) -> Result<TargetTable, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_table(&content)
}

pub fn parse_table(content: &str) -> Result<TargetTable, ConfigError> {
    let raw: RawTable = serde_yaml::from_str(content)?;
    let mut files = Vec::with_capacity(raw.files.len());
    for file in raw.files {
        files.push(file.into_targets()?);
    }
    Ok(TargetTable {
        marker: raw.marker.map(RawMarker::into_style).unwrap_or_default(),
        files,
    })
}

pub fn resolve_target_path(root: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    }
}

type BuiltinEntry = (&'static str, &'static [(&'static str, &'static str)]);

const BUILTIN_TARGETS: &[BuiltinEntry] = &[
    (
        "test/integration/jobs_test.go",
        &[
            ("TestPruneJobIntegration", "test/tftest/jobs/prune_job.tftest.hcl"),
            ("TestPruneJobWithFilters", "test/tftest/jobs/prune_job.tftest.hcl (merged)"),
            ("TestSyncJobIntegration", "test/tftest/jobs/sync_job.tftest.hcl"),
            ("TestSyncJobWithGroupFilter", "test/tftest/jobs/sync_job.tftest.hcl (merged)"),
            ("TestVerifyJobIntegration", "test/tftest/jobs/verify_job.tftest.hcl"),
        ],
    ),
    (
        "test/integration/remotes_test.go",
        &[
            ("TestRemotesIntegration", "test/tftest/remotes/remote.tftest.hcl"),
            ("TestRemotePasswordUpdate", "test/tftest/remotes/remote.tftest.hcl (merged)"),
            ("TestRemoteValidation", "removed as redundant"),
            ("TestRemoteImport", "covered by HCL tests"),
        ],
    ),
    (
        "test/integration/datasources_test.go",
        &[
            ("TestDatastoreDataSourceIntegration", "test/tftest/datasources/datastore.tftest.hcl"),
            ("TestSyncJobsDataSourceIntegration", "test/tftest/datasources/sync_jobs.tftest.hcl"),
            ("TestVerifyJobDataSourceIntegration", "test/tftest/datasources/verify_job.tftest.hcl"),
            ("TestVerifyJobsDataSourceIntegration", "test/tftest/datasources/verify_jobs.tftest.hcl"),
            ("TestS3EndpointDataSourceIntegration", "test/tftest/datasources/s3_endpoint.tftest.hcl"),
            ("TestS3EndpointsDataSourceIntegration", "test/tftest/datasources/s3_endpoints.tftest.hcl"),
            ("TestMetricsServerDataSourceIntegration", "test/tftest/datasources/metrics_server.tftest.hcl"),
            ("TestMetricsServersDataSourceIntegration", "test/tftest/datasources/metrics_servers.tftest.hcl"),
        ],
    ),
    (
        "test/integration/metrics_test.go",
        &[
            ("TestMetricsServerInfluxDBHTTPIntegration", "test/tftest/metrics/influxdb_http.tftest.hcl"),
            ("TestMetricsServerInfluxDBUDPIntegration", "test/tftest/metrics/influxdb_udp.tftest.hcl"),
            ("TestMetricsServerMTU", "test/tftest/metrics/influxdb_udp.tftest.hcl (merged)"),
            ("TestMetricsServerDisabled", "test/tftest/metrics/influxdb_udp.tftest.hcl (merged)"),
            ("TestMetricsServerTypeChange", "covered by other tests"),
        ],
    ),
    (
        "test/integration/notifications_test.go",
        &[
            ("TestSMTPNotificationIntegration", "test/tftest/notifications/smtp.tftest.hcl"),
            ("TestGotifyNotificationIntegration", "test/tftest/notifications/endpoints_and_matcher.tftest.hcl"),
            ("TestSendmailNotificationIntegration", "test/tftest/notifications/endpoints_and_matcher.tftest.hcl"),
            ("TestWebhookNotificationIntegration", "test/tftest/notifications/endpoints_and_matcher.tftest.hcl"),
            ("TestNotificationMatcherIntegration", "test/tftest/notifications/endpoints_and_matcher.tftest.hcl"),
            ("TestNotificationMatcherModes", "test/tftest/notifications/endpoints_and_matcher.tftest.hcl (merged)"),
            ("TestNotificationMatcherWithCalendar", "test/tftest/notifications/endpoints_and_matcher.tftest.hcl (merged)"),
            ("TestNotificationMatcherInvertMatch", "test/tftest/notifications/endpoints_and_matcher.tftest.hcl (merged)"),
            ("TestNotificationEndpointDataSourceIntegration", "test/tftest/datasources/notification_endpoint.tftest.hcl"),
            ("TestNotificationEndpointsDataSourceIntegration", "test/tftest/datasources/notification_endpoints.tftest.hcl"),
            ("TestNotificationMatcherDataSourceIntegration", "test/tftest/datasources/notification_matcher.tftest.hcl"),
            ("TestNotificationMatchersDataSourceIntegration", "test/tftest/datasources/notification_matchers.tftest.hcl"),
        ],
    ),
];

/// Go integration tests superseded by `*.tftest.hcl` suites.
pub fn builtin_table() -> TargetTable {
    let files = BUILTIN_TARGETS
        .iter()
        .map(|(path, tests)| FileTargets {
            path: (*path).to_string(),
            tests: tests
                .iter()
                .map(|(name, label)| TestTarget {
                    name: (*name).to_string(),
                    label: (*label).to_string(),
                })
                .collect(),
        })
        .collect();
    TargetTable {
        marker: MarkerStyle::default(),
        files,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, DEFAULT_PREFIX, builtin_table, load_table_file, parse_table,
        resolve_target_path,
    };
    use std::path::Path;

    #[test]
    fn builtin_table_keeps_declared_order() {
        let table = builtin_table();
        assert_eq!(table.files.len(), 5);
        assert_eq!(table.pair_count(), 34);
        assert_eq!(table.files[0].path, "test/integration/jobs_test.go");
        assert_eq!(table.files[0].tests[0].name, "TestPruneJobIntegration");
        assert_eq!(
            table.files[0].tests[0].label,
            "test/tftest/jobs/prune_job.tftest.hcl"
        );
        assert_eq!(table.files[4].path, "test/integration/notifications_test.go");
        assert_eq!(table.marker.prefix, DEFAULT_PREFIX);
    }

    #[test]
    fn parses_yaml_table_with_marker_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("table.yml");
        std::fs::write(
            &path,
            r#"marker:
  prefix: "SUPERSEDED"
files:
  - path: pkg/b_test.go
    tests:
      - name: TestZeta
        label: zeta.hcl
      - name: TestAlpha
        label: removed as redundant
  - path: pkg/a_test.go
    tests:
      - name: TestOnly
"#,
        )
        .expect("write table");

        let table = load_table_file(&path).expect("parse table");
        assert_eq!(table.marker.prefix, "SUPERSEDED");
        assert_eq!(table.marker.indent, "\t");
        assert_eq!(table.marker.call, "t.Skip");
        assert_eq!(table.files.len(), 2);
        assert_eq!(table.files[0].path, "pkg/b_test.go");
        assert_eq!(table.files[0].tests[0].name, "TestZeta");
        assert_eq!(table.files[0].tests[1].label, "removed as redundant");
        assert_eq!(table.files[1].tests[0].label, "");
    }

    #[test]
    fn rejects_empty_test_names_and_unknown_fields() {
        let err = parse_table(
            r#"files:
  - path: a_test.go
    tests:
      - name: "  "
        label: x
"#,
        )
        .expect_err("empty name");
        assert!(matches!(err, ConfigError::Invalid(_)), "got {err:?}");

        let err = parse_table("files: []\nextra: true\n").expect_err("unknown field");
        assert!(matches!(err, ConfigError::Yaml(_)), "got {err:?}");
    }

    #[test]
    fn yaml_rendering_parses_back_to_the_same_table() {
        let table = builtin_table();
        let rendered = table.to_yaml().expect("render yaml");
        let parsed = parse_table(&rendered).expect("parse rendered");
        assert_eq!(parsed, table);
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        let root = Path::new("/work/repo");
        assert_eq!(
            resolve_target_path(root, "test/integration/jobs_test.go"),
            Path::new("/work/repo/test/integration/jobs_test.go")
        );
        assert_eq!(
            resolve_target_path(root, "/abs/x_test.go"),
            Path::new("/abs/x_test.go")
        );
    }
}

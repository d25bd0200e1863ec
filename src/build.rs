//! 构建执行记录 - 宿主 CI 系统的抽象
//!
//! `BuildContext` 是通知核心读取构建信息的唯一入口。每种宿主集成实现一次，
//! 在构造时选定，不做运行时类型探测。`BuildSnapshot` 是基于 JSON 快照的实现，
//! 供 CLI 和测试使用。

use crate::error::ScmError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 构建结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    Success,
    Unstable,
    Failure,
    NotBuilt,
    Aborted,
    #[serde(other)]
    Unknown,
}

impl BuildResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildResult::Success => "SUCCESS",
            BuildResult::Unstable => "UNSTABLE",
            BuildResult::Failure => "FAILURE",
            BuildResult::NotBuilt => "NOT_BUILT",
            BuildResult::Aborted => "ABORTED",
            BuildResult::Unknown => "UNKNOWN",
        }
    }

    /// Failure 或 Unstable（需要追责的结果）
    pub fn is_worse_than_success(&self) -> bool {
        matches!(self, BuildResult::Failure | BuildResult::Unstable)
    }
}

impl std::fmt::Display for BuildResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 构建类型
///
/// Freestyle 构建在 pre-build 阶段发出开始通知，Pipeline 构建在主阶段发出。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildKind {
    #[default]
    Freestyle,
    Pipeline,
}

/// 历史构建的精简记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecord {
    pub number: u64,
    #[serde(default)]
    pub result: Option<BuildResult>,
    pub start_time_millis: i64,
    #[serde(default)]
    pub duration_millis: i64,
}

impl BuildRecord {
    pub fn new(number: u64, result: Option<BuildResult>, start_time_millis: i64, duration_millis: i64) -> Self {
        Self {
            number,
            result,
            start_time_millis,
            duration_millis,
        }
    }

    pub fn end_time_millis(&self) -> i64 {
        self.start_time_millis + self.duration_millis
    }
}

/// 单条变更记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub author: String,
    /// `None` 表示该 SCM 不支持列出受影响文件
    #[serde(default)]
    pub affected_files: Option<Vec<String>>,
}

/// 受影响文件查询结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AffectedFiles<'a> {
    Listed(&'a [String]),
    Unsupported,
}

impl ChangeEntry {
    pub fn new(author: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            author: author.into(),
            affected_files: Some(files),
        }
    }

    pub fn affected_files(&self) -> AffectedFiles<'_> {
        match &self.affected_files {
            Some(files) => AffectedFiles::Listed(files),
            None => AffectedFiles::Unsupported,
        }
    }
}

/// 测试结果统计
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub total: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub skipped: u64,
}

impl TestSummary {
    pub fn passed(&self) -> u64 {
        self.total.saturating_sub(self.failed.saturating_add(self.skipped))
    }
}

/// Change request 对象元数据（PR 链接与标题）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub url: String,
    #[serde(default)]
    pub display_name: String,
}

/// Change request 贡献者元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributorMetadata {
    #[serde(default)]
    pub contributor: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// 构建来源为 change request（PR / MR）时的元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    /// 如 "Pull Request"、"Merge Request"
    #[serde(default)]
    pub pronoun: Option<String>,
    #[serde(default)]
    pub object: Option<ObjectMetadata>,
    #[serde(default)]
    pub contributor: Option<ContributorMetadata>,
}

/// 宿主 CI 系统提供的构建信息
pub trait BuildContext {
    fn job_display_name(&self) -> &str;
    fn number(&self) -> u64;
    fn kind(&self) -> BuildKind;
    /// 当前结果；pipeline 运行中可能尚未设置
    fn result(&self) -> Option<BuildResult>;
    fn start_time_millis(&self) -> i64;
    /// 尚未结束时为 0
    fn duration_millis(&self) -> i64;

    fn previous_build(&self) -> Option<BuildRecord>;
    /// 最近一个结果不是 Failure 的历史构建
    fn previous_not_failed_build(&self) -> Option<BuildRecord>;
    /// 编号 `number` 之后的下一个构建（可能是当前构建）
    fn next_build(&self, number: u64) -> Option<BuildRecord>;
    fn first_build(&self) -> Option<BuildRecord>;

    /// 触发原因的简短描述
    fn causes(&self) -> Vec<String>;
    fn culprits(&self) -> Result<Vec<String>, ScmError>;
    fn change_entries(&self) -> Result<Vec<ChangeEntry>, ScmError>;
    fn test_summary(&self) -> Option<TestSummary>;
    fn change_request(&self) -> Option<ChangeRequest>;

    fn build_url(&self) -> String;
    /// 构建环境变量（用于展开 webhook URL 和宏）
    fn environment(&self) -> HashMap<String, String>;
    /// 构建根目录（宏展开的工作目录）
    fn root_dir(&self) -> PathBuf;

    fn record(&self) -> BuildRecord {
        BuildRecord::new(
            self.number(),
            self.result(),
            self.start_time_millis(),
            self.duration_millis(),
        )
    }
}

/// JSON 构建快照
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSnapshot {
    pub job_display_name: String,
    pub number: u64,
    #[serde(default)]
    pub kind: BuildKind,
    #[serde(default)]
    pub result: Option<BuildResult>,
    pub start_time_millis: i64,
    #[serde(default)]
    pub duration_millis: i64,
    /// 同一 job 的更早构建
    #[serde(default)]
    pub history: Vec<BuildRecord>,
    #[serde(default)]
    pub causes: Vec<String>,
    #[serde(default)]
    pub culprits: Vec<String>,
    #[serde(default)]
    pub change_entries: Vec<ChangeEntry>,
    #[serde(default)]
    pub test_summary: Option<TestSummary>,
    #[serde(default)]
    pub change_request: Option<ChangeRequest>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub root_dir: PathBuf,
}

impl BuildSnapshot {
    pub fn new(job_display_name: impl Into<String>, number: u64, start_time_millis: i64) -> Self {
        Self {
            job_display_name: job_display_name.into(),
            number,
            start_time_millis,
            ..Default::default()
        }
    }

    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read build snapshot {}", path.display()))?;
        let snapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse build snapshot {}", path.display()))?;
        Ok(snapshot)
    }

    /// 历史构建 + 当前构建，按编号排序
    fn all_builds(&self) -> Vec<BuildRecord> {
        let mut builds: Vec<BuildRecord> = self
            .history
            .iter()
            .filter(|b| b.number < self.number)
            .cloned()
            .collect();
        builds.push(self.record());
        builds.sort_by_key(|b| b.number);
        builds
    }
}

impl BuildContext for BuildSnapshot {
    fn job_display_name(&self) -> &str {
        &self.job_display_name
    }

    fn number(&self) -> u64 {
        self.number
    }

    fn kind(&self) -> BuildKind {
        self.kind
    }

    fn result(&self) -> Option<BuildResult> {
        self.result
    }

    fn start_time_millis(&self) -> i64 {
        self.start_time_millis
    }

    fn duration_millis(&self) -> i64 {
        self.duration_millis
    }

    fn previous_build(&self) -> Option<BuildRecord> {
        self.history
            .iter()
            .filter(|b| b.number < self.number)
            .max_by_key(|b| b.number)
            .cloned()
    }

    fn previous_not_failed_build(&self) -> Option<BuildRecord> {
        let mut earlier: Vec<&BuildRecord> =
            self.history.iter().filter(|b| b.number < self.number).collect();
        earlier.sort_by_key(|b| std::cmp::Reverse(b.number));
        earlier
            .into_iter()
            .find(|b| b.result != Some(BuildResult::Failure))
            .cloned()
    }

    fn next_build(&self, number: u64) -> Option<BuildRecord> {
        self.all_builds().into_iter().find(|b| b.number > number)
    }

    fn first_build(&self) -> Option<BuildRecord> {
        self.all_builds().into_iter().next()
    }

    fn causes(&self) -> Vec<String> {
        self.causes.clone()
    }

    fn culprits(&self) -> Result<Vec<String>, ScmError> {
        Ok(self.culprits.clone())
    }

    fn change_entries(&self) -> Result<Vec<ChangeEntry>, ScmError> {
        Ok(self.change_entries.clone())
    }

    fn test_summary(&self) -> Option<TestSummary> {
        self.test_summary
    }

    fn change_request(&self) -> Option<ChangeRequest> {
        self.change_request.clone()
    }

    fn build_url(&self) -> String {
        self.url.clone()
    }

    fn environment(&self) -> HashMap<String, String> {
        self.environment.clone()
    }

    fn root_dir(&self) -> PathBuf {
        self.root_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_history(history: Vec<BuildRecord>) -> BuildSnapshot {
        BuildSnapshot {
            history,
            result: Some(BuildResult::Failure),
            ..BuildSnapshot::new("api", 5, 5_000)
        }
    }

    #[test]
    fn test_previous_build_is_highest_earlier_number() {
        let snapshot = snapshot_with_history(vec![
            BuildRecord::new(3, Some(BuildResult::Success), 3_000, 10),
            BuildRecord::new(4, Some(BuildResult::Failure), 4_000, 10),
        ]);
        assert_eq!(snapshot.previous_build().map(|b| b.number), Some(4));
    }

    #[test]
    fn test_previous_not_failed_build_skips_failures() {
        let snapshot = snapshot_with_history(vec![
            BuildRecord::new(2, Some(BuildResult::Unstable), 2_000, 10),
            BuildRecord::new(3, Some(BuildResult::Failure), 3_000, 10),
            BuildRecord::new(4, Some(BuildResult::Failure), 4_000, 10),
        ]);
        assert_eq!(snapshot.previous_not_failed_build().map(|b| b.number), Some(2));
        assert_eq!(snapshot.next_build(2).map(|b| b.number), Some(3));
    }

    #[test]
    fn test_next_build_can_be_current() {
        let snapshot = snapshot_with_history(vec![BuildRecord::new(
            4,
            Some(BuildResult::Success),
            4_000,
            10,
        )]);
        let next = snapshot.next_build(4).unwrap();
        assert_eq!(next.number, 5);
        assert_eq!(next.result, Some(BuildResult::Failure));
    }

    #[test]
    fn test_first_build_without_history_is_current() {
        let snapshot = snapshot_with_history(vec![]);
        assert_eq!(snapshot.first_build().map(|b| b.number), Some(5));
        assert!(snapshot.previous_build().is_none());
    }

    #[test]
    fn test_unknown_result_deserializes() {
        let result: BuildResult = serde_json::from_str("\"CYCLE\"").unwrap();
        assert_eq!(result, BuildResult::Unknown);
        let result: BuildResult = serde_json::from_str("\"NOT_BUILT\"").unwrap();
        assert_eq!(result, BuildResult::NotBuilt);
    }

    #[test]
    fn test_affected_files_unsupported() {
        let entry = ChangeEntry {
            author: "alice".to_string(),
            affected_files: None,
        };
        assert_eq!(entry.affected_files(), AffectedFiles::Unsupported);
    }

    #[test]
    fn test_snapshot_parses_camel_case() {
        let json = serde_json::json!({
            "jobDisplayName": "api",
            "number": 12,
            "kind": "pipeline",
            "result": "SUCCESS",
            "startTimeMillis": 1000,
            "durationMillis": 250,
            "history": [{"number": 11, "result": "FAILURE", "startTimeMillis": 500}],
            "testSummary": {"total": 10, "failed": 2, "skipped": 1}
        });
        let snapshot: BuildSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(snapshot.kind, BuildKind::Pipeline);
        assert_eq!(snapshot.previous_build().unwrap().result, Some(BuildResult::Failure));
        assert_eq!(snapshot.test_summary.unwrap().passed(), 7);
    }

    #[test]
    fn test_passed_tests_with_oversized_counts() {
        let summary = TestSummary {
            total: 10,
            failed: u64::MAX,
            skipped: 5,
        };
        assert_eq!(summary.passed(), 0);
    }
}

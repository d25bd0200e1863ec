//! Facts 构建器 - 按顺序收集一次构建通知的描述信息
//!
//! 插入顺序即卡片上的展示顺序，同名 fact 可以共存，不做合并。

use super::card::Fact;
use crate::build::{BuildContext, BuildResult};
use chrono::DateTime;
use std::collections::BTreeSet;

pub const NAME_STATUS: &str = "Status";
pub const NAME_START_TIME: &str = "Start Time";
pub const NAME_COMPLETION_TIME: &str = "Completion Time";
pub const NAME_TOTAL_TESTS: &str = "Total Tests";
pub const NAME_PASSED_TESTS: &str = "Total Passed Tests";
pub const NAME_FAILED_TESTS: &str = "Total Failed Tests";
pub const NAME_SKIPPED_TESTS: &str = "Total Skipped Tests";
pub const NAME_REMARKS: &str = "Remarks";
pub const NAME_CULPRITS: &str = "Culprits";
pub const NAME_DEVELOPERS: &str = "Developers";
pub const NAME_FILES_CHANGED: &str = "Number of files changed";
pub const NAME_BACK_TO_NORMAL_TIME: &str = "Back To Normal Time";
pub const NAME_FAILING_SINCE_BUILD: &str = "Failing since build";
pub const NAME_FAILING_SINCE_TIME: &str = "Failing since time";

pub const STATUS_STARTED: &str = "Build Started";
pub const STATUS_RUNNING: &str = "Running";

/// Facts 构建器（单一所有者，按 `&mut` 传递）
#[derive(Debug, Default, Clone)]
pub struct FactsBuilder {
    facts: Vec<Fact>,
}

impl FactsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_status_started(&mut self) -> &mut Self {
        self.add_status(STATUS_STARTED)
    }

    pub fn add_status_running(&mut self) -> &mut Self {
        self.add_status(STATUS_RUNNING)
    }

    pub fn add_status(&mut self, value: impl Into<String>) -> &mut Self {
        self.add_fact(NAME_STATUS, value)
    }

    pub fn add_start_time(&mut self, build: &dyn BuildContext) -> &mut Self {
        self.add_fact(NAME_START_TIME, format_timestamp(build.start_time_millis()))
    }

    pub fn add_completion_time(&mut self, build: &dyn BuildContext) -> &mut Self {
        let completed = build.start_time_millis() + build.duration_millis();
        self.add_fact(NAME_COMPLETION_TIME, format_timestamp(completed))
    }

    /// 没有测试结果时不添加
    pub fn add_tests(&mut self, build: &dyn BuildContext) -> &mut Self {
        if let Some(tests) = build.test_summary() {
            self.add_fact(NAME_TOTAL_TESTS, tests.total.to_string());
            self.add_fact(NAME_PASSED_TESTS, tests.passed().to_string());
            self.add_fact(NAME_FAILED_TESTS, tests.failed.to_string());
            self.add_fact(NAME_SKIPPED_TESTS, tests.skipped.to_string());
        }
        self
    }

    /// 每个不同的触发原因一条
    pub fn add_remarks(&mut self, causes: &[String]) -> &mut Self {
        let mut seen = BTreeSet::new();
        for cause in causes {
            let cause = cause.trim();
            if !cause.is_empty() && seen.insert(cause) {
                self.add_fact(NAME_REMARKS, cause);
            }
        }
        self
    }

    /// 只在 Failure / Unstable 时追责
    pub fn add_culprits(&mut self, result: Option<BuildResult>, users: &[String]) -> &mut Self {
        let blame = result.map(|r| r.is_worse_than_success()).unwrap_or(false);
        if blame {
            if let Some(joined) = join_names(users) {
                self.add_fact(NAME_CULPRITS, joined);
            }
        }
        self
    }

    pub fn add_developers(&mut self, authors: &[String]) -> &mut Self {
        if let Some(joined) = join_names(authors) {
            self.add_fact(NAME_DEVELOPERS, joined);
        }
        self
    }

    pub fn add_number_of_files_changed(&mut self, files: &BTreeSet<String>) -> &mut Self {
        self.add_fact(NAME_FILES_CHANGED, files.len().to_string())
    }

    pub fn add_back_to_normal_time(&mut self, duration_millis: i64) -> &mut Self {
        self.add_fact(NAME_BACK_TO_NORMAL_TIME, format_duration(duration_millis))
    }

    pub fn add_failing_since_build(&mut self, number: u64) -> &mut Self {
        self.add_fact(NAME_FAILING_SINCE_BUILD, format!("#{}", number))
    }

    pub fn add_failing_since_time(&mut self, millis: i64) -> &mut Self {
        self.add_fact(NAME_FAILING_SINCE_TIME, format_timestamp(millis))
    }

    pub fn add_fact(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.push(Fact::new(name, value))
    }

    pub fn push(&mut self, fact: Fact) -> &mut Self {
        self.facts.push(fact);
        self
    }

    /// 返回已收集的 facts（不清空构建器）
    pub fn collect(&self) -> Vec<Fact> {
        self.facts.clone()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// 去重、排序后用逗号连接；空列表返回 None
fn join_names(names: &[String]) -> Option<String> {
    let unique: BTreeSet<&str> = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();
    if unique.is_empty() {
        None
    } else {
        Some(unique.into_iter().collect::<Vec<_>>().join(", "))
    }
}

/// 毫秒时间戳 -> `2024-01-02 03:04:05 UTC`
pub fn format_timestamp(millis: i64) -> String {
    match DateTime::from_timestamp_millis(millis) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => millis.to_string(),
    }
}

/// 毫秒时长 -> `1 hr 2 min` / `4 min 5 sec` / `3.2 sec` / `250 ms`
pub fn format_duration(millis: i64) -> String {
    let millis = millis.max(0);
    let total_secs = millis / 1000;
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    if days > 0 {
        format!("{} day {} hr", days, hours)
    } else if hours > 0 {
        format!("{} hr {} min", hours, minutes)
    } else if minutes > 0 {
        format!("{} min {} sec", minutes, seconds)
    } else if seconds >= 10 {
        format!("{} sec", seconds)
    } else if seconds >= 1 {
        format!("{:.1} sec", millis as f64 / 1000.0)
    } else {
        format!("{} ms", millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BuildSnapshot, TestSummary};

    #[test]
    fn test_insertion_order_preserved() {
        let mut facts = FactsBuilder::new();
        facts
            .add_status("Build Failed")
            .add_fact("Developers", "alice")
            .add_fact("Developers", "bob");

        let collected = facts.collect();
        let names: Vec<&str> = collected.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Status", "Developers", "Developers"]);
        assert_eq!(collected[2].value, "bob");
    }

    #[test]
    fn test_collect_is_not_destructive() {
        let mut facts = FactsBuilder::new();
        facts.add_status_running();
        assert_eq!(facts.collect(), facts.collect());
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn test_remarks_deduplicated() {
        let mut facts = FactsBuilder::new();
        facts.add_remarks(&[
            "Started by user admin".to_string(),
            "Started by timer".to_string(),
            "Started by user admin".to_string(),
        ]);
        let values: Vec<String> = facts.collect().into_iter().map(|f| f.value).collect();
        assert_eq!(values, vec!["Started by user admin", "Started by timer"]);
    }

    #[test]
    fn test_culprits_not_blamed_on_success() {
        let users = vec!["bob".to_string(), "alice".to_string(), "bob".to_string()];

        let mut facts = FactsBuilder::new();
        facts.add_culprits(Some(BuildResult::Success), &users);
        facts.add_culprits(None, &users);
        assert!(facts.is_empty());

        facts.add_culprits(Some(BuildResult::Unstable), &users);
        assert_eq!(facts.collect()[0], Fact::new(NAME_CULPRITS, "alice, bob"));
    }

    #[test]
    fn test_tests_omitted_without_summary() {
        let mut build = BuildSnapshot::new("api", 1, 0);
        let mut facts = FactsBuilder::new();
        facts.add_tests(&build);
        assert!(facts.is_empty());

        build.test_summary = Some(TestSummary {
            total: 12,
            failed: 2,
            skipped: 1,
        });
        facts.add_tests(&build);
        let collected = facts.collect();
        assert_eq!(collected.len(), 4);
        assert_eq!(collected[1], Fact::new(NAME_PASSED_TESTS, "9"));
    }

    #[test]
    fn test_completion_time_is_start_plus_duration() {
        let mut build = BuildSnapshot::new("api", 1, 1_700_000_000_000);
        build.duration_millis = 61_000;
        let mut facts = FactsBuilder::new();
        facts.add_start_time(&build).add_completion_time(&build);
        let collected = facts.collect();
        assert_eq!(collected[0].value, "2023-11-14 22:13:20 UTC");
        assert_eq!(collected[1].value, "2023-11-14 22:14:21 UTC");
    }

    #[test]
    fn test_failing_since_build_format() {
        let mut facts = FactsBuilder::new();
        facts.add_failing_since_build(10);
        assert_eq!(facts.collect()[0], Fact::new(NAME_FAILING_SINCE_BUILD, "#10"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(250), "250 ms");
        assert_eq!(format_duration(3_200), "3.2 sec");
        assert_eq!(format_duration(42_000), "42 sec");
        assert_eq!(format_duration(245_000), "4 min 5 sec");
        assert_eq!(format_duration(3_720_000), "1 hr 2 min");
        assert_eq!(format_duration(90_000_000), "1 day 1 hr");
        assert_eq!(format_duration(-5), "0 ms");
    }
}

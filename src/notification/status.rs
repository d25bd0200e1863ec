//! 构建状态分类 - 结合历史记录判断当前构建的状态标签和卡片颜色

use super::card::{COLOR_FAILURE, COLOR_OTHER, COLOR_SUCCESS};
use super::facts::FactsBuilder;
use crate::build::{BuildContext, BuildRecord, BuildResult};

/// 卡片主题色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeColor {
    Green,
    Red,
    Amber,
}

impl ThemeColor {
    /// 只由当前结果决定，与派生出的状态标签无关
    pub fn for_result(result: BuildResult) -> Self {
        match result {
            BuildResult::Success => ThemeColor::Green,
            BuildResult::Failure => ThemeColor::Red,
            _ => ThemeColor::Amber,
        }
    }

    pub fn hex(&self) -> &'static str {
        match self {
            ThemeColor::Green => COLOR_SUCCESS,
            ThemeColor::Red => COLOR_FAILURE,
            ThemeColor::Amber => COLOR_OTHER,
        }
    }
}

/// 分类时附带产生的额外信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDetail {
    None,
    BackToNormal { duration_millis: i64 },
    RepeatedFailure { since_build: u64, since_time_millis: i64 },
}

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusClassification {
    /// Status fact 的值，如 "Back to Normal"
    pub status: String,
    /// 追加到 summary 后的后缀，如 " Failed"
    pub summary_suffix: String,
    pub color: ThemeColor,
    pub detail: StatusDetail,
}

impl StatusClassification {
    fn new(status: impl Into<String>, suffix: impl Into<String>, color: ThemeColor) -> Self {
        Self {
            status: status.into(),
            summary_suffix: suffix.into(),
            color,
            detail: StatusDetail::None,
        }
    }

    fn with_detail(mut self, detail: StatusDetail) -> Self {
        self.detail = detail;
        self
    }

    /// 把分类附带的条件 facts 写入构建器
    pub fn add_facts(&self, facts: &mut FactsBuilder) {
        match self.detail {
            StatusDetail::None => {}
            StatusDetail::BackToNormal { duration_millis } => {
                facts.add_back_to_normal_time(duration_millis);
            }
            StatusDetail::RepeatedFailure {
                since_build,
                since_time_millis,
            } => {
                facts.add_failing_since_build(since_build);
                facts.add_failing_since_time(since_time_millis);
            }
        }
    }
}

/// 对当前构建分类
///
/// * `current` - 当前结果，`None` 按 Success 处理（pipeline 可能延迟设置结果）
/// * `previous` - 上一个构建的结果，没有上一个构建时应传入 `Some(Success)`
/// * `failing_since` - 当前连续失败中最早的构建
/// * `build` - 当前构建记录
/// * `now_millis` - 当前时间，构建尚未记录时长时用于估算
pub fn classify(
    current: Option<BuildResult>,
    previous: Option<BuildResult>,
    failing_since: Option<&BuildRecord>,
    build: &BuildRecord,
    now_millis: i64,
) -> StatusClassification {
    let result = current.unwrap_or(BuildResult::Success);
    let color = ThemeColor::for_result(result);
    let previous_failed = previous == Some(BuildResult::Failure);

    match result {
        BuildResult::Success
            if matches!(previous, Some(BuildResult::Failure) | Some(BuildResult::Unstable)) =>
        {
            let classification = StatusClassification::new("Back to Normal", " Back to Normal", color);
            match failing_since {
                Some(since) => classification.with_detail(StatusDetail::BackToNormal {
                    duration_millis: back_to_normal_duration(build, since, now_millis),
                }),
                None => classification,
            }
        }
        BuildResult::Failure if failing_since.is_some() => match failing_since {
            Some(since) if previous_failed => {
                StatusClassification::new("Repeated Failure", " Repeated Failure", color).with_detail(
                    StatusDetail::RepeatedFailure {
                        since_build: since.number,
                        since_time_millis: since.end_time_millis(),
                    },
                )
            }
            _ => StatusClassification::new("Build Failed", " Failed", color),
        },
        BuildResult::Aborted => StatusClassification::new("Build Aborted", " Aborted", color),
        BuildResult::Unstable => StatusClassification::new("Build Unstable", " Unstable", color),
        BuildResult::Success => StatusClassification::new("Build Success", " Success", color),
        BuildResult::NotBuilt => StatusClassification::new("Not Built", " Not Built", color),
        other => StatusClassification::new(other.as_str(), format!(" {}", other.as_str()), color),
    }
}

/// 从连续失败开始到本次构建结束的时长
pub fn back_to_normal_duration(build: &BuildRecord, failing_since: &BuildRecord, now_millis: i64) -> i64 {
    let duration = if build.duration_millis == 0 {
        now_millis - build.start_time_millis
    } else {
        build.duration_millis
    };
    let completed = build.start_time_millis + duration;
    (completed - failing_since.start_time_millis).max(0)
}

/// 上一个构建的结果；没有上一个构建时视为 Success
pub fn previous_result(build: &dyn BuildContext) -> Option<BuildResult> {
    match build.previous_build() {
        Some(previous) => previous.result,
        None => Some(BuildResult::Success),
    }
}

/// 找出当前连续失败中最早的构建
///
/// 即上一个非失败构建之后的那个构建；从未有过非失败构建时取 job 的第一个构建。
pub fn resolve_failing_since(build: &dyn BuildContext) -> Option<BuildRecord> {
    match build.previous_not_failed_build() {
        Some(not_failed) => build.next_build(not_failed.number),
        None => build.first_build(),
    }
}

/// 直接对构建上下文分类
pub fn classify_build(build: &dyn BuildContext, now_millis: i64) -> StatusClassification {
    let failing_since = resolve_failing_since(build);
    classify(
        build.result(),
        previous_result(build),
        failing_since.as_ref(),
        &build.record(),
        now_millis,
    )
}

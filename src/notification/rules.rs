//! 通知规则 - 按 webhook 判断是否需要发送
//!
//! 两个条件：状态开关（只用于构建完成事件）和宏条件（任一命中即可）。

use super::macros::MacroExpander;
use super::webhook::Webhook;
use crate::build::{BuildContext, BuildResult};
use crate::error::NotifyError;
use tracing::debug;

/// 触发通知的事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Started,
    Completed,
}

/// 根据当前结果、上一次结果和 webhook 的状态开关判断是否匹配
///
/// 各子句之间是 OR 关系：失败后恢复的成功构建，`notify_back_to_normal`
/// 或 `notify_success` 任意一个打开都会匹配。
pub fn is_status_matched(webhook: &Webhook, current: Option<BuildResult>, previous: Option<BuildResult>) -> bool {
    let flags = &webhook.flags;
    let previous_failed = previous == Some(BuildResult::Failure);
    let recovered = matches!(previous, Some(BuildResult::Failure) | Some(BuildResult::Unstable));

    match current {
        Some(BuildResult::Aborted) => flags.notify_aborted,
        Some(BuildResult::Failure) if previous_failed => flags.notify_repeated_failure,
        Some(BuildResult::Failure) => flags.notify_failure,
        Some(BuildResult::NotBuilt) => flags.notify_not_built,
        Some(BuildResult::Success) => (recovered && flags.notify_back_to_normal) || flags.notify_success,
        Some(BuildResult::Unstable) => flags.notify_unstable,
        Some(BuildResult::Unknown) | None => false,
    }
}

/// 规则评估器
pub struct RuleEvaluator<'a> {
    build: &'a dyn BuildContext,
    expander: &'a dyn MacroExpander,
}

impl<'a> RuleEvaluator<'a> {
    pub fn new(build: &'a dyn BuildContext, expander: &'a dyn MacroExpander) -> Self {
        Self { build, expander }
    }

    /// 没有宏条件时总是返回 true；否则任一宏展开结果等于期望值即返回 true
    ///
    /// 宏展开失败直接返回错误，不当作不匹配处理。
    pub fn is_at_least_one_rule_matched(&self, webhook: &Webhook) -> Result<bool, NotifyError> {
        if webhook.macros.is_empty() {
            return Ok(true);
        }

        let workspace = self.build.root_dir();
        for rule in &webhook.macros {
            let evaluated = self
                .expander
                .expand(self.build, &workspace, &rule.template)
                .map_err(|source| NotifyError::MacroEvaluation {
                    template: rule.template.clone(),
                    source,
                })?;

            if evaluated == rule.value {
                debug!(webhook = %webhook, template = %rule.template, "Macro rule matched");
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// 结合事件类型判断 webhook 是否需要通知
    pub fn should_notify(
        &self,
        webhook: &Webhook,
        kind: TriggerKind,
        previous: Option<BuildResult>,
    ) -> Result<bool, NotifyError> {
        match kind {
            TriggerKind::Started => {
                Ok(self.is_at_least_one_rule_matched(webhook)? && webhook.flags.start_notification)
            }
            TriggerKind::Completed => Ok(is_status_matched(webhook, self.build.result(), previous)
                && self.is_at_least_one_rule_matched(webhook)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildSnapshot;
    use crate::error::MacroError;
    use crate::notification::macros::TokenMacroExpander;
    use crate::notification::webhook::NotifyFlags;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ALL_RESULTS: [Option<BuildResult>; 7] = [
        None,
        Some(BuildResult::Success),
        Some(BuildResult::Unstable),
        Some(BuildResult::Failure),
        Some(BuildResult::NotBuilt),
        Some(BuildResult::Aborted),
        Some(BuildResult::Unknown),
    ];

    /// 计数并返回固定值的 mock 展开器
    struct CountingExpander {
        output: String,
        calls: AtomicUsize,
    }

    impl CountingExpander {
        fn new(output: &str) -> Self {
            Self {
                output: output.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl MacroExpander for CountingExpander {
        fn expand(&self, _build: &dyn BuildContext, _workspace: &Path, _template: &str) -> Result<String, MacroError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.output.clone())
        }
    }

    struct FailingExpander;

    impl MacroExpander for FailingExpander {
        fn expand(&self, _build: &dyn BuildContext, _workspace: &Path, _template: &str) -> Result<String, MacroError> {
            Err(MacroError::Interrupted)
        }
    }

    fn flags(f: impl FnOnce(&mut NotifyFlags)) -> Webhook {
        let mut flags = NotifyFlags::default();
        f(&mut flags);
        Webhook::new("https://hooks/1").with_flags(flags)
    }

    #[test]
    fn test_no_flags_never_matches() {
        let webhook = Webhook::new("https://hooks/1");
        for current in ALL_RESULTS {
            for previous in ALL_RESULTS {
                assert!(!is_status_matched(&webhook, current, previous));
            }
        }
    }

    #[test]
    fn test_back_to_normal_alone_matches_recovery() {
        let webhook = flags(|f| f.notify_back_to_normal = true);
        assert!(is_status_matched(
            &webhook,
            Some(BuildResult::Success),
            Some(BuildResult::Failure)
        ));
        assert!(is_status_matched(
            &webhook,
            Some(BuildResult::Success),
            Some(BuildResult::Unstable)
        ));
        assert!(!is_status_matched(
            &webhook,
            Some(BuildResult::Success),
            Some(BuildResult::Success)
        ));
    }

    #[test]
    fn test_success_flag_matches_recovery_too() {
        let webhook = flags(|f| f.notify_success = true);
        assert!(is_status_matched(
            &webhook,
            Some(BuildResult::Success),
            Some(BuildResult::Failure)
        ));
    }

    #[test]
    fn test_failure_and_repeated_failure_are_exclusive() {
        let first = flags(|f| f.notify_failure = true);
        let repeated = flags(|f| f.notify_repeated_failure = true);

        assert!(is_status_matched(&first, Some(BuildResult::Failure), Some(BuildResult::Success)));
        assert!(!is_status_matched(&first, Some(BuildResult::Failure), Some(BuildResult::Failure)));
        assert!(is_status_matched(&repeated, Some(BuildResult::Failure), Some(BuildResult::Failure)));
        assert!(!is_status_matched(&repeated, Some(BuildResult::Failure), Some(BuildResult::Unstable)));
    }

    #[test]
    fn test_remaining_flags() {
        let webhook = flags(|f| {
            f.notify_aborted = true;
            f.notify_not_built = true;
            f.notify_unstable = true;
        });
        let prev = Some(BuildResult::Success);
        assert!(is_status_matched(&webhook, Some(BuildResult::Aborted), prev));
        assert!(is_status_matched(&webhook, Some(BuildResult::NotBuilt), prev));
        assert!(is_status_matched(&webhook, Some(BuildResult::Unstable), prev));
        assert!(!is_status_matched(&webhook, Some(BuildResult::Success), prev));
    }

    #[test]
    fn test_no_macros_is_vacuously_true() {
        let build = BuildSnapshot::new("api", 1, 0);
        let expander = CountingExpander::new("anything");
        let evaluator = RuleEvaluator::new(&build, &expander);

        assert!(evaluator
            .is_at_least_one_rule_matched(&Webhook::new("https://hooks/1"))
            .unwrap());
        assert_eq!(expander.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_first_matching_macro_short_circuits() {
        let build = BuildSnapshot::new("api", 1, 0);
        let expander = CountingExpander::new("main");
        let evaluator = RuleEvaluator::new(&build, &expander);
        let webhook = Webhook::new("https://hooks/1")
            .with_macro("${BRANCH_NAME}", "main")
            .with_macro("${OTHER}", "x");

        assert!(evaluator.is_at_least_one_rule_matched(&webhook).unwrap());
        assert_eq!(expander.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_macro_matches() {
        let build = BuildSnapshot::new("api", 1, 0);
        let expander = CountingExpander::new("develop");
        let evaluator = RuleEvaluator::new(&build, &expander);
        let webhook = Webhook::new("https://hooks/1")
            .with_macro("${BRANCH_NAME}", "main")
            .with_macro("${BRANCH_NAME}", "release");

        assert!(!evaluator.is_at_least_one_rule_matched(&webhook).unwrap());
        assert_eq!(expander.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_macro_failure_propagates() {
        let build = BuildSnapshot::new("api", 1, 0);
        let evaluator = RuleEvaluator::new(&build, &FailingExpander);
        let webhook = Webhook::new("https://hooks/1").with_macro("${X}", "1");

        // 宿主展开引擎被中断同样中止规则评估
        let err = evaluator.is_at_least_one_rule_matched(&webhook).unwrap_err();
        assert!(matches!(
            err,
            NotifyError::MacroEvaluation {
                source: MacroError::Interrupted,
                ..
            }
        ));
    }

    #[test]
    fn test_macro_with_real_expander() {
        let mut build = BuildSnapshot::new("api", 7, 0);
        build
            .environment
            .insert("BRANCH_NAME".to_string(), "main".to_string());
        let expander = TokenMacroExpander::new();
        let evaluator = RuleEvaluator::new(&build, &expander);

        let webhook = Webhook::new("https://hooks/1").with_macro("${BRANCH_NAME}-$BUILD_NUMBER", "main-7");
        assert!(evaluator.is_at_least_one_rule_matched(&webhook).unwrap());
    }

    #[test]
    fn test_started_requires_start_flag() {
        let build = BuildSnapshot::new("api", 1, 0);
        let expander = CountingExpander::new("");
        let evaluator = RuleEvaluator::new(&build, &expander);

        let off = Webhook::new("https://hooks/1");
        let on = flags(|f| f.start_notification = true);
        assert!(!evaluator.should_notify(&off, TriggerKind::Started, None).unwrap());
        assert!(evaluator.should_notify(&on, TriggerKind::Started, None).unwrap());
    }

    #[test]
    fn test_completed_checks_status_before_macros() {
        let mut build = BuildSnapshot::new("api", 1, 0);
        build.result = Some(BuildResult::Success);
        let evaluator = RuleEvaluator::new(&build, &FailingExpander);

        // 状态不匹配时不会展开宏
        let webhook = Webhook::new("https://hooks/1").with_macro("${X}", "1");
        assert!(!evaluator
            .should_notify(&webhook, TriggerKind::Completed, Some(BuildResult::Success))
            .unwrap());

        let webhook = webhook.with_flags(NotifyFlags::all());
        assert!(evaluator
            .should_notify(&webhook, TriggerKind::Completed, Some(BuildResult::Success))
            .is_err());
    }
}

//! 卡片组装 - 把状态分类和 facts 组合成完整的通知卡片
//!
//! 三种卡片：构建开始、构建完成、pipeline 自定义消息。每张卡片使用独立的
//! `FactsBuilder`，组装过程是同步的，在任何发送开始前完成。

use super::card::{Card, PotentialAction, Section};
use super::facts::FactsBuilder;
use super::status::classify_build;
use crate::build::{AffectedFiles, BuildContext};
use chrono::Utc;
use std::collections::BTreeSet;
use tracing::{debug, warn};

const BUILD_PRONOUN: &str = "Build";
const CHANGE_REQUEST_PRONOUN: &str = "Change Request";

/// Pipeline 步骤传入的自定义消息参数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageParameters {
    pub message: Option<String>,
    pub status: Option<String>,
    pub color: Option<String>,
    pub webhook_url: Option<String>,
}

impl MessageParameters {
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn view_header(pronoun: &str) -> String {
    format!("View {}", pronoun)
}

/// 卡片组装器
pub struct CardAssembler<'a> {
    build: &'a dyn BuildContext,
    now_millis: i64,
}

impl<'a> CardAssembler<'a> {
    pub fn new(build: &'a dyn BuildContext) -> Self {
        Self {
            build,
            now_millis: Utc::now().timestamp_millis(),
        }
    }

    /// 固定当前时间（构建未记录时长时用于计算恢复耗时）
    pub fn with_now_millis(mut self, now_millis: i64) -> Self {
        self.now_millis = now_millis;
        self
    }

    fn job_name(&self) -> &str {
        self.build.job_display_name()
    }

    fn update_title(&self) -> String {
        format!("Update from {}.", self.job_name())
    }

    fn update_subtitle(&self) -> String {
        format!("Latest status of build #{}", self.build.number())
    }

    /// 构建开始卡片
    pub fn started_card(&self) -> Card {
        let mut facts = FactsBuilder::new();
        facts
            .add_status_started()
            .add_start_time(self.build)
            .add_remarks(&self.build.causes());
        self.add_scm_details(&mut facts);

        let actions = self.potential_actions(&mut facts);
        let summary = format!("{}: Build #{} Started", self.job_name(), self.build.number());
        let section = Section::new(self.update_title(), self.update_subtitle(), facts.collect());

        Card::new(summary, section).with_actions(actions)
    }

    /// 构建完成卡片
    pub fn completed_card(&self) -> Card {
        let classification = classify_build(self.build, self.now_millis);
        debug!(
            job = %self.job_name(),
            build = self.build.number(),
            status = %classification.status,
            "Classified build status"
        );

        let mut facts = FactsBuilder::new();
        facts
            .add_status(classification.status.as_str())
            .add_start_time(self.build)
            .add_completion_time(self.build)
            .add_tests(self.build);
        classification.add_facts(&mut facts);
        facts.add_remarks(&self.build.causes());
        self.add_scm_details(&mut facts);

        let actions = self.potential_actions(&mut facts);
        let summary = format!(
            "{}: Build #{}{}",
            self.job_name(),
            self.build.number(),
            classification.summary_suffix
        );
        let section = Section::new(self.update_title(), self.update_subtitle(), facts.collect());

        Card::new(summary, section)
            .with_theme_color(classification.color.hex())
            .with_actions(actions)
    }

    /// 自定义消息卡片（只有消息文本和状态）
    pub fn message_card(&self, params: &MessageParameters) -> Card {
        let mut facts = FactsBuilder::new();
        match params.status.as_deref() {
            Some(status) => facts.add_status(status),
            None => facts.add_status_running(),
        };

        let actions = self.potential_actions(&mut facts);
        let title = format!("Message from {}, Build #{}", self.job_name(), self.build.number());
        let subtitle = params.message.clone().unwrap_or_default();
        let summary = format!("{}: Build #{} Status", self.job_name(), self.build.number());

        Card::new(summary, Section::new(title, subtitle, facts.collect())).with_actions(actions)
    }

    /// Pipeline 步骤触发的卡片
    ///
    /// 有消息时生成消息卡片；否则 status 为 "started"（忽略大小写）时复用开始卡片，
    /// 其他情况复用完成卡片。指定颜色时覆盖主题色。
    pub fn custom_card(&self, params: &MessageParameters) -> Card {
        let card = if non_blank(params.message.as_deref()).is_some() {
            self.message_card(params)
        } else if params
            .status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("started"))
            .unwrap_or(false)
        {
            self.started_card()
        } else {
            self.completed_card()
        };

        match non_blank(params.color.as_deref()) {
            Some(color) => card.with_theme_color(color),
            None => card,
        }
    }

    /// Culprits、开发者和变更文件数
    fn add_scm_details(&self, facts: &mut FactsBuilder) {
        match self.build.culprits() {
            Ok(users) => {
                facts.add_culprits(self.build.result(), &users);
            }
            Err(e) => warn!(
                job = %self.job_name(),
                build = self.build.number(),
                error = %e,
                "Failed to read culprits"
            ),
        }

        let entries = match self.build.change_entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    job = %self.job_name(),
                    build = self.build.number(),
                    error = %e,
                    "Failed to read change sets"
                );
                return;
            }
        };
        if entries.is_empty() {
            return;
        }

        let mut files = BTreeSet::new();
        for entry in &entries {
            match entry.affected_files() {
                AffectedFiles::Listed(paths) => files.extend(paths.iter().cloned()),
                AffectedFiles::Unsupported => debug!(
                    author = %entry.author,
                    "Change entry does not list affected files"
                ),
            }
        }
        let authors: Vec<String> = entries.into_iter().map(|e| e.author).collect();

        facts.add_developers(&authors).add_number_of_files_changed(&files);
    }

    /// "View Build" 按钮，以及 change request 的按钮和 facts
    fn potential_actions(&self, facts: &mut FactsBuilder) -> Vec<PotentialAction> {
        let mut actions = vec![PotentialAction::open_uri(
            view_header(BUILD_PRONOUN),
            self.build.build_url(),
        )];

        let Some(change_request) = self.build.change_request() else {
            return actions;
        };
        let pronoun = non_blank(change_request.pronoun.as_deref())
            .unwrap_or(CHANGE_REQUEST_PRONOUN)
            .to_string();

        if let Some(object) = change_request.object {
            actions.push(PotentialAction::open_uri(view_header(&pronoun), object.url));
            facts.add_fact(format!("{} Title", pronoun), object.display_name);
        }

        if let Some(contributor) = change_request.contributor {
            let name = non_blank(contributor.contributor.as_deref());
            let display_name = non_blank(contributor.display_name.as_deref());
            let author = match (name, display_name) {
                (Some(name), Some(display_name)) => Some(format!("{} ({})", name, display_name)),
                (Some(single), None) | (None, Some(single)) => Some(single.to_string()),
                (None, None) => None,
            };
            if let Some(author) = author {
                facts.add_fact(format!("{} Author", pronoun), author);
            }
        }

        actions
    }
}

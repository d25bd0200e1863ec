//! MessageCard 结构 - webhook 接收方匹配的是字面字段名，序列化时不做大小写转换
//!
//! Payload 格式：
//! ```json
//! {
//!   "@type": "MessageCard",
//!   "@context": "http://schema.org/extensions",
//!   "summary": "api: Build #12 Success",
//!   "themeColor": "96CEB4",
//!   "sections": [{ "activityTitle": "...", "activitySubtitle": "...", "facts": [...] }],
//!   "potentialAction": [{ "@type": "OpenUri", "name": "View Build", "targets": [...] }]
//! }
//! ```

use serde::{Deserialize, Serialize};

/// 成功
pub const COLOR_SUCCESS: &str = "96CEB4";
/// 失败
pub const COLOR_FAILURE: &str = "FF6F69";
/// 其他结果（Unstable、Aborted、Not Built）
pub const COLOR_OTHER: &str = "FFCC5C";

/// 单条事实（名称可重复，顺序即展示顺序）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub name: String,
    pub value: String,
}

impl Fact {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "activityTitle")]
    pub activity_title: String,
    #[serde(rename = "activitySubtitle")]
    pub activity_subtitle: String,
    pub facts: Vec<Fact>,
}

impl Section {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>, facts: Vec<Fact>) -> Self {
        Self {
            activity_title: title.into(),
            activity_subtitle: subtitle.into(),
            facts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTarget {
    pub os: String,
    pub uri: String,
}

/// 卡片上的链接按钮
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotentialAction {
    #[serde(rename = "@type")]
    pub action_type: String,
    pub name: String,
    pub targets: Vec<ActionTarget>,
}

impl PotentialAction {
    pub fn open_uri(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            action_type: "OpenUri".to_string(),
            name: name.into(),
            targets: vec![ActionTarget {
                os: "default".to_string(),
                uri: uri.into(),
            }],
        }
    }

    pub fn uri(&self) -> Option<&str> {
        self.targets.first().map(|t| t.uri.as_str())
    }
}

/// 通知卡片
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    #[serde(rename = "@type")]
    pub card_type: String,
    #[serde(rename = "@context")]
    pub context: String,
    pub summary: String,
    #[serde(rename = "themeColor", skip_serializing_if = "Option::is_none")]
    pub theme_color: Option<String>,
    pub sections: Vec<Section>,
    #[serde(rename = "potentialAction")]
    pub potential_action: Vec<PotentialAction>,
}

impl Card {
    /// 卡片至少包含一个 section
    pub fn new(summary: impl Into<String>, section: Section) -> Self {
        Self {
            card_type: "MessageCard".to_string(),
            context: "http://schema.org/extensions".to_string(),
            summary: summary.into(),
            theme_color: None,
            sections: vec![section],
            potential_action: Vec::new(),
        }
    }

    pub fn with_theme_color(mut self, color: impl Into<String>) -> Self {
        self.theme_color = Some(color.into());
        self
    }

    pub fn with_actions(mut self, actions: Vec<PotentialAction>) -> Self {
        self.potential_action = actions;
        self
    }

    /// 序列化为 wire 格式
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 第一个 section 的 facts
    pub fn facts(&self) -> &[Fact] {
        self.sections.first().map(|s| s.facts.as_slice()).unwrap_or(&[])
    }

    /// 按名称查找第一个 fact 的值
    pub fn fact(&self, name: &str) -> Option<&str> {
        self.facts()
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_card() -> Card {
        let section = Section::new(
            "Update from api.",
            "Latest status of build #3",
            vec![Fact::new("Status", "Build Success"), Fact::new("Remarks", "Started by timer")],
        );
        Card::new("api: Build #3 Success", section)
            .with_theme_color(COLOR_SUCCESS)
            .with_actions(vec![PotentialAction::open_uri("View Build", "https://ci/job/api/3/")])
    }

    #[test]
    fn test_wire_format_uses_literal_field_names() {
        let json: serde_json::Value = serde_json::from_str(&sample_card().to_json().unwrap()).unwrap();

        assert_eq!(json["@type"], "MessageCard");
        assert_eq!(json["summary"], "api: Build #3 Success");
        assert_eq!(json["themeColor"], "96CEB4");
        assert_eq!(json["sections"][0]["activityTitle"], "Update from api.");
        assert_eq!(json["sections"][0]["activitySubtitle"], "Latest status of build #3");
        assert_eq!(json["sections"][0]["facts"][1]["name"], "Remarks");
        assert_eq!(json["potentialAction"][0]["@type"], "OpenUri");
        assert_eq!(json["potentialAction"][0]["name"], "View Build");
        assert_eq!(json["potentialAction"][0]["targets"][0]["uri"], "https://ci/job/api/3/");
    }

    #[test]
    fn test_theme_color_omitted_when_unset() {
        let card = Card::new("s", Section::new("t", "st", vec![]));
        let json: serde_json::Value = serde_json::from_str(&card.to_json().unwrap()).unwrap();
        assert!(json.get("themeColor").is_none());
        assert_eq!(json["sections"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_fact_lookup() {
        let card = sample_card();
        assert_eq!(card.fact("Status"), Some("Build Success"));
        assert_eq!(card.fact("Culprits"), None);
    }
}

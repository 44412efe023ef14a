//! Replaceable rule tables for the capture organizer.
//!
//! The defaults are tuned for Chinese WeChat clippings. Every label, keyword
//! and tag lives in [`CaptureRules`] so an alternate rule set can be loaded
//! from config without touching the planner.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::model::CanonicalTask;
use crate::normalize::clean_title;

/// The two mutually exclusive buckets every captured task ends up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskClass {
    Action,
    Material,
}

impl std::fmt::Display for TaskClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Action => write!(f, "action"),
            Self::Material => write!(f, "material"),
        }
    }
}

/// Why a task landed in its class; kept for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassReason {
    MarkerHint,
    KeywordAction,
    KeywordMaterial,
    HasUrl,
    HasDue,
    FallbackAction,
}

impl ClassReason {
    fn keyword(class: TaskClass) -> Self {
        match class {
            TaskClass::Action => Self::KeywordAction,
            TaskClass::Material => Self::KeywordMaterial,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MarkerHint => "marker_hint",
            Self::KeywordAction => "keyword_action",
            Self::KeywordMaterial => "keyword_material",
            Self::HasUrl => "has_url",
            Self::HasDue => "has_due",
            Self::FallbackAction => "fallback_action",
        }
    }
}

impl std::fmt::Display for ClassReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRule {
    pub label: String,
    pub class: TaskClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub class: TaskClass,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureRules {
    /// Tag (or raw-title substring) identifying clipped tasks.
    pub capture_tag: String,
    pub action_tag: String,
    pub material_tag: String,
    /// Prefix written into a kept task's description when a marker is merged.
    pub marker_note_prefix: String,
    /// Longest whitespace-free title still considered a marker.
    pub marker_max_chars: usize,
    /// Checked in order; the first contained label wins.
    pub markers: Vec<MarkerRule>,
    /// Checked in order against `title + " " + description`.
    pub keywords: Vec<KeywordRule>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for CaptureRules {
    fn default() -> Self {
        Self {
            capture_tag: "微信采集".to_string(),
            action_tag: "待行动".to_string(),
            material_tag: "材料".to_string(),
            marker_note_prefix: "微信标记: ".to_string(),
            marker_max_chars: 8,
            markers: vec![
                MarkerRule {
                    label: "待投递".to_string(),
                    class: TaskClass::Action,
                },
                MarkerRule {
                    label: "待阅读".to_string(),
                    class: TaskClass::Material,
                },
                MarkerRule {
                    label: "好素材".to_string(),
                    class: TaskClass::Material,
                },
            ],
            keywords: vec![
                KeywordRule {
                    class: TaskClass::Action,
                    keywords: strings(&[
                        "待投递", "讨论", "开会", "会议", "面试", "参加", "发送", "发给", "提交",
                        "完成", "处理", "跟进", "安排", "提醒", "明天", "今天", "下午", "晚上",
                        "早上", "电话", "约",
                    ]),
                },
                KeywordRule {
                    class: TaskClass::Material,
                    keywords: strings(&[
                        "待阅读", "好素材", "素材", "待读", "收藏", "链接", "文章", "视频", "抖音",
                        "公众号", "转发", "学习", "案例", "资料",
                    ]),
                },
            ],
        }
    }
}

impl CaptureRules {
    pub fn tag_for(&self, class: TaskClass) -> &str {
        match class {
            TaskClass::Action => &self.action_tag,
            TaskClass::Material => &self.material_tag,
        }
    }

    pub fn class_for_marker(&self, label: &str) -> Option<TaskClass> {
        self.markers
            .iter()
            .find(|rule| rule.label == label)
            .map(|rule| rule.class)
    }

    /// Marker label carried by a short title such as `待投递` or `【待阅读】`.
    pub fn detect_marker<'a>(&'a self, title: &str) -> Option<&'a str> {
        let compact: String = clean_title(title)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if compact.is_empty() || compact.chars().count() > self.marker_max_chars {
            return None;
        }
        self.markers
            .iter()
            .find(|rule| compact.contains(rule.label.as_str()))
            .map(|rule| rule.label.as_str())
    }

    pub fn is_captured(&self, task: &CanonicalTask) -> bool {
        task.status.is_open()
            && task.is_inbox
            && (task.tags.iter().any(|t| *t == self.capture_tag)
                || task
                    .title_raw
                    .to_lowercase()
                    .contains(&self.capture_tag.to_lowercase()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.action_tag.is_empty() || self.material_tag.is_empty() {
            return Err(CoreError::ConfigError(
                "capture rules need non-empty action_tag and material_tag".to_string(),
            ));
        }
        if self.action_tag == self.material_tag {
            return Err(CoreError::ConfigError(
                "capture rules action_tag and material_tag must differ".to_string(),
            ));
        }
        if self.markers.iter().any(|m| m.label.is_empty()) {
            return Err(CoreError::ConfigError("empty marker label".to_string()));
        }
        Ok(())
    }

    /// Compile the rules into a ready-to-use classifier.
    pub fn classifier(&self) -> Result<Classifier> {
        self.validate()?;
        let mut keyword_rules = Vec::new();
        for rule in &self.keywords {
            let alternatives: Vec<String> = rule
                .keywords
                .iter()
                .filter(|k| !k.is_empty())
                .map(|k| regex::escape(k))
                .collect();
            if alternatives.is_empty() {
                continue;
            }
            let regex = RegexBuilder::new(&format!("(?:{})", alternatives.join("|")))
                .case_insensitive(true)
                .build()
                .map_err(|e| CoreError::ConfigError(format!("keyword rule: {e}")))?;
            keyword_rules.push((rule.class, regex));
        }
        Ok(Classifier { keyword_rules })
    }
}

/// Outcome of classifying one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub class: TaskClass,
    pub reason: ClassReason,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    keyword_rules: Vec<(TaskClass, Regex)>,
}

impl Classifier {
    /// A hint from a merged or own marker always wins; then keyword rules,
    /// then URL presence, then due date, else action.
    pub fn classify(&self, task: &CanonicalTask, hint: Option<TaskClass>) -> Classification {
        if let Some(class) = hint {
            return Classification {
                class,
                reason: ClassReason::MarkerHint,
            };
        }

        let text = format!("{} {}", task.title, task.description).to_lowercase();
        for (class, regex) in &self.keyword_rules {
            if regex.is_match(&text) {
                return Classification {
                    class: *class,
                    reason: ClassReason::keyword(*class),
                };
            }
        }

        if task.has_url {
            return Classification {
                class: TaskClass::Material,
                reason: ClassReason::HasUrl,
            };
        }
        if task.due_local_date.is_some() {
            return Classification {
                class: TaskClass::Action,
                reason: ClassReason::HasDue,
            };
        }
        Classification {
            class: TaskClass::Action,
            reason: ClassReason::FallbackAction,
        }
    }
}

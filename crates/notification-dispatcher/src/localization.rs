//! 通知本地化解析器
//!
//! 将 (模板键, 语言, 变量) 映射为渲染后的标题与正文。
//! 纯函数式组件：无副作用、无外部依赖。查找顺序为
//! 精确命中 -> 默认语言 -> 模板键字面量，缺失翻译永不报错。

use std::collections::HashMap;

use regex::Regex;
use tracing::warn;

use fleet_shared::notifications::{Language, NotificationKind};

/// 渲染结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub title: String,
    pub body: String,
}

/// 消息模板
#[derive(Debug, Clone)]
struct MessageTemplate {
    title: String,
    body: String,
}

/// 本地化解析器
///
/// 管理按 (模板键, 语言) 索引的通知模板并提供 `{{variable}}` 变量替换。
pub struct LocalizationResolver {
    templates: HashMap<(String, Language), MessageTemplate>,
    default_language: Language,
    /// 匹配 {{variable_name}} 格式，变量名支持字母、数字、下划线
    variable_regex: Regex,
}

impl LocalizationResolver {
    /// 创建空的解析器
    pub fn new(default_language: Language) -> Self {
        Self {
            templates: HashMap::new(),
            default_language,
            variable_regex: Regex::new(r"\{\{(\w+)\}\}").expect("变量替换正则非法"),
        }
    }

    /// 创建带有全部内置模板的解析器
    pub fn with_defaults(default_language: Language) -> Self {
        let mut resolver = Self::new(default_language);
        resolver.register_default_templates();
        resolver
    }

    /// 注册模板，已存在时覆盖
    pub fn register_template(
        &mut self,
        key: impl Into<String>,
        language: Language,
        title: impl Into<String>,
        body: impl Into<String>,
    ) {
        self.templates.insert(
            (key.into(), language),
            MessageTemplate {
                title: title.into(),
                body: body.into(),
            },
        );
    }

    pub fn has_template(&self, key: &str, language: Language) -> bool {
        self.templates
            .contains_key(&(key.to_string(), language))
    }

    /// 解析并渲染通知内容
    ///
    /// 目标语言缺失时回退到默认语言；两种语言都没有模板时返回
    /// 模板键字面量（不做变量替换），保证调度流程永不因翻译缺失中断。
    pub fn resolve(
        &self,
        key: &str,
        language: Language,
        vars: &HashMap<String, String>,
    ) -> RenderedMessage {
        let template = self
            .templates
            .get(&(key.to_string(), language))
            .or_else(|| self.templates.get(&(key.to_string(), self.default_language)));

        match template {
            Some(t) => RenderedMessage {
                title: self.render(&t.title, vars),
                body: self.render(&t.body, vars),
            },
            None => {
                warn!(
                    template_key = key,
                    language = %language,
                    "模板未找到，回退到模板键字面量"
                );
                RenderedMessage {
                    title: key.to_string(),
                    body: key.to_string(),
                }
            }
        }
    }

    /// 渲染单段模板
    ///
    /// 将 `{{variable}}` 替换为变量表中的对应值；
    /// 未知变量保留原样并记录警告。
    fn render(&self, template: &str, vars: &HashMap<String, String>) -> String {
        self.variable_regex
            .replace_all(template, |caps: &regex::Captures| {
                let var_name = &caps[1];
                match vars.get(var_name) {
                    Some(value) => value.clone(),
                    None => {
                        warn!(variable = var_name, "模板变量未找到，保留原样");
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    /// 提取模板中的所有变量名
    pub fn extract_variables(&self, template: &str) -> Vec<String> {
        self.variable_regex
            .captures_iter(template)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// 注册全部通知类型的内置模板（英文 + 中文）
    fn register_default_templates(&mut self) {
        use NotificationKind::*;

        let en = [
            (
                AssignmentCreated,
                "New Training Assignment",
                "You have been assigned the training course {{course_name}}. Please complete it before {{due_date}}.",
            ),
            (
                AssignmentDueSoon,
                "Training Due Soon",
                "Your training {{course_name}} is due in {{days_left}} days.",
            ),
            (
                AssignmentOverdue,
                "Training Overdue",
                "Your training {{course_name}} is overdue. Please complete it as soon as possible.",
            ),
            (
                TrainingCompleted,
                "Training Completed",
                "Congratulations! You have completed the training {{course_name}}.",
            ),
            (
                DocumentExpiring,
                "Document Expiring Soon",
                "Your document {{document_name}} will expire in {{days_left}} days. Please renew it in time.",
            ),
            (
                DocumentExpired,
                "Document Expired",
                "Your document {{document_name}} has expired. Your driving eligibility may be affected.",
            ),
            (Reminder, "Reminder", "{{message}}"),
        ];

        let zh = [
            (
                AssignmentCreated,
                "新的培训任务",
                "您已被分配培训课程「{{course_name}}」，请在 {{due_date}} 前完成。",
            ),
            (
                AssignmentDueSoon,
                "培训即将到期",
                "您的培训「{{course_name}}」将在 {{days_left}} 天后到期，请尽快完成。",
            ),
            (
                AssignmentOverdue,
                "培训已逾期",
                "您的培训「{{course_name}}」已逾期，请尽快完成。",
            ),
            (
                TrainingCompleted,
                "培训已完成",
                "恭喜您完成培训「{{course_name}}」！",
            ),
            (
                DocumentExpiring,
                "证件即将过期",
                "您的证件「{{document_name}}」将在 {{days_left}} 天后过期，请及时更新。",
            ),
            (
                DocumentExpired,
                "证件已过期",
                "您的证件「{{document_name}}」已过期，可能影响您的出车资格。",
            ),
            (Reminder, "提醒", "{{message}}"),
        ];

        for (kind, title, body) in en {
            self.register_template(kind.template_key(), Language::En, title, body);
        }
        for (kind, title, body) in zh {
            self.register_template(kind.template_key(), Language::Zh, title, body);
        }
    }
}

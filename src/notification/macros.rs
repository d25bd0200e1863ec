//! 宏展开 - 把模板中的构建变量替换为实际值
//!
//! 支持的写法：
//! - `$NAME` / `${NAME}` - 构建变量或环境变量
//! - `${FILE,path="relative/path"}` - 读取工作目录下的文件内容
//! - `$$` - 字面量 `$`
//!
//! 宏条件使用严格模式（未知变量是错误），webhook URL 使用宽松模式（未知变量原样保留）。

use crate::build::BuildContext;
use crate::error::MacroError;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// 外部宏展开引擎
pub trait MacroExpander: Send + Sync {
    fn expand(&self, build: &dyn BuildContext, workspace: &Path, template: &str) -> Result<String, MacroError>;
}

/// 基于构建变量的默认实现
#[derive(Debug, Default, Clone)]
pub struct TokenMacroExpander;

impl TokenMacroExpander {
    pub fn new() -> Self {
        Self
    }
}

impl MacroExpander for TokenMacroExpander {
    fn expand(&self, build: &dyn BuildContext, workspace: &Path, template: &str) -> Result<String, MacroError> {
        let vars = build_variables(build);
        expand_tokens(template, &vars, Some(workspace), true)
    }
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"\$\$|\$\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*(?:,\s*path\s*=\s*"([^"]*)"\s*)?\}|\$([A-Za-z_][A-Za-z0-9_]*)"#,
        )
        .expect("token pattern is a valid regex")
    })
}

/// 构建变量：宿主环境变量 + 内置变量（环境变量优先）
pub fn build_variables(build: &dyn BuildContext) -> HashMap<String, String> {
    let mut vars = build.environment();
    let builtins = [
        ("BUILD_NUMBER", build.number().to_string()),
        ("JOB_NAME", build.job_display_name().to_string()),
        ("BUILD_URL", build.build_url()),
        (
            "BUILD_STATUS",
            build
                .result()
                .map(|r| r.as_str().to_string())
                .unwrap_or_else(|| "RUNNING".to_string()),
        ),
    ];
    for (name, value) in builtins {
        vars.entry(name.to_string()).or_insert(value);
    }
    vars
}

/// 宽松展开（未知变量原样保留），用于 webhook URL
pub fn expand_variables(template: &str, vars: &HashMap<String, String>) -> String {
    expand_tokens(template, vars, None, false).unwrap_or_else(|_| template.to_string())
}

fn expand_tokens(
    template: &str,
    vars: &HashMap<String, String>,
    workspace: Option<&Path>,
    strict: bool,
) -> Result<String, MacroError> {
    let pattern = token_pattern();
    let mut output = String::with_capacity(template.len());
    let mut last = 0;

    for caps in pattern.captures_iter(template) {
        let whole = caps.get(0).ok_or_else(|| MacroError::Malformed(template.to_string()))?;
        let literal = &template[last..whole.start()];
        if strict && literal.contains("${") {
            return Err(MacroError::Malformed(literal.to_string()));
        }
        output.push_str(literal);
        last = whole.end();

        if whole.as_str() == "$$" {
            output.push('$');
            continue;
        }

        let name = caps.get(1).or_else(|| caps.get(3)).map(|m| m.as_str()).unwrap_or("");
        match (name, caps.get(2), workspace) {
            ("FILE", Some(path), Some(root)) => {
                let content = fs::read_to_string(root.join(path.as_str()))?;
                output.push_str(content.trim_end_matches(|c: char| c == '\r' || c == '\n'));
            }
            (_, Some(_), _) => {
                if strict {
                    return Err(MacroError::UnknownToken(whole.as_str().to_string()));
                }
                output.push_str(whole.as_str());
            }
            _ => match vars.get(name) {
                Some(value) => output.push_str(value),
                None if strict => return Err(MacroError::UnknownToken(name.to_string())),
                None => output.push_str(whole.as_str()),
            },
        }
    }

    let rest = &template[last..];
    if strict && rest.contains("${") {
        return Err(MacroError::Malformed(rest.to_string()));
    }
    output.push_str(rest);
    Ok(output)
}

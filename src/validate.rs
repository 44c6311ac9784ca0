//! Config validation (friendly errors)
//!
//! Purpose:
//! - Catch common misconfigurations early
//! - Explain *what* is wrong, *where* it lives, and *what to do*
//! - Keep the engine running where possible by falling back safely

use std::path::Path;

use crate::config::{ConfigFile, WallpaperConfig, WallpaperKind};
use crate::defaults::DefaultTexture;
use crate::transitions::TransitionKind;
use crate::{loge, logi, logw};

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub level: IssueLevel,
    pub path: String,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    Warn,
    Error,
}

impl ValidationIssue {
    pub fn warn(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Warn, path: path.into(), message: message.into(), hint }
    }
    pub fn error(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Error, path: path.into(), message: message.into(), hint }
    }
}

pub fn emit_issues(tag: &str, issues: &[ValidationIssue]) {
    for it in issues {
        match it.level {
            IssueLevel::Warn => {
                if let Some(h) = &it.hint {
                    logw!(tag, "{}: {} (hint: {})", it.path, it.message, h);
                } else {
                    logw!(tag, "{}: {}", it.path, it.message);
                }
            }
            IssueLevel::Error => {
                if let Some(h) = &it.hint {
                    loge!(tag, "{}: {} (hint: {})", it.path, it.message, h);
                } else {
                    loge!(tag, "{}: {}", it.path, it.message);
                }
            }
        }
    }
}

/// Emit a one-line summary even when there are zero issues.
/// This is helpful for auditability ("validation ran") and debugging.
pub fn emit_summary(tag: &str, label: &str, issues: &[ValidationIssue]) {
    let warns = issues.iter().filter(|i| i.level == IssueLevel::Warn).count();
    let errs = issues.iter().filter(|i| i.level == IssueLevel::Error).count();
    if errs == 0 && warns == 0 {
        logi!(tag, "validation: {label} OK (0 issues)");
    } else {
        logw!(tag, "validation: {label} issues found (errors={errs} warnings={warns})");
    }
}

/// Validate the whole config file. Error-level issues mean the offending output
/// entry will be skipped at apply time; warnings are survivable.
pub fn validate_config(file: &ConfigFile) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if file.outputs.is_empty() {
        issues.push(ValidationIssue::warn(
            "config:/outputs",
            "no outputs configured",
            Some("add an entry per output name, or a \"*\" fallback entry".into()),
        ));
        return issues;
    }

    for (name, cfg) in &file.outputs {
        validate_output(name, cfg, &mut issues);
    }

    issues
}

fn validate_output(name: &str, cfg: &WallpaperConfig, issues: &mut Vec<ValidationIssue>) {
    let base = format!("config:/outputs/{name}");

    match cfg.wallpaper {
        WallpaperKind::Image => {
            let has_cycle = cfg.cycle.as_ref().map(|c| !c.paths.is_empty()).unwrap_or(false);
            if cfg.path.is_none() && !has_cycle {
                issues.push(ValidationIssue::error(
                    format!("{base}/path"),
                    "image wallpaper needs a path (or a non-empty cycle list)",
                    Some("set \"path\": \"/path/to/image.png\"".into()),
                ));
            }
            if let Some(p) = &cfg.path {
                check_file_exists(&format!("{base}/path"), p, issues);
            }
        }
        WallpaperKind::Shader => {
            match &cfg.path {
                None => issues.push(ValidationIssue::error(
                    format!("{base}/path"),
                    "shader wallpaper needs a fragment shader path",
                    Some("set \"path\": \"/path/to/effect.frag\"".into()),
                )),
                Some(p) => check_file_exists(&format!("{base}/path"), p, issues),
            }
            if cfg.shader_speed <= 0.0 || !cfg.shader_speed.is_finite() {
                issues.push(ValidationIssue::warn(
                    format!("{base}/shader_speed"),
                    format!("shader_speed {} is not positive; 1.0 will be used", cfg.shader_speed),
                    None,
                ));
            }
        }
    }

    if !cfg.transition.is_none() {
        if TransitionKind::from_name(&cfg.transition.kind).is_err() {
            let known: Vec<&str> = TransitionKind::REGISTRY.iter().map(|(n, _)| *n).collect();
            issues.push(ValidationIssue::error(
                format!("{base}/transition/kind"),
                format!("unknown transition '{}'", cfg.transition.kind),
                Some(format!("use one of: {}, or \"none\"", known.join(", "))),
            ));
        }
    }

    for (i, spec) in cfg.channels.iter().enumerate() {
        let trimmed = spec.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            continue;
        }
        if DefaultTexture::from_name(trimmed).is_some() {
            continue;
        }
        check_file_exists(&format!("{base}/channels/{i}"), Path::new(trimmed), issues);
    }

    if let Some(cycle) = &cfg.cycle {
        if cycle.paths.is_empty() {
            issues.push(ValidationIssue::warn(
                format!("{base}/cycle/paths"),
                "cycle list is empty; the single path will be used instead",
                None,
            ));
        } else {
            if cycle.duration_secs == 0 {
                issues.push(ValidationIssue::warn(
                    format!("{base}/cycle/duration_secs"),
                    "cycle duration is 0; cycling is disabled",
                    Some("set duration_secs to the seconds between advances".into()),
                ));
            }
            if cycle.index >= cycle.paths.len() {
                issues.push(ValidationIssue::warn(
                    format!("{base}/cycle/index"),
                    format!(
                        "start index {} is out of range for {} paths; it will wrap",
                        cycle.index,
                        cycle.paths.len()
                    ),
                    None,
                ));
            }
            for (i, p) in cycle.paths.iter().enumerate() {
                check_file_exists(&format!("{base}/cycle/paths/{i}"), p, issues);
            }
        }
        if cfg.wallpaper == WallpaperKind::Shader {
            issues.push(ValidationIssue::warn(
                format!("{base}/cycle"),
                "cycle lists only apply to image wallpapers",
                None,
            ));
        }
    }
}

fn check_file_exists(where_: &str, path: &Path, issues: &mut Vec<ValidationIssue>) {
    if !path.exists() {
        issues.push(ValidationIssue::warn(
            where_.to_string(),
            format!("file not found: {}", path.display()),
            Some("the output will stay blank until the file appears or the config changes".into()),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;

    fn parse(src: &str) -> ConfigFile {
        serde_json::from_str(src).unwrap()
    }

    fn errors(issues: &[ValidationIssue]) -> usize {
        issues.iter().filter(|i| i.level == IssueLevel::Error).count()
    }

    #[test]
    fn empty_outputs_is_a_warning() {
        let issues = validate_config(&parse(r#"{ "outputs": {} }"#));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].level, IssueLevel::Warn);
    }

    #[test]
    fn image_without_path_is_an_error() {
        let issues = validate_config(&parse(r#"{ "outputs": { "*": {} } }"#));
        assert_eq!(errors(&issues), 1);
        assert!(issues[0].path.contains("/path"));
    }

    #[test]
    fn cycle_list_satisfies_image_path_requirement() {
        let issues = validate_config(&parse(
            r#"{ "outputs": { "*": {
                "cycle": { "duration_secs": 60, "paths": ["/nonexistent-wallglow-test.png"] }
            } } }"#,
        ));
        assert_eq!(errors(&issues), 0);
        // the missing file itself is only a warning
        assert!(issues.iter().any(|i| i.message.contains("file not found")));
    }

    #[test]
    fn unknown_transition_is_an_error_none_is_not() {
        let bad = validate_config(&parse(
            r#"{ "outputs": { "*": { "path": "/nonexistent-wallglow-test.png",
                "transition": { "kind": "swirl" } } } }"#,
        ));
        assert_eq!(errors(&bad), 1);
        assert!(bad.iter().any(|i| i.message.contains("unknown transition 'swirl'")));

        let none = validate_config(&parse(
            r#"{ "outputs": { "*": { "path": "/nonexistent-wallglow-test.png",
                "transition": { "kind": "none" } } } }"#,
        ));
        assert_eq!(errors(&none), 0);
    }

    #[test]
    fn channel_specifiers_accept_defaults_and_skip_markers() {
        let issues = validate_config(&parse(
            r#"{ "outputs": { "*": { "wallpaper": "shader",
                "path": "/nonexistent-wallglow-test.frag",
                "channels": ["rgba_noise", "none", "", "wood", "/nonexistent-channel.png"] } } }"#,
        ));
        // only the shader path + the one real file path warn
        let not_found: Vec<_> =
            issues.iter().filter(|i| i.message.contains("file not found")).collect();
        assert_eq!(not_found.len(), 2);
        assert_eq!(errors(&issues), 0);
    }

    #[test]
    fn nonpositive_shader_speed_warns() {
        let issues = validate_config(&parse(
            r#"{ "outputs": { "*": { "wallpaper": "shader",
                "path": "/nonexistent-wallglow-test.frag", "shader_speed": 0.0 } } }"#,
        ));
        assert!(issues.iter().any(|i| i.path.contains("shader_speed")));
    }
}

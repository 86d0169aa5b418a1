use std::env;
use std::fmt::Write as _;
use std::io::IsTerminal;

use colored::*;

use super::{Finding, MemberReport, Report};
use crate::classify::{Creation, ProvenanceRule};
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "always" => Some(Self::Always),
            "never" => Some(Self::Never),
            _ => None,
        }
    }

    /// `NO_COLOR`, `CLICOLOR=0` and `CLICOLOR_FORCE=1`, in that order of
    /// increasing precedence.
    pub fn from_env() -> Self {
        let mut mode = Self::Auto;
        if env::var("NO_COLOR").is_ok() {
            mode = Self::Never;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            mode = Self::Never;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v == "1") {
            mode = Self::Always;
        }
        mode
    }

    pub fn should_use_color(&self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => detect_color_support(),
        }
    }

    /// Applies the mode to everything `colored` renders afterwards.
    pub fn apply(&self) {
        colored::control::set_override(self.should_use_color());
    }
}

fn detect_color_support() -> bool {
    if env::var("TERM").is_ok_and(|term| term == "dumb") {
        return false;
    }
    std::io::stdout().is_terminal()
}

fn creation_label(creation: Creation) -> &'static str {
    match creation {
        Creation::No => "no",
        Creation::Maybe => "maybe",
        Creation::Unknown => "unknown",
        Creation::Yes => "yes",
    }
}

fn rule_label(rule: ProvenanceRule) -> &'static str {
    match rule {
        ProvenanceRule::CreatedAndNotCachedOrInjected => "created",
        ProvenanceRule::CreatedAndInjected => "created+injected",
        ProvenanceRule::NotCreatedButCachedOrInjected => "injected",
        ProvenanceRule::Neither => "-",
    }
}

fn finding_cell(finding: Option<Finding>) -> ColoredString {
    match finding {
        Some(Finding::DisposeMember) => "DisposeMember".red().bold(),
        Some(Finding::DisposingInjected) => "DisposingInjected".yellow(),
        None => "".normal(),
    }
}

fn location(member: &MemberReport) -> String {
    format!("{}:{}", member.file.display(), member.line)
}

/// Aligned table, one row per member, followed by a summary line.
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let loc_width = report
        .members
        .iter()
        .map(|m| location(m).len())
        .max()
        .unwrap_or(0)
        .max("LOCATION".len());
    let name_width = report
        .members
        .iter()
        .map(|m| m.type_name.len() + m.member.len() + 1)
        .max()
        .unwrap_or(0)
        .max("MEMBER".len());

    let _ = writeln!(
        out,
        "{}",
        format!(
            "{:<loc_width$}  {:<name_width$}  {:<8}  {:<16}  {:<8}  FINDING",
            "LOCATION", "MEMBER", "CREATED", "PROVENANCE", "DISPOSED"
        )
        .bold()
    );
    for member in &report.members {
        let _ = writeln!(
            out,
            "{:<loc_width$}  {:<name_width$}  {:<8}  {:<16}  {:<8}  {}",
            location(member),
            format!("{}.{}", member.type_name, member.member),
            creation_label(member.creation),
            rule_label(member.rule),
            if member.disposed { "yes" } else { "no" },
            finding_cell(member.finding)
        );
    }

    for path in &report.skipped {
        let _ = writeln!(out, "{} {}", "skipped:".dimmed(), path.display());
    }
    let findings = report.findings().count();
    let summary = format!("{} members, {} findings", report.members.len(), findings);
    let _ = writeln!(
        out,
        "{}",
        if findings == 0 { summary.green() } else { summary.red() }
    );
    out
}

pub fn render_json(report: &Report) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn sample() -> Report {
        Report {
            members: vec![MemberReport {
                file: PathBuf::from("a.cs"),
                line: 3,
                type_name: "Holder".into(),
                member: "_s".into(),
                creation: Creation::Yes,
                rule: ProvenanceRule::CreatedAndNotCachedOrInjected,
                disposed: false,
                finding: Some(Finding::DisposeMember),
            }],
            skipped: Vec::new(),
        }
    }

    #[test]
    fn parse_accepts_any_case() {
        assert_eq!(ColorMode::parse("ALWAYS"), Some(ColorMode::Always));
        assert_eq!(ColorMode::parse("never"), Some(ColorMode::Never));
        assert_eq!(ColorMode::parse("sometimes"), None);
    }

    #[test]
    fn text_lists_member_and_summary() {
        ColorMode::Never.apply();
        let text = render_text(&sample());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("a.cs:3"));
        assert!(lines[1].contains("Holder._s"));
        assert!(lines[1].ends_with("DisposeMember"));
        assert_eq!(lines[2], "1 members, 1 findings");
    }

    #[test]
    fn json_uses_snake_case_rules() {
        let json = render_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["members"][0]["type"], "Holder");
        assert_eq!(value["members"][0]["rule"], "created_and_not_cached_or_injected");
        assert_eq!(value["members"][0]["finding"], "DisposeMember");
    }
}

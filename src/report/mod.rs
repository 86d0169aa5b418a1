//! Per-member disposal report over every source type.

pub mod format;

use std::path::PathBuf;

use rayon::prelude::*;
use serde::Serialize;

use crate::classify::{classify_creation, classify_provenance, Creation, ProvenanceRule, Target};
use crate::context::AnalysisContext;
use crate::disposal::{find_dispose_method, is_member_disposed};
use crate::errors::Result;
use crate::semantic::{SemanticModel, SymbolId, SymbolKind};
use crate::syntax::NodeKind;

pub use format::{render_json, render_text, ColorMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Finding {
    /// Created by the holder but never disposed.
    DisposeMember,
    /// Supplied from outside yet disposed by the holder.
    DisposingInjected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberReport {
    pub file: PathBuf,
    pub line: usize,
    #[serde(rename = "type")]
    pub type_name: String,
    pub member: String,
    pub creation: Creation,
    pub rule: ProvenanceRule,
    pub disposed: bool,
    pub finding: Option<Finding>,
}

impl MemberReport {
    fn finding(rule: ProvenanceRule, disposed: bool) -> Option<Finding> {
        match (rule, disposed) {
            (ProvenanceRule::CreatedAndNotCachedOrInjected, false) => Some(Finding::DisposeMember),
            (ProvenanceRule::NotCreatedButCachedOrInjected, true) => Some(Finding::DisposingInjected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub members: Vec<MemberReport>,
    /// Files left out because they did not parse.
    pub skipped: Vec<PathBuf>,
}

impl Report {
    pub fn has_dispose_member_findings(&self) -> bool {
        self.members.iter().any(|m| m.finding == Some(Finding::DisposeMember))
    }

    pub fn findings(&self) -> impl Iterator<Item = &MemberReport> {
        self.members.iter().filter(|m| m.finding.is_some())
    }
}

/// Reports every non-static field and property of a tracked type, across
/// all source types in parallel.
pub fn build_report(ctx: &AnalysisContext<'_>) -> Result<Report> {
    let types = source_types(ctx.model);
    log::info!("analyzing {} types", types.len());
    let per_type: Vec<Vec<MemberReport>> = types
        .par_iter()
        .map(|ty| report_type(ctx, *ty))
        .collect::<Result<_>>()?;
    let mut members: Vec<MemberReport> = per_type.into_iter().flatten().collect();
    members.sort_by(|a, b| (&a.file, a.line, &a.member).cmp(&(&b.file, b.line, &b.member)));
    Ok(Report {
        members,
        skipped: Vec::new(),
    })
}

fn source_types(model: &dyn SemanticModel) -> Vec<SymbolId> {
    let mut types = Vec::new();
    for tree in model.trees() {
        for id in tree.node_ids() {
            if !matches!(tree.node(id).kind, NodeKind::TypeDecl { .. }) {
                continue;
            }
            if let Some(ty) = model.declared_symbol(id) {
                if !types.contains(&ty) {
                    types.push(ty);
                }
            }
        }
    }
    types
}

fn report_type(ctx: &AnalysisContext<'_>, ty: SymbolId) -> Result<Vec<MemberReport>> {
    let model = ctx.model;
    let dispose = find_dispose_method(ctx, ty);
    let type_name = model.full_name(ty);
    let mut reports = Vec::new();
    for member in model.symbol_info(ty).members.iter().copied() {
        let info = model.symbol_info(member);
        if !matches!(info.kind, SymbolKind::Field | SymbolKind::Property)
            || info.is_static()
            || !ctx.is_tracked(info.ty.as_ref())
        {
            continue;
        }
        let Some(decl) = info.declarations.first().copied() else {
            continue;
        };
        let target = Target::Symbol(member);
        let creation = classify_creation(ctx, target)?;
        let rule = classify_provenance(ctx, target)?.rule();
        let disposed = match dispose {
            Some(method) => is_member_disposed(ctx, member, method)?,
            None => false,
        };
        let tree = model.tree(decl.tree);
        let (line, _) = tree.line_col(tree.node(decl).span.start);
        reports.push(MemberReport {
            file: tree.path().to_path_buf(),
            line,
            type_name: type_name.clone(),
            member: info.name.clone(),
            creation,
            rule,
            disposed,
            finding: MemberReport::finding(rule, disposed),
        });
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::semantic::Compilation;

    const SOURCE: &str = "
        using System;
        using System.IO;
        class Holder : IDisposable {
            private Stream _leaked = new MemoryStream();
            private Stream _closed = File.OpenRead(\"a\");
            private readonly Stream _given;
            private int _count;
            Holder(Stream given) { _given = given; }
            public void Dispose() { _closed.Dispose(); _given.Dispose(); }
        }";

    fn report() -> Report {
        let model = Compilation::from_sources(vec![("holder.cs", SOURCE)]).unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        build_report(&ctx).unwrap()
    }

    #[test]
    fn untracked_members_are_skipped() {
        let names: Vec<_> = report().members.iter().map(|m| m.member.clone()).collect();
        assert_eq!(names, vec!["_leaked", "_closed", "_given"]);
    }

    #[test]
    fn findings_follow_rule_and_disposal() {
        let report = report();
        let findings: Vec<_> = report.members.iter().map(|m| (m.member.as_str(), m.finding)).collect();
        assert_eq!(
            findings,
            vec![
                ("_leaked", Some(Finding::DisposeMember)),
                ("_closed", None),
                ("_given", Some(Finding::DisposingInjected)),
            ]
        );
        assert!(report.has_dispose_member_findings());
        assert_eq!(report.findings().count(), 2);
    }

    #[test]
    fn lines_are_one_based() {
        let report = report();
        assert_eq!(report.members[0].line, 5);
        assert_eq!(report.members[0].file, PathBuf::from("holder.cs"));
    }
}

//! Created versus supplied-from-outside.

use serde::Serialize;

use super::creation::{classify_creation, Target};
use super::origin::{Creation, OriginKind};
use super::sources::classify_all;
use crate::context::AnalysisContext;
use crate::errors::Result;
use crate::flow::member_path::peel;
use crate::semantic::{SemanticModel, SymbolId, SymbolKind};
use crate::syntax::{Accessibility, NodeKind};

/// The two independent provenance predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Provenance {
    /// Creation classified as `Yes`.
    pub created: bool,
    /// Some origin is injected, cached or passed in, or the symbol itself
    /// can be supplied from outside.
    pub cached_or_injected: bool,
}

/// Combinations of [`Provenance`] disposal rules are written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceRule {
    CreatedAndNotCachedOrInjected,
    CreatedAndInjected,
    NotCreatedButCachedOrInjected,
    Neither,
}

impl Provenance {
    pub fn rule(self) -> ProvenanceRule {
        match (self.created, self.cached_or_injected) {
            (true, false) => ProvenanceRule::CreatedAndNotCachedOrInjected,
            (true, true) => ProvenanceRule::CreatedAndInjected,
            (false, true) => ProvenanceRule::NotCreatedButCachedOrInjected,
            (false, false) => ProvenanceRule::Neither,
        }
    }

    pub fn satisfies(self, rule: ProvenanceRule) -> bool {
        self.rule() == rule
    }
}

pub fn classify_provenance(ctx: &AnalysisContext<'_>, target: Target) -> Result<Provenance> {
    let model = ctx.model;
    let created = classify_creation(ctx, target)? == Creation::Yes;
    let symbol = match target {
        Target::Symbol(symbol) => Some(symbol),
        Target::Expression(expr) => model.symbol(peel(model, expr)),
    };
    let cached_or_injected = symbol.is_some_and(|s| externally_supplied(model, s))
        || classify_all(ctx, target)?.iter().any(|origin| {
            matches!(
                origin.kind,
                OriginKind::Injected | OriginKind::PotentiallyInjected | OriginKind::Cached | OriginKind::Argument
            )
        });
    let provenance = Provenance {
        created,
        cached_or_injected,
    };
    log::debug!("provenance of {:?}: {:?}", target, provenance.rule());
    Ok(provenance)
}

/// Whether the symbol itself receives values from outside its type: any
/// parameter, or a member outside code can assign.
pub fn externally_supplied(model: &dyn SemanticModel, symbol: SymbolId) -> bool {
    match model.symbol_info(symbol).kind {
        SymbolKind::Parameter => true,
        SymbolKind::Field | SymbolKind::Property => externally_settable(model, symbol),
        _ => false,
    }
}

/// Non-private and mutable: outside code can replace the value.
pub fn externally_settable(model: &dyn SemanticModel, member: SymbolId) -> bool {
    let info = model.symbol_info(member);
    if info.accessibility == Accessibility::Private {
        return false;
    }
    match info.kind {
        SymbolKind::Field => !info.modifiers.readonly && !info.modifiers.is_const,
        SymbolKind::Property => match info.setter {
            Some(setter) => !matches!(
                model.kind(setter),
                NodeKind::Accessor { modifiers, .. } if modifiers.private
            ),
            None => info.has_setter,
        },
        _ => false,
    }
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
            private readonly Stream _owned = new MemoryStream();
            private readonly Stream _given;
            public Stream Settable { get; set; } = new MemoryStream();
            public Stream Guarded { get; private set; }
            private static Stream Shared;
            private Stream _cached;
            Holder(Stream given) { _given = given; _cached = Shared; Guarded = new MemoryStream(); }
            public void Dispose() { }
        }";

    fn provenance(name: &str) -> Provenance {
        let model = Compilation::from_sources(vec![("h.cs", SOURCE)]).unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);
        let holder = model.find_type("Holder").unwrap();
        let member = model.members_named(holder, name)[0];
        classify_provenance(&ctx, Target::Symbol(member)).unwrap()
    }

    #[test]
    fn owned_field_is_created_and_not_injected() {
        assert_eq!(provenance("_owned").rule(), ProvenanceRule::CreatedAndNotCachedOrInjected);
    }

    #[test]
    fn constructor_argument_is_injected() {
        let given = provenance("_given");
        assert!(!given.created);
        assert!(given.cached_or_injected);
        assert!(given.satisfies(ProvenanceRule::NotCreatedButCachedOrInjected));
    }

    #[test]
    fn public_setter_makes_a_member_injectable() {
        assert_eq!(provenance("Settable").rule(), ProvenanceRule::CreatedAndInjected);
        assert_eq!(provenance("Guarded").rule(), ProvenanceRule::CreatedAndNotCachedOrInjected);
    }

    #[test]
    fn static_reads_are_cached() {
        assert_eq!(provenance("_cached").rule(), ProvenanceRule::NotCreatedButCachedOrInjected);
    }
}

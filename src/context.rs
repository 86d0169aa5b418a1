//! Everything one analysis query reads: the semantic model, configuration,
//! the resolved capability interfaces and the cancellation token.

use crate::cancellation::CancellationToken;
use crate::classify::known::KnownApis;
use crate::config::AnalysisConfig;
use crate::errors::Result;
use crate::semantic::{SemanticModel, SymbolId, TypeRef};
use crate::syntax::TypeKind;

/// Whether values of a type can carry the tracked capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// The type implements a tracked interface.
    Tracked,
    /// A subtype might: `object`, interfaces, type parameters and types the
    /// model could not resolve.
    Possible,
    /// Structs, enums and classes outside the tracked hierarchy.
    Never,
}

pub struct AnalysisContext<'a> {
    pub model: &'a dyn SemanticModel,
    pub config: &'a AnalysisConfig,
    pub cancel: CancellationToken,
    tracked: Vec<SymbolId>,
    known: KnownApis,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(model: &'a dyn SemanticModel, config: &'a AnalysisConfig) -> Self {
        let tracked: Vec<SymbolId> = config
            .disposable_interfaces
            .iter()
            .filter_map(|name| {
                let found = model.find_type(name);
                if found.is_none() {
                    log::warn!("capability interface {} is not known to the model", name);
                }
                found
            })
            .collect();
        Self {
            model,
            config,
            cancel: CancellationToken::new(),
            tracked,
            known: KnownApis::new(config),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[inline]
    pub fn check(&self) -> Result<()> {
        self.cancel.check()
    }

    pub fn known(&self) -> &KnownApis {
        &self.known
    }

    pub fn is_tracked_type(&self, ty: SymbolId) -> bool {
        self.model
            .supertypes(ty)
            .iter()
            .any(|t| self.tracked.contains(t))
    }

    pub fn capability(&self, ty: Option<&TypeRef>) -> Capability {
        let Some(symbol) = ty.and_then(TypeRef::symbol) else {
            return Capability::Possible;
        };
        if self.is_tracked_type(symbol) {
            return Capability::Tracked;
        }
        let info = self.model.symbol_info(symbol);
        match info.type_kind {
            Some(TypeKind::Interface) => Capability::Possible,
            Some(TypeKind::Struct | TypeKind::Enum) => Capability::Never,
            _ if self.model.full_name(symbol) == "System.Object" => Capability::Possible,
            _ => Capability::Never,
        }
    }

    pub fn is_tracked(&self, ty: Option<&TypeRef>) -> bool {
        self.capability(ty) == Capability::Tracked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::Compilation;

    fn named(model: &Compilation, name: &str) -> TypeRef {
        TypeRef::named(model.find_type(name).unwrap())
    }

    #[test]
    fn capability_follows_the_type_hierarchy() {
        let model = Compilation::from_sources(vec![(
            "c.cs",
            "class Owner : System.IDisposable { public void Dispose() { } } class Plain { } struct Point { }",
        )])
        .unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&model, &config);

        assert_eq!(ctx.capability(Some(&named(&model, "System.IO.FileStream"))), Capability::Tracked);
        assert_eq!(ctx.capability(Some(&named(&model, "Owner"))), Capability::Tracked);
        assert_eq!(ctx.capability(Some(&named(&model, "Plain"))), Capability::Never);
        assert_eq!(ctx.capability(Some(&named(&model, "Point"))), Capability::Never);
        assert_eq!(ctx.capability(Some(&named(&model, "object"))), Capability::Possible);
        assert_eq!(ctx.capability(Some(&TypeRef::Parameter(0))), Capability::Possible);
        assert_eq!(ctx.capability(None), Capability::Possible);
    }

    #[test]
    fn configured_interfaces_replace_the_defaults() {
        let model = Compilation::from_sources(vec![("c.cs", "interface IHandle { } class H : IHandle { }")]).unwrap();
        let config = AnalysisConfig {
            disposable_interfaces: vec!["IHandle".to_string()],
            ..AnalysisConfig::default()
        };
        let ctx = AnalysisContext::new(&model, &config);
        assert!(ctx.is_tracked(Some(&named(&model, "H"))));
        assert!(!ctx.is_tracked(Some(&named(&model, "System.IO.Stream"))));
    }
}

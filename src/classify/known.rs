//! Ownership knowledge about specific members.
//!
//! Lookup order: configured `known_created` and `known_not_owned` entries,
//! then the catalog tag on the symbol, then a short denylist of APIs that
//! hand out values they keep owning.

use std::collections::HashSet;

use crate::config::AnalysisConfig;
use crate::semantic::{Ownership, SemanticModel, SymbolId};

/// Members whose containing type never transfers ownership of what they
/// return.
const NOT_OWNING_TYPES: &[&str] = &[
    "System.Linq.Enumerable",
    "System.Runtime.CompilerServices.ConditionalWeakTable",
];

/// Member names that never transfer ownership on external types.
const NOT_OWNING_MEMBERS: &[&str] = &["this[]", "GetEnumerator", "TryGetValue", "GetOrAdd"];

#[derive(Debug, Clone, Default)]
pub struct KnownApis {
    created: HashSet<String>,
    not_owned: HashSet<String>,
}

impl KnownApis {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            created: config.known_created.iter().cloned().collect(),
            not_owned: config.known_not_owned.iter().cloned().collect(),
        }
    }

    pub fn ownership(&self, model: &dyn SemanticModel, symbol: SymbolId) -> Ownership {
        let full_name = model.full_name(symbol);
        if self.created.contains(&full_name) {
            return Ownership::Created;
        }
        if self.not_owned.contains(&full_name) {
            return Ownership::NotOwned;
        }
        let info = model.symbol_info(symbol);
        if info.ownership != Ownership::Unspecified || !info.is_external() {
            return info.ownership;
        }
        let owner = model.containing_type(symbol).map(|ty| model.full_name(ty));
        if NOT_OWNING_MEMBERS.contains(&info.name.as_str())
            || owner.is_some_and(|owner| NOT_OWNING_TYPES.contains(&owner.as_str()))
        {
            return Ownership::NotOwned;
        }
        Ownership::Unspecified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::Compilation;

    fn member(model: &Compilation, ty: &str, name: &str) -> SymbolId {
        let ty = model.find_type(ty).unwrap();
        model.members_named(ty, name)[0]
    }

    #[test]
    fn configuration_overrides_the_catalog() {
        let model = Compilation::from_sources(vec![(
            "k.cs",
            "class Pool { public System.IO.Stream Rent() => null; }",
        )])
        .unwrap();
        let config = AnalysisConfig {
            known_created: vec!["Pool.Rent".to_string()],
            known_not_owned: vec!["System.IO.File.OpenRead".to_string()],
            ..AnalysisConfig::default()
        };
        let known = KnownApis::new(&config);
        assert_eq!(known.ownership(&model, member(&model, "Pool", "Rent")), Ownership::Created);
        assert_eq!(
            known.ownership(&model, member(&model, "System.IO.File", "OpenRead")),
            Ownership::NotOwned
        );
    }

    #[test]
    fn catalog_tags_and_denylist() {
        let model = Compilation::from_sources(Vec::<(&str, &str)>::new()).unwrap();
        let known = KnownApis::new(&AnalysisConfig::default());
        assert_eq!(
            known.ownership(&model, member(&model, "System.IO.File", "Create")),
            Ownership::Created
        );
        assert_eq!(
            known.ownership(&model, member(&model, "System.Linq.Enumerable", "Select")),
            Ownership::NotOwned
        );
        assert_eq!(
            known.ownership(&model, member(&model, "System.Object", "ToString")),
            Ownership::Unspecified
        );
    }
}

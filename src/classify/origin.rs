use serde::Serialize;

use crate::syntax::NodeId;

/// Where one value reaching a symbol comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginKind {
    /// Nothing more is known.
    Unknown,
    /// The value flows back into a node already on the current path.
    Recursion,
    /// Produced by external code with no ownership knowledge.
    External,
    /// Literal, `default`, `typeof`, `nameof`.
    Constant,
    /// `new`, array creation, collection initializer, or a factory known to
    /// return a fresh instance.
    Created,
    /// External call whose return type carries the tracked capability.
    PotentiallyCreated,
    /// Constructor parameter.
    Injected,
    /// Member that code outside the type can assign.
    PotentiallyInjected,
    /// Read of a member of this instance, expanded further.
    Member,
    /// Static state, another instance's member, or a non-owning accessor.
    Cached,
    /// Call into source code, expanded further.
    Calculated,
    /// Passed as a `ref` argument, expanded further.
    Ref,
    /// Written through an `out` argument, expanded further.
    Out,
    /// Method parameter with no known call site.
    Argument,
}

impl OriginKind {
    /// Terminal kinds end a chain; the others are intermediate steps the
    /// classifier expands.
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            OriginKind::Member | OriginKind::Calculated | OriginKind::Ref | OriginKind::Out
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValueOrigin {
    pub node: NodeId,
    pub kind: OriginKind,
}

impl ValueOrigin {
    pub fn new(node: NodeId, kind: OriginKind) -> Self {
        Self { node, kind }
    }
}

/// Answer to "could this value be a freshly created resource?".
///
/// Variants are ordered by how strongly they answer yes; [`Creation::join`]
/// is the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Creation {
    No,
    Maybe,
    Unknown,
    Yes,
}

impl Creation {
    /// Join of alternatives: `Yes` wins, then `Unknown`, then `Maybe`.
    pub fn join(self, other: Creation) -> Creation {
        self.max(other)
    }

    /// `left ?? right`: a decided left side (`Yes` or `Unknown`) is kept,
    /// otherwise the right side can only strengthen the answer.
    pub fn coalesce(self, right: Creation) -> Creation {
        if matches!(self, Creation::Yes | Creation::Unknown) {
            return self;
        }
        self.join(right)
    }

    /// Join of every value, stopping at the first `Yes`.
    pub fn fold(values: impl IntoIterator<Item = Creation>) -> Creation {
        let mut result = Creation::No;
        for value in values {
            result = result.join(value);
            if result == Creation::Yes {
                break;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn creation() -> impl Strategy<Value = Creation> {
        prop_oneof![
            Just(Creation::No),
            Just(Creation::Maybe),
            Just(Creation::Unknown),
            Just(Creation::Yes),
        ]
    }

    #[test]
    fn yes_wins_a_join() {
        assert_eq!(Creation::Unknown.join(Creation::Yes), Creation::Yes);
        assert_eq!(Creation::Maybe.join(Creation::Unknown), Creation::Unknown);
        assert_eq!(Creation::Maybe.join(Creation::No), Creation::Maybe);
        assert_eq!(Creation::fold([Creation::No, Creation::Maybe, Creation::No]), Creation::Maybe);
        assert_eq!(Creation::fold([Creation::Unknown, Creation::Yes]), Creation::Yes);
        assert_eq!(Creation::fold(Vec::new()), Creation::No);
    }

    #[test]
    fn coalesce_keeps_a_decided_left_side() {
        assert_eq!(Creation::Unknown.coalesce(Creation::Yes), Creation::Unknown);
        assert_eq!(Creation::No.coalesce(Creation::Yes), Creation::Yes);
        assert_eq!(Creation::Maybe.coalesce(Creation::Yes), Creation::Yes);
        assert_eq!(Creation::Yes.coalesce(Creation::No), Creation::Yes);
    }

    #[test]
    fn intermediate_kinds_are_not_terminal() {
        assert!(!OriginKind::Member.is_terminal());
        assert!(!OriginKind::Out.is_terminal());
        assert!(OriginKind::Injected.is_terminal());
        assert!(OriginKind::Recursion.is_terminal());
    }

    proptest! {
        #[test]
        fn join_is_commutative_and_associative(a in creation(), b in creation(), c in creation()) {
            prop_assert_eq!(a.join(b), b.join(a));
            prop_assert_eq!(a.join(b).join(c), a.join(b.join(c)));
        }

        #[test]
        fn coalesce_is_associative(a in creation(), b in creation(), c in creation()) {
            prop_assert_eq!(a.coalesce(b).coalesce(c), a.coalesce(b.coalesce(c)));
        }

        #[test]
        fn no_is_the_identity(a in creation()) {
            prop_assert_eq!(Creation::No.join(a), a);
            prop_assert_eq!(Creation::No.coalesce(a), a);
            prop_assert_eq!(a.coalesce(Creation::No), a);
        }

        #[test]
        fn fold_matches_pairwise_join(values in proptest::collection::vec(creation(), 0..8)) {
            let pairwise = values.iter().fold(Creation::No, |acc, v| acc.join(*v));
            prop_assert_eq!(Creation::fold(values), pairwise);
        }
    }
}

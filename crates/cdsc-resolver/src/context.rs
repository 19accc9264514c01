//! Reference contexts and their resolution policies.
//!
//! The syntactic position of a reference decides how its first path segment
//! is looked up. The context is derived from the document path alone; the
//! table in [`RefContext::semantics`] maps each context to a policy.

use serde::Serialize;
use std::fmt;

/// Syntactic position of a reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefContext {
    Type,
    Includes,
    Target,
    TargetAspect,
    From,
    Keys,
    Excluding,
    Expand,
    Inline,
    /// Filter condition inside a reference segment (`assoc[ where ... ]`).
    RefWhere,
    /// ON condition of an element outside queries.
    On,
    /// ON condition of an association published by a query column.
    QueryOn,
    /// ON condition of a mixin.
    MixinOn,
    /// ON condition of a join in `from`.
    JoinOn,
    Columns,
    Where,
    Having,
    GroupBy,
    OrderBy,
    OrderByExpr,
    OrderBySet,
    OrderBySetExpr,
    Annotation,
    /// Expression of a calculated element.
    Value,
    /// The path ends at a member declaration rather than a reference.
    Member,
}

/// Which enclosing query scopes are searched for table aliases and mixins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LexicalScopes {
    /// No lexical lookup at all, not even `$self`.
    None,
    /// Only `$self`/`$projection` and magic variables.
    DollarOnly,
    /// The current query and all enclosing ones.
    Full,
    /// Mixins are checked before table aliases at each level.
    FullMixinsFirst,
    /// Start at the scope enclosing the current query (`SET`-level `ORDER BY`).
    Enclosing,
}

/// Where the first segment is looked up when no lexical binding matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DynamicSource {
    Global,
    Parent,
    Target,
    Query,
    Source,
    Expand,
    Inline,
    RefTarget,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Semantics {
    pub lexical: LexicalScopes,
    pub dynamic: DynamicSource,
    /// Attach a navigation environment to the final link.
    pub env_on_last: bool,
}

const fn sem(lexical: LexicalScopes, dynamic: DynamicSource) -> Semantics {
    Semantics {
        lexical,
        dynamic,
        env_on_last: false,
    }
}

impl RefContext {
    pub fn semantics(&self) -> Semantics {
        use DynamicSource as D;
        use LexicalScopes as L;
        match self {
            RefContext::Type | RefContext::Includes | RefContext::Target | RefContext::TargetAspect => {
                sem(L::None, D::Global)
            }
            RefContext::From => Semantics {
                env_on_last: true,
                ..sem(L::None, D::Global)
            },
            RefContext::Keys => sem(L::None, D::Target),
            RefContext::Excluding => sem(L::None, D::Source),
            RefContext::Expand => sem(L::DollarOnly, D::Expand),
            RefContext::Inline => sem(L::DollarOnly, D::Inline),
            RefContext::RefWhere => sem(L::DollarOnly, D::RefTarget),
            RefContext::On | RefContext::Annotation | RefContext::Value => {
                sem(L::DollarOnly, D::Parent)
            }
            RefContext::QueryOn => sem(L::DollarOnly, D::Query),
            RefContext::MixinOn | RefContext::JoinOn | RefContext::Where => {
                sem(L::FullMixinsFirst, D::Source)
            }
            RefContext::Columns
            | RefContext::Having
            | RefContext::GroupBy
            | RefContext::OrderByExpr => sem(L::Full, D::Source),
            RefContext::OrderBy => sem(L::Full, D::Query),
            RefContext::OrderBySet => sem(L::Enclosing, D::Query),
            RefContext::OrderBySetExpr => sem(L::Enclosing, D::None),
            RefContext::Member => Semantics {
                env_on_last: true,
                ..sem(L::None, D::Parent)
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RefContext::Type => "type",
            RefContext::Includes => "includes",
            RefContext::Target => "target",
            RefContext::TargetAspect => "targetAspect",
            RefContext::From => "from",
            RefContext::Keys => "keys",
            RefContext::Excluding => "excluding",
            RefContext::Expand => "expand",
            RefContext::Inline => "inline",
            RefContext::RefWhere => "ref-where",
            RefContext::On => "on",
            RefContext::QueryOn => "query-on",
            RefContext::MixinOn => "mixin-on",
            RefContext::JoinOn => "join-on",
            RefContext::Columns => "columns",
            RefContext::Where => "where",
            RefContext::Having => "having",
            RefContext::GroupBy => "groupBy",
            RefContext::OrderBy => "orderBy",
            RefContext::OrderByExpr => "orderBy-expr",
            RefContext::OrderBySet => "orderBy-set",
            RefContext::OrderBySetExpr => "orderBy-set-expr",
            RefContext::Annotation => "annotation",
            RefContext::Value => "value",
            RefContext::Member => "member",
        }
    }

    /// Whether references in this context denote top-level definitions.
    pub fn is_global(&self) -> bool {
        self.semantics().dynamic == DynamicSource::Global
    }

    /// The context of an expression nested inside a reference in this
    /// context, e.g. the `xpr` of an `ORDER BY` item.
    pub fn nested_expression(&self) -> RefContext {
        match self {
            RefContext::OrderBy => RefContext::OrderByExpr,
            RefContext::OrderBySet => RefContext::OrderBySetExpr,
            other => *other,
        }
    }
}

impl fmt::Display for RefContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

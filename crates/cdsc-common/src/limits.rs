//! Centralized limits and thresholds for the schema compiler.
//!
//! Cycle detection in the resolver is done with explicit visited sets; the
//! limits here are a backstop against pathological but acyclic documents
//! (extremely long type chains, absurd query nesting) so a single request
//! cannot run away.

// =============================================================================
// Chain Lengths
// =============================================================================

/// Maximum number of links followed while walking a `type` / `$origin` chain.
///
/// A chain that exceeds this length without revisiting a node is reported
/// like a cycle. Real models rarely have chains longer than a handful of
/// links:
///
/// ```cds
/// type Amount : Decimal(15, 2);
/// type Price  : Amount;
/// entity Books { price : Price; }   // Books.price -> Price -> Amount -> Decimal
/// ```
pub const MAX_TYPE_CHAIN_LENGTH: usize = 1_000;

/// Maximum number of `items` wrappers unwrapped while computing a navigation
/// environment (`many many many Foo`).
pub const MAX_ITEMS_NESTING: usize = 64;

// =============================================================================
// Query Nesting
// =============================================================================

/// Maximum nesting depth of queries inside one definition (sub-queries in
/// `from`, correlated sub-queries in expressions, `SET` arms).
pub const MAX_QUERY_NESTING_DEPTH: usize = 256;

/// Maximum number of lexical scopes walked outward for one reference.
pub const MAX_SCOPE_WALK_ITERATIONS: usize = 10_000;

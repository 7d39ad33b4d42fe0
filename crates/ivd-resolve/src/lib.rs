//! Reference resolution for Ivaldi.
//!
//! Turns user input into a seal hash, trying strategies in a fixed order:
//!
//! 1. alias exact match
//! 2. memorable name exact match
//! 3. iteration token: `#N`, `#-N`, `<timeline>#N`
//! 4. full hex hash (with or without an `algo:` prefix)
//! 5. natural-language temporal expression
//! 6. author query: `<name>'s last commit`
//! 7. content query: `where <s> was added`, `the commit about <s>`
//!
//! Failure reports every strategy that was tried, in order.

pub mod error;
pub mod resolver;
pub mod temporal;

pub use error::{ResolveError, ResolveResult};
pub use resolver::Resolver;
pub use temporal::{parse_temporal, TemporalQuery};

//! Action primitives for the execution core
//!
//! One action runs through four phases against a resolved target:
//! - validate: the element is attached and enabled
//! - prepare: scrolled into view, visible, unobstructed
//! - dispatch: the browser interaction itself
//! - verify: the post-condition holds where one is defined
//!
//! Retry decisions between phases belong to `action-flow`.

pub mod errors;
pub mod interaction;
pub mod normalize;
mod primitives;
pub mod types;
mod waiting;

pub use errors::*;
pub use interaction::{navigation_target, Dispatch, Interaction};
pub use normalize::FieldKind;
pub use primitives::*;
pub use types::*;
pub use waiting::{prepare_target, validate_target};

//! Domain model for containers, children and the scopes they live in.
//!
//! # Responsibility
//! - Define the records shared by repositories, services and backup units.
//! - Keep placement attributes in one shape so inheritance copies stay
//!   field-for-field.
//!
//! # Invariants
//! - Every block owns exactly one scope of level `block`.
//! - A container is a block whose type is `multiblock`.

pub mod block;
pub mod layout;

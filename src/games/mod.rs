//! Game implementations for the TD trainer.
//!
//! Each game provides an [`Engine`](crate::td::Engine): move enumeration,
//! turn hand-over, terminal scoring and a feature encoding for the value
//! network.
//!
//! ## Available Games
//!
//! - [`nardi`]: Long Nardi, the 15-checker race game with no hitting
//!
//! ## Adding New Games
//!
//! 1. Create a new module under `src/games/`
//! 2. Define a hashable board type and its feature encoding
//! 3. Implement the `Engine` trait, stamping every enumeration
//! 4. Add tests for the rules and for `children_to_grandchildren`

pub mod nardi;

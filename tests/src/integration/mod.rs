//! Cross-crate integration scenarios.

#[cfg(test)]
mod fixtures;

mod delivery;
mod pipeline;

//! Bilateral symmetry expansion.
//!
//! A bilateral descriptor is declared once and built as two mirrored
//! concrete instances. Splitting is pure: no counters, no randomness, equal
//! input always yields equal output pairs. The two sides are retargeted
//! independently, because a single split request produces two instances
//! whose references must point at different concrete targets.

use crate::error::{BuildError, Result};
use rigguide_model::{ComponentDescriptor, Side};

/// The two concrete descriptors produced from one bilateral descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPair {
    pub left: ComponentDescriptor,
    pub right: ComponentDescriptor,
}

impl SplitPair {
    pub fn side(&self, side: Side) -> Option<&ComponentDescriptor> {
        match side {
            Side::Left => Some(&self.left),
            Side::Right => Some(&self.right),
            _ => None,
        }
    }
}

/// Expand a bilateral descriptor into its `Left`/`Right` pair.
///
/// Settings are deep-copied into both sides. Every outgoing connection
/// reference whose target is itself bilateral is retargeted to the side
/// being produced; references to concrete components pass through
/// untouched.
///
/// # Errors
///
/// `InvalidSplit` when the descriptor is not bilateral.
pub fn split(descriptor: &ComponentDescriptor) -> Result<SplitPair> {
    if descriptor.side != Side::Bilateral {
        return Err(BuildError::InvalidSplit(descriptor.key()));
    }

    Ok(SplitPair {
        left: concrete_side(descriptor, Side::Left),
        right: concrete_side(descriptor, Side::Right),
    })
}

fn concrete_side(descriptor: &ComponentDescriptor, side: Side) -> ComponentDescriptor {
    let mut out = descriptor.clone();
    out.side = side;
    for reference in out.connections.values_mut() {
        if let Some(target) = &reference.target {
            if target.is_bilateral() {
                reference.target = Some(target.with_side(side));
            }
        }
    }
    out
}

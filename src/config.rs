//! Prep-time and shot-time configuration.
//!
//! Plain data structs with a `Default` impl, constructed by the caller
//! and handed to the operation that needs them.

use std::env;

/// Default leaf size for the HLBVH builder (`RT_DEFAULT_MAX_PRIMS_IN_NODE`).
pub const DEFAULT_MAX_PRIMS_IN_NODE: usize = 8;

/// Ray/triangle grazing threshold (`BOT_MIN_DN`), below which a hit is
/// treated as a tangent graze rather than a crossing.
pub const BOT_MIN_DN: f32 = 1.0e-9;

/// Explicit traversal stack depth (`HLBVH_STACK_SIZE`).
pub const BVH_STACK_SIZE: usize = 256;

/// Initial hit-buffer capacity (`DA_INIT_CAPACITY`).
pub const HIT_BUFFER_INIT_CAPACITY: usize = 128;

/// Environment variable overriding the default leaf size at prep time.
pub const MAX_PRIMS_ENV_VAR: &str = "LIBRT_BOT_MAX_PRIMS_IN_NODE";

/// Configuration consumed by [`crate::prep::prep`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepConfig {
    /// Target maximum triangles per BVH leaf.
    pub max_prims_in_node: usize,
    /// Distance tolerance used for degenerate-triangle detection and bbox nudging.
    pub tolerance: f32,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            max_prims_in_node: DEFAULT_MAX_PRIMS_IN_NODE,
            tolerance: 1.0e-6,
        }
    }
}

impl PrepConfig {
    /// Build a config honoring `LIBRT_BOT_MAX_PRIMS_IN_NODE`, falling back
    /// to [`DEFAULT_MAX_PRIMS_IN_NODE`] if the variable is absent or does
    /// not parse as a positive integer.
    pub fn from_env(tolerance: f32) -> Self {
        let max_prims_in_node = match env::var(MAX_PRIMS_ENV_VAR) {
            Ok(val) => match val.parse::<usize>() {
                Ok(n) if n > 0 => n,
                Ok(_) | Err(_) => {
                    tracing::warn!(
                        value = %val,
                        "{} did not parse as a positive integer, using default of {}",
                        MAX_PRIMS_ENV_VAR,
                        DEFAULT_MAX_PRIMS_IN_NODE
                    );
                    DEFAULT_MAX_PRIMS_IN_NODE
                }
            },
            Err(_) => DEFAULT_MAX_PRIMS_IN_NODE,
        };
        Self {
            max_prims_in_node,
            tolerance,
        }
    }
}

/// Per-shot policy, analogous to the fields of `struct application` that the
/// BoT shot routine actually consults (`a_bot_reverse_normal_disabled`,
/// ray tolerance).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Application {
    /// When set, `BOT_UNORIENTED_NORM`'s flip-to-face-the-ray behavior is
    /// skipped and raw face/interpolated normals are returned untouched.
    pub reverse_normal_disabled: bool,
    /// Distance tolerance for this shot (duplicate-hit coalescing, etc).
    pub tolerance: f32,
}

impl Default for Application {
    fn default() -> Self {
        Self {
            reverse_normal_disabled: false,
            tolerance: 1.0e-6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_documented_defaults() {
        let cfg = PrepConfig::default();
        assert_eq!(cfg.max_prims_in_node, 8);
    }

    #[test]
    fn from_env_falls_back_when_unset() {
        // SAFETY: test runs single-threaded w.r.t. this var; no other test sets it.
        unsafe { env::remove_var(MAX_PRIMS_ENV_VAR) };
        let cfg = PrepConfig::from_env(1.0e-6);
        assert_eq!(cfg.max_prims_in_node, DEFAULT_MAX_PRIMS_IN_NODE);
    }

    #[test]
    fn from_env_honors_override() {
        unsafe { env::set_var(MAX_PRIMS_ENV_VAR, "4") };
        let cfg = PrepConfig::from_env(1.0e-6);
        assert_eq!(cfg.max_prims_in_node, 4);
        unsafe { env::remove_var(MAX_PRIMS_ENV_VAR) };
    }

    #[test]
    fn from_env_rejects_garbage() {
        unsafe { env::set_var(MAX_PRIMS_ENV_VAR, "not-a-number") };
        let cfg = PrepConfig::from_env(1.0e-6);
        assert_eq!(cfg.max_prims_in_node, DEFAULT_MAX_PRIMS_IN_NODE);
        unsafe { env::remove_var(MAX_PRIMS_ENV_VAR) };
    }
}

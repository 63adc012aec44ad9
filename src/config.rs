/// Tunable knobs for an [`Engine`](crate::Engine).
///
/// These replace the original implementation's hard-coded constants
/// (`nodesSize`, `growingSize`) with explicit, documented fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// The bucket count a freshly constructed `Engine` starts with. Must
    /// be a power of two.
    pub initial_buckets: usize,
    /// The factor a `Store`'s bucket count is multiplied by on growth.
    /// Must be a power of two; `2` is canonical.
    pub growth_mult: usize,
    /// `grow_threshold = buckets * grow_factor`: once a `Store`'s
    /// estimated live-insert count reaches this, a growth is armed.
    pub grow_factor: i64,
}

impl EngineConfig {
    /// Validate the power-of-two requirements this config's fields are
    /// under. Violations indicate a misconfigured caller, not a
    /// recoverable runtime condition.
    pub(crate) fn assert_valid(&self) {
        debug_assert!(
            self.initial_buckets.is_power_of_two(),
            "initial_buckets must be a power of two"
        );
        debug_assert!(
            self.growth_mult.is_power_of_two(),
            "growth_mult must be a power of two"
        );
        debug_assert!(self.grow_factor > 0, "grow_factor must be positive");
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            initial_buckets: 16,
            growth_mult: 2,
            grow_factor: 2,
        }
    }
}

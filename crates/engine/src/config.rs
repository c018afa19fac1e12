//! Engine configuration.
//!
//! Configuration is an explicit value passed into each component at
//! construction time; nothing in the engine reads ambient global state.

/// Tunable limits for the cart and coupon services.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Hard ceiling on the quantity of a single cart line, applied on top
    /// of available stock.
    pub max_qty_per_item: u32,
    /// Length of generated coupon codes.
    pub coupon_code_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_qty_per_item: 100,
            coupon_code_len: 10,
        }
    }
}

//! Workflow settings.

/// Settings shared by the billing workflows.
///
/// Built once at startup and handed to each service constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingConfig {
    /// Whether an order line may carry its own unit price instead of the
    /// catalog price.
    pub allow_price_override: bool,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            allow_price_override: true,
        }
    }
}

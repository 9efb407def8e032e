//! # Rainfall Exog Workspace
//!
//! Facade over the workspace crates:
//!
//! - [`sarimax_math`]: the seasonal ARIMAX estimator and its numerics
//! - [`exog_search`]: walk-forward search for exogenous rainfall predictors
//!
//! ## Example
//!
//! ```
//! use rainfall_exog_workspace::exog_search::subsets::enumerate_subsets;
//!
//! let candidates = vec!["Matale".to_string(), "Kandy".to_string()];
//! let subsets = enumerate_subsets(&candidates);
//! assert_eq!(subsets.len(), 3);
//! assert_eq!(subsets[0].to_string(), "(Matale, Kandy)");
//! ```

pub use exog_search;
pub use sarimax_math;

/// Version of the workspace facade
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facade_exposes_both_crates() {
        let order = sarimax_math::ModelOrder::new(1, 0, 1);
        let config = exog_search::SearchConfig::default();
        assert_eq!(config.order_for(&exog_search::HyperparamConfig::new(1, 1, 0, 0)).p, order.p);
        assert!(!VERSION.is_empty());
    }
}

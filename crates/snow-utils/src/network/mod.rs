//! Network rules, policies and IP presets

pub mod presets;
pub mod reconcile;
pub mod sql;

pub use presets::{IpPresets, PresetSelection};
pub use reconcile::{NetworkReconciler, UserNetwork};
pub use sql::{NetworkPolicySpec, NetworkRuleSpec};

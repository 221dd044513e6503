//! ABOUTME: Core traits, types, and error taxonomy shared across every ORBIT crate
//! ABOUTME: Foundation layer: GatewayError, ContextItem, and the Adapter capability

pub mod adapter;
pub mod context_item;
pub mod error;

pub use adapter::{
    Adapter, AdapterDescriptor, AdapterResult, AdapterType, FaultToleranceOverrides,
    RetrieveOptions,
};
pub use context_item::ContextItem;
pub use error::{GatewayError, QuotaPeriod, Result};

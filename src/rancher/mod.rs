pub mod client;
pub mod container;
pub mod context;
pub mod digest;
pub mod links;
pub mod service;
pub mod types;
pub mod wait;

pub use client::{Platform, RancherClient};
pub use container::RancherContainer;
pub use context::Context;
pub use service::{RancherService, ServiceKind};

//! Async client for quotr servers
//!
//! Built around FIFO request pipelining: the protocol answers requests in
//! arrival order, so many submitters can share one TCP connection without
//! request IDs. [`Pipeline`] is a single pipelined connection; [`Service`]
//! pools several and exposes a typed method per operation.
//!
//! # Example
//!
//! ```rust,ignore
//! use quotr_client::{Service, ServiceConfig};
//! use quotr_protocol::{QueryResponse, TtlType, ValueSize};
//!
//! let service = Service::connect(
//!     ServiceConfig::builder()
//!         .host("127.0.0.1")
//!         .port(9000)
//!         .value_size(ValueSize::U16)
//!         .build(),
//! )
//! .await?;
//!
//! service.insert("api:user:42", 60, TtlType::Seconds, 60).await?;
//! if let QueryResponse::Success { quota, .. } = service.query("api:user:42").await? {
//!     println!("remaining quota: {quota}");
//! }
//! service.close();
//! ```

pub mod error;
pub mod framing;
pub mod pipeline;
pub mod service;

pub use error::{Error, Result};
pub use framing::FrameReader;
pub use pipeline::{Pipeline, PipelineConfig, PipelineConfigBuilder};
pub use service::{Service, ServiceConfig, ServiceConfigBuilder};

pub use quotr_protocol as protocol;

//! This crate reads, upgrades and writes versioned kubeadm master
//! configuration documents.
//!
//! Every supported `apiVersion` of the `kubeadm.k8s.io` group converts to and
//! from one internal representation. A document is decoded in the version it
//! declares, converted into the internal representation, defaulted,
//! normalized and validated. It can then be rendered in any registered
//! version.
//!
//! ## Usage Guide
//!
//! ```
//! use kubeadm_config::{pipeline, scheme::SCHEME};
//!
//! let raw = b"apiVersion: kubeadm.k8s.io/v1alpha2
//! kind: MasterConfiguration
//! api:
//!   advertiseAddress: 192.168.2.2
//! ";
//!
//! let config = pipeline::process(raw, None).unwrap();
//! assert_eq!(config.api_endpoint.bind_port, Some(6443));
//!
//! let rendered = pipeline::render(&config, SCHEME.preferred_version()).unwrap();
//! assert!(rendered.starts_with("apiVersion: kubeadm.k8s.io/v1alpha3"));
//! ```

pub mod api_version;
pub mod apis;
pub mod convert;
pub mod decode;
pub mod defaults;
pub mod duration;
pub mod encode;
pub mod host;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod scheme;
pub mod validation;
pub mod version;
pub mod yaml;

pub use api_version::SchemaVersion;
pub use apis::internal::MasterConfiguration;
pub use pipeline::Pipeline;

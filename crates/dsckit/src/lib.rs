//! # dsckit
//!
//! Reconcile resources through PowerShell DSC.
//!
//! A resource type is described by a [`ResourceTypeDefinition`]. For each
//! call the [`Provider`] turns a [`DesiredState`] into an
//! [`InvocationDescriptor`], renders it into a PowerShell script, runs the
//! script in a persistent interpreter and maps the JSON it prints back into
//! canonical attributes.
//!
//! ## Core Concepts
//!
//! - **Attribute mapper**: desired state to DSC parameters and back
//!   (`dsc_` prefix, lowercase keys, lowercase enum values)
//! - **Script renderer**: three minijinja fragments (preamble, body, postscript)
//! - **Invoker**: executes scripts; [`SessionHandle`] keeps one interpreter alive
//! - **Diagnostics**: debug dumps and user-visible errors, separate from results
//!
//! ## Example
//!
//! ```ignore
//! use dsckit::{
//!     DesiredState, LogDiagnostics, PowerShellConfig, Provider, ResourceTypeDefinition,
//!     SessionHandle, TemplateRenderer,
//! };
//! use std::{path::Path, sync::Arc};
//!
//! let definition = Arc::new(ResourceTypeDefinition::load(Path::new("file.toml"))?);
//! let provider = Provider::new(
//!     definition,
//!     Box::new(TemplateRenderer::new()),
//!     SessionHandle::global(PowerShellConfig::default()),
//!     Path::new("/opt/dscbridge"),
//! );
//!
//! let filter = DesiredState::named("hosts").with("dsc_destinationpath", "/etc/hosts");
//! for result in provider.get(&LogDiagnostics, &[filter]) {
//!     println!("{:?}", result?);
//! }
//! ```

pub mod descriptor;
pub mod diagnostics;
pub mod error;
pub mod mapper;
pub mod provider;
pub mod render;
pub mod session;
pub mod types;

pub use descriptor::{InvocationDescriptor, Parameter, vendored_modules_path};
pub use diagnostics::{Diagnostics, LogDiagnostics, RecordingDiagnostics};
pub use error::{Error, ErrorCategory, Result};
pub use mapper::{canonical_key, canonicalize, to_parameters};
pub use provider::Provider;
pub use render::{ScriptRenderer, TemplateRenderer, TemplateSet};
pub use session::{Invoker, MockInvoker, PowerShellConfig, SessionHandle};
pub use types::{
    AttributeSpec, Attributes, CanonicalResult, DesiredState, ExecutionOutput, InvokeMethod,
    RawInvocationResult, ResourceTypeDefinition,
};

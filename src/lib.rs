//! Packaging and build orchestration for marker-based AR books.
//!
//! A request (cover, marker images, 3D models, activation key count) becomes
//! a signed-off Android debug APK plus a batch of activation keys:
//!
//! - **Marker codec** - Grayscale pattern matrices and optional NFT descriptors
//! - **Content assembly** - Package tree, web bundle, marker registry, keys
//! - **Project patching** - Identity overlay on the native Android project
//! - **Build executor** - Staged npm/Capacitor/Gradle run with storage fallback
//! - **Artifact resolution** - Locating and publishing the compiled APK
//!
//! # Architecture
//!
//! ```text
//! request ─► assemble ─────────► patch ─────────► executor ─────────► resolve
//!              │                   │                 │                   │
//!              ├── marker          ├── overlay       ├── storage         └── <out>/<name>/<name>.apk
//!              ├── convert         ├── templates     ├── classify
//!              └── activation      └── capacitor     └── lock
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use ar_packager::{PackagerConfig, RequestDraft};
//!
//! let config = PackagerConfig::load(None)?;
//! let request = draft.validate(&config.app_id_prefix)?;
//! let outcome = ar_packager::pipeline::spawn_build(config, request)?
//!     .join()
//!     .map_err(|_| anyhow::anyhow!("build thread panicked"))??;
//! ```

pub mod activation;
pub mod assemble;
pub mod config;
pub mod convert;
pub mod error;
pub mod executor;
pub mod fsutil;
pub mod marker;
pub mod naming;
pub mod patch;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod request;
pub mod resolve;

pub use assemble::{Assembler, PackageManifest};
pub use config::PackagerConfig;
pub use error::{FailureKind, PipelineError};
pub use executor::{BuildReport, Executor, Strategy};
pub use naming::{normalize_name, AppIdentity};
pub use pipeline::{spawn_build, Pipeline, PipelineOutcome};
pub use request::{ContentRequest, RequestDraft};
pub use resolve::Artifact;

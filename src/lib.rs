//! # gtg
//!
//! **gtg** generates HTTP transport code for plain Rust service traits. A trait
//! describes its wire contract in `/// @gtg ...` doc-comment directives; gtg
//! turns it into a server binding, a client implementing the same trait, an
//! error-to-status mapping, logging and metrics decorators, a recording mock,
//! and one aggregated OpenAPI document.
//!
//! ```rust,ignore
//! /// @gtg http-server http-client log swagger
//! /// @gtg title Items API
//! pub trait ItemService {
//!     /// @gtg method GET
//!     /// @gtg uri-path /items/{id}
//!     /// @gtg errors NotFound=404
//!     fn get_item(&self, id: String) -> Result<Item, ItemError>;
//! }
//! ```
//!
//! ## Architecture
//!
//! - **[`source`]** - Discovers `.rs` files and extracts traits and type declarations
//! - **[`directive`]** - Recognizes directive lines through a chain of recognizers
//! - **[`model`]** - Validates a trait into an immutable [`model::ServiceSpec`]
//! - **[`generator`]** - Processors, templates and the regeneration policy
//! - **[`document`]** - OpenAPI aggregation across services
//! - **[`config`]**, **[`logging`]**, **[`cli`]** - The `gtg` binary
//!
//! ```mermaid
//! sequenceDiagram
//!     participant CLI as gtg generate
//!     participant Source as source
//!     participant Model as model::ServiceBuilder
//!     participant Proc as generator processors
//!     participant Regen as generator::regen
//!     participant Doc as document::aggregate
//!
//!     CLI->>Source: discover_sources + parse_source
//!     Source-->>Model: InterfaceDecl + TypeIndex
//!     Model-->>CLI: ServiceSpec or GenError
//!     CLI->>Proc: render_service(spec)
//!     Proc-->>Regen: GeneratedFile set
//!     Regen->>Regen: classify, decide, write
//!     CLI->>Doc: swagger services
//!     Doc-->>CLI: swagger.yaml / swagger.json
//! ```
//!
//! Files without the generated marker on their first line are never
//! overwritten, and re-running over unchanged input writes nothing.

pub mod cli;
pub mod config;
pub mod directive;
pub mod document;
pub mod error;
pub mod generator;
pub mod logging;
pub mod model;
pub mod source;

pub use error::GenError;
pub use generator::{Generator, GeneratorOptions, RunReport};
pub use model::{ProcessorKind, ServiceSpec};

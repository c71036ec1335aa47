//! # page-forge – paginated HTML rendering
//!
//! The crate has two halves that talk through a small process protocol.
//!
//! The **converter** side prepares documents and drives rendering:
//!
//! - **Settings** – JSON configuration → [`RenderableDocument`] ([`settings`], [`document`])
//! - **Geometry** – page size, margins and header/footer bands ([`paper`], [`units`])
//! - **Sections** – per-page header/footer selection and placeholders ([`section`], [`placeholder`], [`page`])
//! - **Dispatch** – one backend process per output type, with a hard timeout ([`orchestrator`], [`protocol`], [`request`])
//! - **Anchors** – heading slugs and outlines ([`slug`], [`outline`])
//!
//! The **backend** side ([`backend`], run by the `forge-backend` binary)
//! turns one payload into one artifact:
//!
//! 1. **Parse** – HTML string → DOM tree ([`dom`])
//! 2. **Style** – inline styles and tag defaults ([`style`])
//! 3. **Flow** – block layout into atomic fragments ([`flow`], [`fonts`], [`assets`])
//! 4. **Paginate** – fragments onto pages ([`pagination`], [`layout_config`])
//! 5. **Render** – PDF via printpdf ([`render`]) or page images via tiny-skia ([`raster`])

pub mod assets;
pub mod backend;
pub mod document;
pub mod dom;
pub mod error;
pub mod flow;
pub mod fonts;
pub mod layout_config;
pub mod orchestrator;
pub mod outline;
pub mod page;
pub mod pagination;
pub mod paper;
pub mod placeholder;
pub mod protocol;
pub mod raster;
pub mod render;
pub mod request;
pub mod section;
pub mod settings;
pub mod slug;
pub mod style;
pub mod units;

// Re-exports for convenience
pub use document::{RenderableDocument, TocSettings};
pub use error::{ConversionError, Result};
pub use orchestrator::{Conversion, Converter};
pub use page::PageContext;
pub use protocol::{BackendConfig, BackendDriver};
pub use request::{OutputType, RenderRequest};
pub use section::{Edge, Section, SectionSet};
pub use settings::Settings;
pub use slug::SlugRegistry;

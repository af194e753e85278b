//! Mobile view subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → site.rs (mark mobile hosts, build the per-request context)
//!     → signals.rs (headers, cookies, query, extensions)
//!     → resolver.rs (ordered evaluator chain → Mode)
//!     → context.rs (mode, vary keys, analytics for the rest of the request)
//!
//! Around the upstream call:
//!     → toggle.rs (view switch cookies and redirects)
//!     → skin.rs (skin hint for the upstream)
//!     → url_template.rs (desktop ↔ mobile URLs)
//!     → features.rs (config blob for mobile pages)
//! ```

pub mod analytics;
pub mod context;
pub mod evaluators;
pub mod features;
pub mod mode;
pub mod pages;
pub mod resolver;
pub mod signals;
pub mod site;
pub mod skin;
pub mod toggle;
pub mod url_template;
pub mod user_agent;
pub mod vary;

pub use context::MobileContext;
pub use mode::Mode;
pub use resolver::{MobileViewResolver, Resolution};
pub use signals::{ForceMobileView, RequestSignals};
pub use site::MobileSite;
pub use url_template::{TemplateError, UrlTemplate, UrlTranslator};

//! Pagination, page projection, and chapter orchestration for `folio`.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod render_engine;
mod render_ir;
mod render_layout;

pub use folio::StyleTag;
pub use render_engine::{
    PreparedChapter, RenderDiagnostic, RenderEngine, RenderEngineOptions, RenderError,
};
pub use render_ir::{is_partition, project_page, project_styles, Page, PageView, StyleSpan};
pub use render_layout::{FixedAdvanceMetrics, LayoutConfig, Paginator, TextMetrics, Viewport};

//! Expression evaluation, the formatter registry, and the directive-tree
//! executor that together turn a parsed directive document plus render
//! data into final document XML (spec.md components D, E, F, G).

pub mod eval;
pub mod exec;
pub mod format;
pub mod scope;
pub mod value;

pub use exec::{execute, ExecError, ExecOutput, StylingEmit};
pub use format::{FormatError, FormatterRegistry};
pub use value::{Record, Styling, Value};

#[derive(Debug)]
pub enum RenderError {
    Directive(dtx_directive::DirectiveError),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Directive(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RenderError {}

pub struct RenderOutput {
    pub xml: String,
    pub errors: Vec<ExecError>,
}

/// Runs the full B→C→D/E/F→G pipeline over one document part's raw XML:
/// normalize run fragmentation, parse the directive tree, execute it
/// against `data`, then strip now-empty table rows left behind by a
/// falsy `#if` or an empty `#each`.
pub fn render_document(
    xml: &str,
    data: Record,
    max_merge_iterations: u32,
    styling: StylingEmit,
) -> Result<RenderOutput, RenderError> {
    let normalized = dtx_xml::normalize(xml, max_merge_iterations);
    let doc = dtx_directive::parse(&normalized).map_err(RenderError::Directive)?;
    let exec_out = execute(&doc, data, &normalized, styling);
    let cleaned = dtx_xml::strip_empty_rows(&exec_out.xml);
    Ok(RenderOutput {
        xml: cleaned,
        errors: exec_out.errors,
    })
}

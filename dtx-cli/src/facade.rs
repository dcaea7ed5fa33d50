//! The facade (spec.md component I): composes the archive codec, markup
//! normalizer, directive parser, and executor into `render`/`render_batch`/
//! `validate` entry points.

use thiserror::Error;

use dtx_archive::{Archive, ArchiveError};
use dtx_template::{ExecError, Record, RenderError};
use dtx_validate::Report;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum FacadeError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

pub struct RenderSuccess {
    pub bytes: Vec<u8>,
    pub warnings: Vec<ExecError>,
}

/// Renders one document against one data record and returns the
/// repacked archive bytes, plus any node-level warnings the executor
/// recovered from.
pub fn render(input: &[u8], data: Record, config: &Config) -> Result<RenderSuccess, FacadeError> {
    let mut archive = Archive::open(input)?;
    let xml = archive.read_main()?;
    let output = dtx_template::render_document(
        &xml,
        data,
        config.max_merge_iterations,
        config.styling_emit,
    )?;
    archive.write_main(output.xml);
    let bytes = archive.pack()?;
    Ok(RenderSuccess {
        bytes,
        warnings: output.errors,
    })
}

/// Renders the same template against many data records. Documents are
/// processed in fixed-size chunks with a configurable delay between
/// chunks — a synchronous throttle, not a worker pool, since the facade
/// makes no promise about render latency beyond "one archive at a time".
pub fn render_batch(
    input: &[u8],
    data: Vec<Record>,
    config: &Config,
) -> Vec<Result<RenderSuccess, FacadeError>> {
    let mut results = Vec::with_capacity(data.len());
    for chunk in data.chunks(config.batch_chunk_size.max(1)) {
        for record in chunk {
            results.push(render(input, record.clone(), config));
        }
        if config.batch_delay_ms > 0 {
            std::thread::sleep(std::time::Duration::from_millis(config.batch_delay_ms));
        }
    }
    results
}

/// Validates every renderable part of an archive without any render data,
/// concatenating diagnostics from each part scanned.
pub fn validate(input: &[u8]) -> Result<Report, FacadeError> {
    let mut archive = Archive::open(input)?;
    let xml = archive.read_main()?;
    Ok(dtx_validate::validate(&xml))
}

//! Raster output through the Graphviz `dot` binary.

use crate::RenderError;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Render DOT source to a PNG file by piping it through `dot -Tpng`.
pub fn render_png(dot: &str, output: &Path) -> Result<(), RenderError> {
    render_with("dot", dot, "png", output)
}

/// Render DOT source with an explicit Graphviz binary and output format.
pub fn render_with(
    program: &str,
    dot: &str,
    format: &str,
    output: &Path,
) -> Result<(), RenderError> {
    debug!(program, format, output = %output.display(), "invoking graphviz");
    let mut child = Command::new(program)
        .arg(format!("-T{}", format))
        .arg("-o")
        .arg(output)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RenderError::GraphvizMissing
            } else {
                RenderError::Spawn(e)
            }
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(dot.as_bytes())
            .map_err(RenderError::Spawn)?;
    }

    let result = child.wait_with_output().map_err(RenderError::Spawn)?;
    if !result.status.success() {
        return Err(RenderError::Graphviz {
            status: result.status.to_string(),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Write already-rendered text output to a file.
pub fn write_text(content: &str, output: &Path) -> Result<(), RenderError> {
    std::fs::write(output, content).map_err(|source| RenderError::Write {
        path: output.to_path_buf(),
        source,
    })
}

//! Picking an engine for a guest program and running it behind a relay.

use bytes::Bytes;

use crate::error::AppError;
use crate::host::RunReport;
use crate::js_engine::JsHost;
use crate::relay::{self, OutputSurface, RelayHandle};
use crate::wasm_engine::WasmHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeType {
    JavaScript,
    WebAssembly,
}

impl CodeType {
    /// Determine the code type from a file name or URL path.
    pub fn from_path(path: &str) -> Option<Self> {
        if path.ends_with(".js") {
            Some(CodeType::JavaScript)
        } else if path.ends_with(".wasm") || path.ends_with(".wat") {
            Some(CodeType::WebAssembly)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CodeType::JavaScript => "javascript",
            CodeType::WebAssembly => "webassembly",
        }
    }
}

/// Run `code` with its output relayed onto `surface`.
///
/// Returns the run report together with the relay, so callers can read the
/// unterminated tail and counters afterwards.
pub fn execute<S>(
    code_type: CodeType,
    code: &[u8],
    surface: S,
) -> Result<(RunReport, RelayHandle<S>), AppError>
where
    S: OutputSurface + Send + 'static,
{
    match code_type {
        CodeType::WebAssembly => {
            let mut host = WasmHost::new();
            let relay = relay::configure(&mut host, surface);
            let report = host.run(code)?;
            Ok((report, relay))
        }
        CodeType::JavaScript => {
            let source = std::str::from_utf8(code).map_err(|e| {
                AppError::Internal(format!(
                    "Failed to convert downloaded code to string: {}",
                    e
                ))
            })?;
            let mut host = JsHost::new()?;
            let relay = relay::configure(&mut host, surface);
            let report = host.run(source)?;
            Ok((report, relay))
        }
    }
}

/// Load a guest from a local path or an http(s) URL, blocking.
pub fn load_source(source: &str) -> Result<(CodeType, Bytes), AppError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let url = url::Url::parse(source)
            .map_err(|e| AppError::Internal(format!("Invalid URL '{}': {}", source, e)))?;
        let code_type = CodeType::from_path(url.path())
            .ok_or_else(|| AppError::UnsupportedCodeType(source.to_string()))?;
        let code = reqwest::blocking::get(url)?.error_for_status()?.bytes()?;
        return Ok((code_type, code));
    }

    let code_type = CodeType::from_path(source)
        .ok_or_else(|| AppError::UnsupportedCodeType(source.to_string()))?;
    let code = std::fs::read(source)
        .map_err(|e| AppError::Internal(format!("Failed to read '{}': {}", source, e)))?;
    Ok((code_type, Bytes::from(code)))
}

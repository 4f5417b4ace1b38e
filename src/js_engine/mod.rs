mod ffis;

use crate::error::AppError;
use crate::host::{HandlerSlot, OutputHost, RunReport, WriteHandler};
use rquickjs::{Context, Ctx, Result as QuickJsResult, Runtime, Value};

/// Runs JavaScript guests on QuickJS and routes their output to a registered
/// handler.
pub struct JsHost {
    runtime: Runtime,
    output: HandlerSlot,
}

impl JsHost {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            runtime: Runtime::new()?,
            output: HandlerSlot::new(),
        })
    }

    /// Evaluate a script in a fresh context.
    ///
    /// The report's `output` is the script's completion value rendered as a
    /// string. An uncaught exception becomes [`AppError::JsException`].
    pub fn run(&self, source: &str) -> Result<RunReport, AppError> {
        tracing::info!(size = source.len(), "running JavaScript guest");
        let start_time = std::time::Instant::now();

        let context = Context::full(&self.runtime)?;
        let output = self.output.clone();

        let result = context.with(|ctx| -> QuickJsResult<Result<String, String>> {
            ffis::register_to_globals_with_output(&ctx, output)?;

            match ctx.eval::<Value, _>(source) {
                Ok(value) => render_value(&ctx, value).map(Ok),
                Err(rquickjs::Error::Exception) => Ok(Err(describe_exception(&ctx))),
                Err(e) => Err(e),
            }
        })?;

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        tracing::info!(elapsed_ms, "JavaScript guest finished");

        result
            .map(|output| RunReport { output, elapsed_ms })
            .map_err(AppError::JsException)
    }
}

fn render_value<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> QuickJsResult<String> {
    let rendered = match value.type_of() {
        rquickjs::Type::String => match value.as_string() {
            Some(s) => s.to_string()?,
            None => String::new(),
        },
        rquickjs::Type::Int => value.as_int().map(|v| v.to_string()).unwrap_or_default(),
        rquickjs::Type::Bool => value.as_bool().map(|v| v.to_string()).unwrap_or_default(),
        rquickjs::Type::Float => value.as_float().map(|v| v.to_string()).unwrap_or_default(),
        rquickjs::Type::Null => "null".to_string(),
        rquickjs::Type::Undefined => "undefined".to_string(),
        rquickjs::Type::Array | rquickjs::Type::Object => match ctx.json_stringify(value)? {
            Some(json) => json.to_string()?,
            None => "undefined".to_string(),
        },
        other => format!("Execution resulted in a non-primitive type: {:?}", other),
    };
    Ok(rendered)
}

fn describe_exception(ctx: &Ctx<'_>) -> String {
    let caught = ctx.catch();
    if let Some(exception) = caught.as_exception() {
        if let Some(message) = exception.message() {
            return message;
        }
    }
    if let Some(s) = caught.as_string().and_then(|s| s.to_string().ok()) {
        return s;
    }
    format!("{:?}", caught)
}

impl OutputHost for JsHost {
    fn set_output_handler(
        &mut self,
        handler: Box<dyn WriteHandler>,
    ) -> Option<Box<dyn WriteHandler>> {
        self.output.set_output_handler(handler)
    }
}

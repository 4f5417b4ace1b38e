mod ffis;

use crate::error::AppError;
use crate::host::{HandlerSlot, OutputHost, RunReport, WriteHandler};
use wasmtime::{Engine, Linker, Memory, Module, Store};

/// Per-instance state reachable from host imports.
pub struct WasmCtx {
    /// The guest's exported memory, set right after instantiation
    pub memory: Option<Memory>,
    /// Where guest writes are forwarded
    pub output: HandlerSlot,
}

/// Runs WebAssembly guests and routes their output to a registered handler.
pub struct WasmHost {
    engine: Engine,
    output: HandlerSlot,
}

impl Default for WasmHost {
    fn default() -> Self {
        Self::new()
    }
}

impl WasmHost {
    pub fn new() -> Self {
        Self {
            engine: Engine::default(),
            output: HandlerSlot::new(),
        }
    }

    /// Compile and run a module.
    ///
    /// # Arguments
    ///
    /// * `code` - module bytes, either binary WebAssembly or WAT text
    ///
    /// # Returns
    ///
    /// * `Result<RunReport, AppError>` - whether `_start` ran, and how long it all took
    pub fn run(&self, code: &[u8]) -> Result<RunReport, AppError> {
        tracing::info!(size = code.len(), "running WebAssembly guest");
        let start_time = std::time::Instant::now();

        let ctx = WasmCtx {
            memory: None,
            output: self.output.clone(),
        };
        let mut store = Store::new(&self.engine, ctx);
        let mut linker = Linker::new(&self.engine);

        ffis::register_linker_functions(&mut linker).map_err(|e| {
            AppError::Internal(format!("Failed to register linker functions: {}", e))
        })?;

        let module = Module::new(&self.engine, code)?;
        let instance = linker.instantiate(&mut store, &module)?;

        if let Some(wasmtime::Extern::Memory(mem)) = instance.get_export(&mut store, "memory") {
            store.data_mut().memory = Some(mem);
        } else {
            return Err(AppError::Internal(
                "WASM module does not export 'memory'".to_string(),
            ));
        }

        let output = match instance.get_typed_func::<(), ()>(&mut store, "_start") {
            Ok(start_func) => {
                start_func
                    .call(&mut store, ())
                    .map_err(AppError::Wasmtime)?;
                "WASM module executed (_start)".to_string()
            }
            Err(_) => "WASM module instantiated (no _start called or found)".to_string(),
        };

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        tracing::info!(elapsed_ms, "WebAssembly guest finished");
        Ok(RunReport { output, elapsed_ms })
    }
}

impl OutputHost for WasmHost {
    fn set_output_handler(
        &mut self,
        handler: Box<dyn WriteHandler>,
    ) -> Option<Box<dyn WriteHandler>> {
        self.output.set_output_handler(handler)
    }
}

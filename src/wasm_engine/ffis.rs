//! # WebAssembly host imports
//!
//! Functions the guest can import from the `env` module. Output goes through
//! the [`HandlerSlot`] held in [`WasmCtx`]; nothing here knows about lines or
//! surfaces.

use anyhow::{anyhow, Result as AnyhowResult};
use std::time::{SystemTime, UNIX_EPOCH};
use wasmtime::{Caller, Extern, Linker, Memory};

use super::WasmCtx;

const STDOUT: u32 = 1;
const STDERR: u32 = 2;

/// The guest's exported memory.
///
/// Falls back to a lookup through the caller while the module's own start
/// function runs, before instantiation has returned and `WasmCtx` is filled.
fn guest_memory(caller: &mut Caller<'_, WasmCtx>, import: &str) -> AnyhowResult<Memory> {
    if let Some(memory) = caller.data().memory {
        return Ok(memory);
    }
    caller
        .get_export("memory")
        .and_then(Extern::into_memory)
        .ok_or_else(|| anyhow!("{import}: guest does not export 'memory'"))
}

/// Copy `len` bytes at `ptr` out of the guest's exported memory.
fn read_guest_bytes(
    caller: &mut Caller<'_, WasmCtx>,
    import: &str,
    ptr: u32,
    len: u32,
) -> AnyhowResult<Vec<u8>> {
    let memory = guest_memory(caller, import)?;
    let start = ptr as usize;
    let end = start
        .checked_add(len as usize)
        .ok_or_else(|| anyhow!("{import}: pointer/length overflow"))?;
    memory
        .data(&*caller)
        .get(start..end)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| anyhow!("{import}: pointer/length out of bounds"))
}

fn relay_write(
    caller: &mut Caller<'_, WasmCtx>,
    import: &str,
    fd: u32,
    ptr: u32,
    len: u32,
) -> AnyhowResult<usize> {
    let bytes = read_guest_bytes(caller, import, ptr, len)?;
    Ok(caller.data().output.dispatch(fd, &bytes))
}

/// Register the host imports with the linker.
///
/// `write` is the raw hook; `capture_stdout` and `capture_stderr` are
/// shorthands for descriptors 1 and 2.
pub fn register_linker_functions(linker: &mut Linker<WasmCtx>) -> AnyhowResult<()> {
    linker.func_wrap(
        "env",
        "write",
        |mut caller: Caller<'_, WasmCtx>, fd: u32, ptr: u32, len: u32| -> AnyhowResult<i32> {
            let consumed = relay_write(&mut caller, "write", fd, ptr, len)?;
            i32::try_from(consumed).map_err(|_| anyhow!("write: byte count exceeds i32"))
        },
    )?;

    linker.func_wrap(
        "env",
        "capture_stdout",
        |mut caller: Caller<'_, WasmCtx>, ptr: u32, len: u32| -> AnyhowResult<()> {
            relay_write(&mut caller, "capture_stdout", STDOUT, ptr, len)?;
            Ok(())
        },
    )?;

    linker.func_wrap(
        "env",
        "capture_stderr",
        |mut caller: Caller<'_, WasmCtx>, ptr: u32, len: u32| -> AnyhowResult<()> {
            relay_write(&mut caller, "capture_stderr", STDERR, ptr, len)?;
            Ok(())
        },
    )?;

    linker.func_wrap(
        "env",
        "app_log",
        |mut caller: Caller<'_, WasmCtx>,
         level_ptr: u32,
         level_len: u32,
         msg_ptr: u32,
         msg_len: u32|
         -> AnyhowResult<()> {
            let level_bytes =
                read_guest_bytes(&mut caller, "app_log", level_ptr, level_len)?;
            let level = std::str::from_utf8(&level_bytes)
                .map_err(|_| anyhow!("app_log: level not valid UTF-8"))?;
            let msg_bytes = read_guest_bytes(&mut caller, "app_log", msg_ptr, msg_len)?;
            let msg = std::str::from_utf8(&msg_bytes)
                .map_err(|_| anyhow!("app_log: message not valid UTF-8"))?;
            crate::telemetry::guest_log(level, msg);
            Ok(())
        },
    )?;

    linker.func_wrap(
        "env",
        "get_unixtime",
        |_caller: Caller<'_, WasmCtx>| -> AnyhowResult<u64> {
            match SystemTime::now().duration_since(UNIX_EPOCH) {
                Ok(n) => Ok(n.as_secs()),
                Err(_) => Err(anyhow!("get_unixtime: Failed to get system time")),
            }
        },
    )?;

    Ok(())
}

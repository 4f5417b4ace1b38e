use rquickjs::{Ctx, Function, Result as QuickJsResult};

use crate::host::HandlerSlot;

const STDOUT: u32 = 1;

/// Script-side half of the globals. `fs.writeSync` is the write hook the guest
/// sees; console output is routed through it.
const PRELUDE: &str = r#"
(function () {
    const render = (args) => args.map(arg =>
        typeof arg === 'object' ? JSON.stringify(arg) : String(arg)
    ).join(' ');

    const toBytes = (data) => {
        if (data instanceof ArrayBuffer) {
            return Array.from(new Uint8Array(data));
        }
        if (ArrayBuffer.isView(data)) {
            return Array.from(new Uint8Array(data.buffer, data.byteOffset, data.byteLength));
        }
        if (Array.isArray(data)) {
            for (const b of data) {
                if (!Number.isInteger(b) || b < 0 || b > 255) {
                    throw new TypeError('fs.writeSync: byte value out of range: ' + b);
                }
            }
            return data;
        }
        throw new TypeError('fs.writeSync: expected a string, ArrayBuffer, typed array or byte array');
    };

    globalThis.fs = {
        writeSync(fd, data) {
            if (typeof data === 'string') {
                return __lineout_write_str(fd, data);
            }
            return __lineout_write_bytes(fd, toBytes(data));
        }
    };

    if (typeof globalThis.console === 'undefined') {
        globalThis.console = {};
    }
    console.log = (...args) => { fs.writeSync(1, render(args) + '\n'); };
    console.error = (...args) => { fs.writeSync(2, render(args) + '\n'); };

    globalThis.app_log = (level, message) =>
        __lineout_log(String(level || 'info'), String(message === undefined ? '' : message));
    globalThis.get_unixtime = () => Math.floor(Date.now() / 1000);
})();
"#;

fn consumed(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Install the output hook and helper functions on the context's globals.
pub fn register_to_globals_with_output<'js>(
    ctx: &Ctx<'js>,
    output: HandlerSlot,
) -> QuickJsResult<()> {
    let globals = ctx.globals();

    let str_slot = output.clone();
    globals.set(
        "__lineout_write_str",
        Function::new(ctx.clone(), move |fd: i32, text: String| -> QuickJsResult<i32> {
            let fd = u32::try_from(fd).unwrap_or(STDOUT);
            Ok(consumed(str_slot.dispatch(fd, text.as_bytes())))
        })?,
    )?;

    let bytes_slot = output;
    globals.set(
        "__lineout_write_bytes",
        Function::new(
            ctx.clone(),
            move |fd: i32, data: Vec<i32>| -> QuickJsResult<i32> {
                let fd = u32::try_from(fd).unwrap_or(STDOUT);
                let bytes = data
                    .into_iter()
                    .map(u8::try_from)
                    .collect::<Result<Vec<u8>, _>>()
                    .map_err(|_| rquickjs::Error::new_from_js("number", "u8"))?;
                Ok(consumed(bytes_slot.dispatch(fd, &bytes)))
            },
        )?,
    )?;

    globals.set(
        "__lineout_log",
        Function::new(
            ctx.clone(),
            |level: String, message: String| -> QuickJsResult<()> {
                crate::telemetry::guest_log(&level, &message);
                Ok(())
            },
        )?,
    )?;

    ctx.eval::<(), _>(PRELUDE)?;
    Ok(())
}

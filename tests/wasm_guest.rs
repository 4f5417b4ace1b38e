use lineout::relay::SharedSurface;
use lineout::wasm_engine::WasmHost;
use lineout::{configure, AppError};

const LINE_IN_PIECES: &str = r#"
(module
  (import "env" "write" (func $write (param i32 i32 i32) (result i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "hello")
  (data (i32.const 16) " world\n")
  (data (i32.const 32) "a\nb\nc")
  (func (export "_start")
    (drop (call $write (i32.const 1) (i32.const 0) (i32.const 5)))
    (drop (call $write (i32.const 1) (i32.const 16) (i32.const 7)))
    (drop (call $write (i32.const 1) (i32.const 32) (i32.const 5)))))
"#;

#[test]
fn writes_are_relayed_as_whole_lines() {
    let mut host = WasmHost::new();
    let surface = SharedSurface::new();
    let relay = configure(&mut host, surface.clone());

    let report = host.run(LINE_IN_PIECES.as_bytes()).unwrap();

    assert_eq!(report.output, "WASM module executed (_start)");
    assert_eq!(surface.contents(), "hello world\na\nb\n");
    assert_eq!(relay.pending(), "c");
    assert_eq!(relay.stats().bytes_received, 17);
    assert_eq!(relay.stats().lines_flushed, 3);
}

#[test]
fn character_split_across_writes_survives() {
    let wat = r#"
    (module
      (import "env" "write" (func $write (param i32 i32 i32) (result i32)))
      (memory (export "memory") 1)
      (data (i32.const 0) "caf\c3\a9\n")
      (func (export "_start")
        (drop (call $write (i32.const 1) (i32.const 0) (i32.const 4)))
        (drop (call $write (i32.const 1) (i32.const 4) (i32.const 2)))))
    "#;
    let mut host = WasmHost::new();
    let surface = SharedSurface::new();
    configure(&mut host, surface.clone());

    host.run(wat.as_bytes()).unwrap();

    assert_eq!(surface.contents(), "café\n");
}

#[test]
fn stdout_and_stderr_share_one_relay() {
    let wat = r#"
    (module
      (import "env" "capture_stdout" (func $out (param i32 i32)))
      (import "env" "capture_stderr" (func $err (param i32 i32)))
      (memory (export "memory") 1)
      (data (i32.const 0) "out ")
      (data (i32.const 8) "err\n")
      (func (export "_start")
        (call $out (i32.const 0) (i32.const 4))
        (call $err (i32.const 8) (i32.const 4))))
    "#;
    let mut host = WasmHost::new();
    let surface = SharedSurface::new();
    configure(&mut host, surface.clone());

    host.run(wat.as_bytes()).unwrap();

    assert_eq!(surface.contents(), "out err\n");
}

#[test]
fn output_without_a_relay_is_dropped() {
    let host = WasmHost::new();
    let report = host.run(LINE_IN_PIECES.as_bytes()).unwrap();
    assert_eq!(report.output, "WASM module executed (_start)");
}

#[test]
fn module_without_start_is_only_instantiated() {
    let wat = r#"(module (memory (export "memory") 1))"#;
    let mut host = WasmHost::new();
    let surface = SharedSurface::new();
    let relay = configure(&mut host, surface.clone());

    let report = host.run(wat.as_bytes()).unwrap();

    assert_eq!(
        report.output,
        "WASM module instantiated (no _start called or found)"
    );
    assert_eq!(surface.contents(), "");
    assert_eq!(relay.pending(), "");
}

#[test]
fn module_must_export_memory() {
    let wat = r#"(module (func (export "_start")))"#;
    let err = WasmHost::new().run(wat.as_bytes()).unwrap_err();
    assert!(matches!(err, AppError::Internal(ref m) if m.contains("memory")), "{err:?}");
}

#[test]
fn out_of_bounds_write_traps_the_guest() {
    let wat = r#"
    (module
      (import "env" "write" (func $write (param i32 i32 i32) (result i32)))
      (memory (export "memory") 1)
      (func (export "_start")
        (drop (call $write (i32.const 1) (i32.const 65530) (i32.const 64)))))
    "#;
    let err = WasmHost::new().run(wat.as_bytes()).unwrap_err();
    match err {
        AppError::Wasmtime(e) => assert!(
            e.chain().any(|c| c.to_string().contains("out of bounds")),
            "{e:?}"
        ),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn last_configured_relay_receives_output() {
    let mut host = WasmHost::new();
    let first = SharedSurface::new();
    let second = SharedSurface::new();
    configure(&mut host, first.clone());
    configure(&mut host, second.clone());

    host.run(LINE_IN_PIECES.as_bytes()).unwrap();

    assert_eq!(first.contents(), "");
    assert_eq!(second.contents(), "hello world\na\nb\n");
}

#[test]
fn start_section_output_reaches_the_relay() {
    let wat = r#"
    (module
      (import "env" "write" (func $write (param i32 i32 i32) (result i32)))
      (memory (export "memory") 1)
      (data (i32.const 0) "boot\n")
      (data (i32.const 8) "run\n")
      (func $init
        (drop (call $write (i32.const 1) (i32.const 0) (i32.const 5))))
      (start $init)
      (func (export "_start")
        (drop (call $write (i32.const 1) (i32.const 8) (i32.const 4)))))
    "#;
    let mut host = WasmHost::new();
    let surface = SharedSurface::new();
    configure(&mut host, surface.clone());

    host.run(wat.as_bytes()).unwrap();

    assert_eq!(surface.contents(), "boot\nrun\n");
}

// ---------------------------------------------------------------------------
// Build script for the contract crate.
//
// Compiles the protobuf definitions under `proto/` into Rust modules using
// `tonic-build`. A vendored `protoc` is used so contributors do not need a
// system protobuf compiler.
// ---------------------------------------------------------------------------

fn main() {
    let protoc = protoc_bin_vendored::protoc_bin_path().expect("failed to locate protoc");
    std::env::set_var("PROTOC", protoc);

    println!("cargo:rerun-if-changed=proto");

    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile(
            &["proto/rig/v1/control.proto", "proto/rig/v1/demo.proto"],
            &["proto"],
        )
        .expect("failed to compile protobufs");
}

//! Build script for beacon-cluster.
//!
//! Compiles the Raft RPC protobuf definitions. A vendored `protoc` is used so
//! the build does not depend on a system-wide protobuf compiler.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path()?;
        // SAFETY: build scripts are single-threaded.
        unsafe { std::env::set_var("PROTOC", protoc) };
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/raft.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/raft.proto");
    Ok(())
}

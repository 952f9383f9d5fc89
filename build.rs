fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/qoblib_registry.proto");

    // The registry service is the only generated code; default builds need no protoc
    if std::env::var_os("CARGO_FEATURE_GRPC").is_some() {
        tonic_build::compile_protos("proto/qoblib_registry.proto")?;
    }

    Ok(())
}

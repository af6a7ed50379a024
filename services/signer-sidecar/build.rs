fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Signer service: server for validators, client for tests
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/signer.proto"], &["proto"])?;

    Ok(())
}

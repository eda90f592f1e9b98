pub mod shutdown;

/// Marks the process ready for the kubelet's readiness probe.
pub fn signal_ready() {
    std::fs::write("/etc/ready", "ready").expect("Failed to write readiness file");
}

/// Installs the process-wide TLS crypto provider.
///
/// The `kube` client negotiates TLS against the API server via `rustls`;
/// since 0.23 that requires picking a crypto backend explicitly before any
/// connection is made.
pub fn install_rustls_provider() {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("install aws-lc-rs provider");
}

pub fn init() {
    let disable_colors = ["1", "true"].contains(
        &std::env::var("DISABLE_COLORS")
            .unwrap_or_else(|_| String::new())
            .to_lowercase()
            .as_str(),
    );
    owo_colors::set_override(!disable_colors);

    install_rustls_provider();
}

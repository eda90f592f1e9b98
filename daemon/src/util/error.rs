#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("Invalid user input: {0}")]
    UserInput(String),

    #[error("Json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} environment variable is required but was not set")]
    MissingEnv(&'static str),

    #[error("CNI invocation failed: {0}")]
    Cni(String),
}

use rstest::fixture;
use tokio_util::sync::CancellationToken;

#[fixture]
pub fn cancel_token() -> CancellationToken {
    CancellationToken::new()
}

#[fixture]
pub fn tracing_setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

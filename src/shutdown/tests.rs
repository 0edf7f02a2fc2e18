use super::*;
use tokio::time::Duration;

#[tokio::test]
async fn test_server_finishing_normally() {
    let shutdown = GracefulShutdown::new(Duration::from_secs(5));

    let result = shutdown
        .run(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<(), std::io::Error>(())
        })
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let shutdown = GracefulShutdown::new(Duration::from_secs(5));

    let result = shutdown
        .run(async { Err::<(), _>(std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken")) })
        .await;

    assert!(matches!(result, Err(ShutdownError::HttpServer(msg)) if msg.contains("port taken")));
}

#[tokio::test]
async fn test_drain_deadline_after_trigger() {
    let shutdown = GracefulShutdown::new(Duration::from_millis(50));
    shutdown.trigger();

    let result = shutdown
        .run(std::future::pending::<Result<(), std::io::Error>>())
        .await;

    assert!(matches!(result, Err(ShutdownError::Timeout)));
}

#[tokio::test]
async fn test_no_deadline_without_trigger() {
    let shutdown = GracefulShutdown::new(Duration::from_millis(10));

    // Without a trigger the server is never cut short
    let result = shutdown
        .run(async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<(), std::io::Error>(())
        })
        .await;

    assert!(result.is_ok());
}

mod common;

use std::sync::Arc;
use std::time::Duration;

use courier::app::assemble;
use courier::channels::adapter::{Channel, ChannelType};
use courier::config::Config;

use common::{StubChannel, notification};

const CONFIG: &str = r#"
[ingestion]
mode = "buffered"

[scheduler]
interval_ms = 1000
"#;

#[tokio::test(start_paused = true)]
async fn buffered_mode_delivers_immediates_now_and_the_rest_on_tick() {
    let config: Config = CONFIG.parse().unwrap();
    let email = StubChannel::ok(ChannelType::Email);
    let channels: Vec<Arc<dyn Channel>> = vec![email.clone()];
    let app = assemble(config, channels).unwrap();
    app.start().await.unwrap();
    // first tick fires immediately on an empty buffer
    tokio::time::sleep(Duration::from_millis(10)).await;

    let mut urgent = notification("urgent");
    urgent.is_immediate = true;
    app.state()
        .ingestor
        .submit(vec![urgent, notification("later")])
        .await
        .unwrap();
    assert_eq!(email.calls(), 1);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(email.calls(), 2);
    app.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_what_is_still_buffered() {
    let config: Config = CONFIG.parse().unwrap();
    let email = StubChannel::ok(ChannelType::Email);
    let channels: Vec<Arc<dyn Channel>> = vec![email.clone()];
    let app = assemble(config, channels).unwrap();
    app.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    app.state()
        .ingestor
        .submit(vec![notification("a"), notification("b")])
        .await
        .unwrap();
    assert_eq!(email.calls(), 0);

    app.shutdown().await;
    assert_eq!(email.calls(), 2);
}

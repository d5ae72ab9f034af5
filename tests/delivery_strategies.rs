mod common;

use std::sync::Arc;
use std::time::Duration;

use courier::channels::adapter::{Channel, ChannelType};
use courier::delivery::DeliveryService;
use courier::notifications::{DeliveryStatus, Strategy};

use common::{StubChannel, notification};

fn service(channels: Vec<Arc<dyn Channel>>) -> DeliveryService {
    DeliveryService::new(channels, Duration::from_secs(1))
}

#[tokio::test]
async fn first_available_stops_at_first_success() {
    let a = StubChannel::unsupported(ChannelType::Bitrix);
    let b = StubChannel::ok(ChannelType::Email);
    let c = StubChannel::ok(ChannelType::Email);
    let channels: Vec<Arc<dyn Channel>> = vec![a.clone(), b.clone(), c.clone()];
    let service = service(channels);

    let results = service.send(&[notification("n1")]).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, DeliveryStatus::Success);
    assert!(results[0].warnings.is_empty());
    assert_eq!(a.calls(), 0);
    assert_eq!(b.calls(), 1);
    assert_eq!(c.calls(), 0);
}

#[tokio::test]
async fn first_available_falls_through_failures() {
    let a = StubChannel::failing(ChannelType::Bitrix);
    let b = StubChannel::ok(ChannelType::Email);
    let channels: Vec<Arc<dyn Channel>> = vec![a.clone(), b.clone()];
    let service = service(channels);

    let results = service.send(&[notification("n1")]).await;

    assert!(results[0].is_success());
    assert_eq!(results[0].warnings.len(), 1);
    assert_eq!(results[0].warnings[0].channel, ChannelType::Bitrix);
}

#[tokio::test]
async fn first_available_without_eligible_channel_fails() {
    let a = StubChannel::unsupported(ChannelType::Bitrix);
    let channels: Vec<Arc<dyn Channel>> = vec![a.clone()];
    let service = service(channels);

    let results = service.send(&[notification("n1")]).await;

    assert_eq!(results[0].status, DeliveryStatus::Failure);
    assert!(results[0].error.is_some());
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn all_available_succeeds_with_one_warning() {
    let ok = StubChannel::ok(ChannelType::Email);
    let broken = StubChannel::failing(ChannelType::Bitrix);
    let channels: Vec<Arc<dyn Channel>> = vec![ok.clone(), broken.clone()];
    let service = service(channels);
    let mut item = notification("n1");
    item.strategy = Strategy::SendToAllAvailable;

    let results = service.send(&[item]).await;

    assert_eq!(results[0].status, DeliveryStatus::Success);
    assert_eq!(results[0].warnings.len(), 1);
    assert_eq!(results[0].warnings[0].channel, ChannelType::Bitrix);
    assert_eq!(ok.calls(), 1);
    assert_eq!(broken.calls(), 1);
}

#[tokio::test]
async fn all_available_fails_when_every_send_fails() {
    let first = StubChannel::failing(ChannelType::Email);
    let second = StubChannel::failing(ChannelType::Bitrix);
    let channels: Vec<Arc<dyn Channel>> = vec![first, second];
    let service = service(channels);
    let mut item = notification("n1");
    item.strategy = Strategy::SendToAllAvailable;

    let results = service.send(&[item]).await;

    assert_eq!(results[0].status, DeliveryStatus::Failure);
    assert_eq!(results[0].warnings.len(), 2);
}

#[tokio::test]
async fn results_keep_input_order_and_zero_contacts_fail() {
    let channels: Vec<Arc<dyn Channel>> = vec![StubChannel::ok(ChannelType::Email)];
    let service = service(channels);
    let mut empty = notification("empty");
    empty.contacts.clear();

    let results = service
        .send(&[notification("a"), empty, notification("c")])
        .await;

    let ids: Vec<&str> = results.iter().map(|r| r.notification.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "empty", "c"]);
    assert!(results[0].is_success());
    assert_eq!(results[1].status, DeliveryStatus::Failure);
    assert!(results[2].is_success());
}

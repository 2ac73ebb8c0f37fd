mod helpers;

use fanout_dns_domain::{HealthCheckConfig, UpstreamStatus};
use fanout_dns_engine::{HealthProber, Upstream, UpstreamSetBuilder};
use helpers::mock_upstream::MockUpstream;
use helpers::negative_reply;
use hickory_proto::op::ResponseCode;
use std::time::Duration;

fn probe_config() -> HealthCheckConfig {
    HealthCheckConfig {
        interval: 1,
        timeout: 200,
        probe_domain: ".".to_string(),
    }
}

#[tokio::test]
async fn prober_tracks_liveness_in_both_directions() {
    // any rcode counts as alive, so even a refusing server is healthy
    let upstream_server = MockUpstream::start(|_| Some(negative_reply(ResponseCode::Refused)))
        .await
        .unwrap();

    let mut builder = UpstreamSetBuilder::new();
    builder.push(Upstream::new(upstream_server.protocol()));
    let set = builder.build().unwrap();

    assert_eq!(set.get(0).unwrap().health(), UpstreamStatus::Unknown);
    assert_eq!(set.get(0).unwrap().last_probed_at(), None);

    let mut prober = HealthProber::new(probe_config());
    prober.start(&set);

    // the first tick fires immediately
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(set.get(0).unwrap().health(), UpstreamStatus::Healthy);
    assert!(set.get(0).unwrap().last_probed_at().is_some());

    // kill the upstream and wait out one probe interval plus its timeout
    upstream_server.shutdown();
    tokio::time::sleep(Duration::from_millis(1600)).await;
    assert_eq!(set.get(0).unwrap().health(), UpstreamStatus::Unhealthy);

    prober.stop().await;
}

#[tokio::test]
async fn stop_terminates_probe_tasks() {
    let upstream_server = MockUpstream::start(|_| Some(negative_reply(ResponseCode::NoError)))
        .await
        .unwrap();

    let mut builder = UpstreamSetBuilder::new();
    builder.push(Upstream::new(upstream_server.protocol()));
    let set = builder.build().unwrap();

    let mut prober = HealthProber::new(probe_config());
    prober.start(&set);
    tokio::time::sleep(Duration::from_millis(100)).await;

    // must join every probe task, not merely signal them
    tokio::time::timeout(Duration::from_secs(1), prober.stop())
        .await
        .expect("prober.stop() must complete once tasks are cancelled");
}

#[tokio::test]
async fn health_stays_advisory_for_dispatch() {
    use fanout_dns_engine::{DnsHandler, Fanout};
    use helpers::{question, CachingWriter};
    use tokio_util::sync::CancellationToken;

    // one upstream the prober would call dead, one healthy: the dead one
    // is still attempted on every request
    let silent = MockUpstream::start(|_| None).await.unwrap();
    let answering = MockUpstream::start(|_| Some(negative_reply(ResponseCode::NXDomain)))
        .await
        .unwrap();

    let fanout = Fanout::builder()
        .upstream(silent.protocol())
        .upstream(answering.protocol())
        .attempt_timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let writer = CachingWriter::default();
    fanout
        .serve(&CancellationToken::new(), &writer, &question("example1."))
        .await
        .unwrap();

    assert_eq!(silent.requests(), 1, "unhealthy upstream is still attempted");
    assert_eq!(writer.answers().len(), 1);
}

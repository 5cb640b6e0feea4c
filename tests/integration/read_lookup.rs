//! Reads, lookups, ranges, and the small auxiliary surface.

use bytes::Bytes;

use atoll_client::session::{ioflags, NodeCounters};
use atoll_client::{Atoll, DataContainer, Error, Key, RangeOptions, ReadOptions, Timestamp};

use crate::support::{base_config, Call, MockSession};

fn name_key(name: &str) -> Key {
    Key::from_name(name, 0)
}

/// A read walks the candidate groups in order and takes the first body.
#[tokio::test]
async fn read_falls_back_across_groups() {
    let session = MockSession::new(3);
    session.set_read_body(3, &b"third time lucky"[..]);
    let mut config = base_config();
    config.groups = vec![1, 2, 3];
    let client = Atoll::new(config, session.clone());

    let opts = ReadOptions {
        groups: vec![1, 2, 3],
        ..Default::default()
    };
    let container = client.read(&name_key("k"), opts).await.unwrap();
    assert_eq!(&container.data[..], b"third time lucky");
    assert_eq!(container.timestamp, None);

    let reads: Vec<Call> = session
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Read { .. }))
        .collect();
    assert_eq!(
        reads,
        vec![
            Call::Read { groups: vec![1] },
            Call::Read { groups: vec![2] },
            Call::Read { groups: vec![3] },
        ],
        "one group per attempt, in candidate order"
    );
}

#[tokio::test]
async fn read_not_found_names_the_key() {
    let session = MockSession::new(3);
    let client = Atoll::new(base_config(), session);

    let err = client
        .read(&name_key("missing-object"), ReadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert!(err.to_string().contains("missing-object"));
}

/// The latest variant hands the whole candidate list to the transport.
#[tokio::test]
async fn read_latest_uses_the_full_candidate_list() {
    let session = MockSession::new(3);
    session.set_latest_body(&b"newest"[..]);
    let client = Atoll::new(base_config(), session.clone());

    let opts = ReadOptions {
        groups: vec![1, 2, 3],
        latest: true,
        ..Default::default()
    };
    let container = client.read(&name_key("k"), opts).await.unwrap();
    assert_eq!(&container.data[..], b"newest");

    assert!(session
        .calls()
        .iter()
        .any(|c| matches!(c, Call::ReadLatest { groups } if *groups == vec![1, 2, 3])));
}

/// An embedded body round-trips: pack on write, unpack on read.
#[tokio::test]
async fn embedded_body_round_trips() {
    let ts = Timestamp {
        sec: 1_700_000_000,
        nsec: 500,
    };
    let stored = DataContainer::with_timestamp(&b"hi"[..], ts).pack();

    let session = MockSession::new(3);
    session.set_read_body(1, stored);
    let client = Atoll::new(base_config(), session);

    let opts = ReadOptions {
        embedded: true,
        ..Default::default()
    };
    let container = client.read(&name_key("k"), opts).await.unwrap();
    assert_eq!(&container.data[..], b"hi");
    assert_eq!(container.timestamp, Some(ts));
}

/// Inconsistent framing surfaces as Corrupt, naming the key.
#[tokio::test]
async fn embedded_garbage_is_corrupt() {
    let session = MockSession::new(3);
    session.set_read_body(1, Bytes::from_static(&[1, 2, 3, 4, 5]));
    let client = Atoll::new(base_config(), session);

    let opts = ReadOptions {
        embedded: true,
        ..Default::default()
    };
    let err = client.read(&name_key("framed"), opts).await.unwrap_err();
    assert!(matches!(err, Error::Corrupt { .. }), "got {err:?}");
    assert!(err.to_string().contains("framed"));
}

/// Without the embedded option the body is passed through verbatim,
/// frames and all.
#[tokio::test]
async fn non_embedded_read_is_verbatim() {
    let stored = DataContainer::with_timestamp(&b"hi"[..], Timestamp::zero()).pack();
    let session = MockSession::new(3);
    session.set_read_body(1, stored.clone());
    let client = Atoll::new(base_config(), session);

    let container = client
        .read(&name_key("k"), ReadOptions::default())
        .await
        .unwrap();
    assert_eq!(container.data, stored);
    assert_eq!(container.timestamp, None);
}

/// Lookup returns the first healthy entry and eliminates broken groups.
#[tokio::test]
async fn lookup_takes_the_first_healthy_group() {
    let session = MockSession::new(3);
    let key = name_key("k");
    session.fail_lookup_group(1);
    session.fail_lookup_group(2);
    session.store(3, &key);
    let client = Atoll::new(base_config(), session.clone());

    let result = client.lookup(&key, &[1, 2, 3]).await.unwrap();
    assert_eq!(result.group, 3);
    assert_eq!(result.host, "node-3");
    assert_eq!(result.port, 1024 + 3);
    assert_eq!(result.path, format!("/srv/atoll/3/{key}"));
}

#[tokio::test]
async fn lookup_exhausts_all_groups_to_not_found() {
    let session = MockSession::new(3);
    for g in [1, 2, 3] {
        session.fail_lookup_group(g);
    }
    let client = Atoll::new(base_config(), session.clone());

    let err = client.lookup(&name_key("gone"), &[]).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    // All three eliminated in the first round; no second lookup issued.
    let lookups = session
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::Lookup { .. }))
        .count();
    assert_eq!(lookups, 1);
}

/// Range reads fall back per group like plain reads.
#[tokio::test]
async fn range_falls_back_and_returns_rows() {
    let session = MockSession::new(3);
    session.fail_range_group(1);
    session.set_range_rows(vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    let client = Atoll::new(base_config(), session.clone());

    let rows = client
        .range_get(&name_key("from"), &name_key("to"), RangeOptions::default())
        .await
        .unwrap();
    assert_eq!(rows, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);

    let ranges: Vec<Call> = session
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Range { .. }))
        .collect();
    assert_eq!(ranges.len(), 2, "group 1 fails, group 2 answers");
}

/// NODATA turns the range into a single-element count reply.
#[tokio::test]
async fn range_nodata_returns_the_count() {
    let session = MockSession::new(3);
    session.set_range_rows(vec![
        Bytes::from_static(b"a"),
        Bytes::from_static(b"b"),
        Bytes::from_static(b"c"),
    ]);
    let client = Atoll::new(base_config(), session);

    let opts = RangeOptions {
        ioflags: ioflags::NODATA,
        ..Default::default()
    };
    let rows = client
        .range_get(&name_key("from"), &name_key("to"), opts)
        .await
        .unwrap();
    assert_eq!(rows, vec![Bytes::from_static(b"3")]);
}

#[tokio::test]
async fn remove_round_trip() {
    let session = MockSession::new(3);
    let key = name_key("doomed");
    session.store(1, &key);
    session.store(2, &key);
    let client = Atoll::new(base_config(), session.clone());

    client.remove(&key, &[]).await.unwrap();
    assert!(session.stored_groups(&key).is_empty());

    let err = client.remove(&key, &[]).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn ping_tracks_the_die_limit() {
    let mut config = base_config();
    config.die_limit = 2;
    assert!(Atoll::new(config.clone(), MockSession::new(2)).ping());
    assert!(!Atoll::new(config, MockSession::new(1)).ping());
}

/// stat_log divides the stored load averages by 100.
#[tokio::test]
async fn stat_log_converts_load_averages() {
    let session = MockSession::new(3);
    session.set_stats(vec![NodeCounters {
        addr: "node-1:1025".into(),
        la: [250, 120, 5],
        mem_total: 64 << 30,
        mem_free: 32 << 30,
        storage_size_mb: 1_000_000,
        available_mb: 400_000,
        files: 123_456,
        fsid: 0xfeed,
    }]);
    let client = Atoll::new(base_config(), session);

    let stats = client.stat_log().await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].la, [2.5, 1.2, 0.05]);
    assert_eq!(stats[0].available_mb, 400_000);
    assert_eq!(stats[0].fsid, 0xfeed);
}

/// id_str transforms name keys through the session and prints 40 hex.
#[tokio::test]
async fn id_str_is_40_hex() {
    let session = MockSession::new(3);
    let client = Atoll::new(base_config(), session.clone());

    let s = client.id_str(&name_key("object-7")).await.unwrap();
    assert_eq!(s.len(), 40);
    assert!(session
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Transform(name) if name == "object-7")));

    let s = client
        .id_str(&Key::from_id([0xab; 32], 1, 0))
        .await
        .unwrap();
    assert_eq!(s, "ab".repeat(20));
}

#[tokio::test]
async fn lookup_addr_and_exec_forward_to_the_session() {
    let session = MockSession::new(3);
    let client = Atoll::new(base_config(), session);

    let remotes = client.lookup_addr(&name_key("k"), &[]).await.unwrap();
    assert_eq!(remotes.len(), 3);
    assert_eq!(remotes[0].host, "node-1");

    let out = client
        .exec_script(&name_key("k"), "app@calc", &b"2+2"[..], &[])
        .await
        .unwrap();
    assert_eq!(out, "ran app@calc");
}

//! Chunked uploads: segmentation, surviving sets, abandonment.

use atoll_client::{Atoll, Error, Key, SuccessMode, WriteOptions};

use crate::support::{config_with, Call, MockSession};

fn name_key(name: &str) -> Key {
    Key::from_name(name, 0)
}

fn body_calls(session: &MockSession) -> Vec<Call> {
    session
        .calls()
        .into_iter()
        .filter(|c| {
            matches!(
                c,
                Call::Write { .. } | Call::Prepare { .. } | Call::Plain { .. } | Call::Commit { .. }
            )
        })
        .collect()
}

/// 3000 bytes at a 1024 stride: prepare(0,1024), plain(1024,1024),
/// commit(2048,952), three lookups from the commit.
#[tokio::test]
async fn three_chunk_upload_sequence() {
    let session = MockSession::new(3);
    let client = Atoll::new(config_with(SuccessMode::Quorum, 1024), session.clone());
    let key = name_key("s4");

    let lookups = client
        .write(&key, vec![9u8; 3000], WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(lookups.len(), 3);
    assert!(session.removes().is_empty());

    let calls = body_calls(&session);
    assert_eq!(calls.len(), 3);
    assert!(matches!(
        calls[0],
        Call::Prepare {
            ref groups,
            offset: 0,
            len: 1024,
            reserve: 3000
        } if *groups == vec![1, 2, 3]
    ));
    assert!(matches!(
        calls[1],
        Call::Plain {
            ref groups,
            offset: 1024,
            len: 1024
        } if *groups == vec![1, 2, 3]
    ));
    assert!(matches!(
        calls[2],
        Call::Commit {
            ref groups,
            offset: 2048,
            len: 952,
            total: 3000
        } if *groups == vec![1, 2, 3]
    ));
}

/// A group that drops a middle chunk is excluded from the rest of the
/// upload and scrubbed afterwards.
#[tokio::test]
async fn mid_upload_failure_shrinks_the_surviving_set() {
    let session = MockSession::new(3);
    session.fail_group_from_call(2, 2); // healthy prepare, dead from the plain on
    let client = Atoll::new(config_with(SuccessMode::Quorum, 1024), session.clone());
    let key = name_key("s5");

    let lookups = client
        .write(&key, vec![9u8; 3000], WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(lookups.len(), 2);

    let calls = body_calls(&session);
    assert!(matches!(
        calls[1],
        Call::Plain { ref groups, .. } if *groups == vec![1, 2, 3]
    ));
    // The commit goes only to the survivors.
    assert!(matches!(
        calls[2],
        Call::Commit { ref groups, .. } if *groups == vec![1, 3]
    ));

    // Group 2 holds a half-written object; it must be scrubbed.
    assert_eq!(session.removes(), vec![vec![2]]);
    assert_eq!(session.stored_groups(&key), vec![1, 3]);
}

/// A chunked write issues exactly ⌈S/C⌉ body calls.
#[tokio::test]
async fn chunk_count_is_ceil_of_size_over_stride() {
    for (total, chunk, expect) in [
        (150usize, 100u64, 2usize),
        (300, 100, 3),
        (101, 100, 2),
        (200, 100, 2),
        (1000, 100, 10),
        (3000, 1024, 3),
    ] {
        let session = MockSession::new(3);
        let client = Atoll::new(config_with(SuccessMode::Quorum, chunk), session.clone());

        client
            .write(&name_key("inv3"), vec![1u8; total], WriteOptions::default())
            .await
            .unwrap();

        let calls = body_calls(&session);
        assert_eq!(calls.len(), expect, "total={total} chunk={chunk}");
        assert!(matches!(calls[0], Call::Prepare { .. }));
        assert!(matches!(calls[calls.len() - 1], Call::Commit { .. }));
        for middle in &calls[1..calls.len() - 1] {
            assert!(matches!(middle, Call::Plain { .. }));
        }
    }
}

/// Chunking requires a name key; raw-id keys always upload in one shot.
#[tokio::test]
async fn id_keys_never_chunk() {
    let session = MockSession::new(3);
    let client = Atoll::new(config_with(SuccessMode::Quorum, 64), session.clone());
    let key = Key::from_id([0xaa; 32], 1, 0);

    client
        .write(&key, vec![1u8; 1000], WriteOptions::default())
        .await
        .unwrap();

    let calls = body_calls(&session);
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], Call::Write { len: 1000, .. }));
}

/// Bodies at or under the stride take the one-shot path.
#[tokio::test]
async fn small_bodies_do_not_chunk() {
    let session = MockSession::new(3);
    let client = Atoll::new(config_with(SuccessMode::Quorum, 1024), session.clone());

    client
        .write(&name_key("small"), vec![1u8; 1024], WriteOptions::default())
        .await
        .unwrap();

    let calls = body_calls(&session);
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], Call::Write { .. }));
}

/// Under ALL, losing any group mid-upload abandons the stream: no
/// commit is issued and every original target is rolled back.
#[tokio::test]
async fn collapse_below_acceptance_abandons_the_upload() {
    let session = MockSession::new(3);
    session.fail_group_from_call(2, 2);
    let client = Atoll::new(config_with(SuccessMode::All, 1024), session.clone());
    let key = name_key("abandoned");

    let err = client
        .write(&key, vec![9u8; 3000], WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WriteRejected { .. }), "got {err:?}");

    let calls = body_calls(&session);
    assert_eq!(calls.len(), 2, "upload stops at the failing chunk");
    assert!(!calls.iter().any(|c| matches!(c, Call::Commit { .. })));

    assert_eq!(session.removes(), vec![vec![1, 2, 3]]);
    assert!(session.stored_groups(&key).is_empty());
}

/// A chunked upload replaces the whole object: the prepare is anchored
/// at offset 0 and the stride runs from there, whatever offset the
/// caller passed.
#[tokio::test]
async fn chunked_uploads_are_anchored_at_zero() {
    let session = MockSession::new(3);
    let client = Atoll::new(config_with(SuccessMode::Quorum, 100), session.clone());

    let opts = WriteOptions {
        offset: 500,
        ..Default::default()
    };
    client
        .write(&name_key("offset"), vec![1u8; 250], opts)
        .await
        .unwrap();

    let calls = body_calls(&session);
    assert!(matches!(
        calls[0],
        Call::Prepare {
            offset: 0,
            len: 100,
            reserve: 250,
            ..
        }
    ));
    assert!(matches!(calls[1], Call::Plain { offset: 100, .. }));
    assert!(matches!(
        calls[2],
        Call::Commit {
            offset: 200,
            len: 50,
            total: 250,
            ..
        }
    ));
}

mod common;

use anyhow::Result;
use common::seeded;
use zkchroot::{
    ANY_VERSION, ConnectOptions, Connection, Coordinator, CreateMode, Error, EventType, FaultTiming,
    MemoryStore, OpKind, PROTECTED_PREFIX, Perms, world_acl,
};

#[tokio::test]
async fn test_logical_round_trip_under_chroot() -> Result<()> {
    let store = MemoryStore::new();
    let mut conn = seeded(&store, &["/svc"]).await?;
    conn.set_chroot("/svc").await?;

    for logical in ["/", "/cfg", "/cfg/a/b", "/svc", "/x-y_z"] {
        assert_eq!(conn.to_logical(&conn.to_physical(logical)), logical);
    }
    assert_eq!(conn.to_physical("/cfg"), "/svc/cfg");
    assert_eq!(conn.to_physical("/"), "/svc");
    Ok(())
}

#[tokio::test]
async fn test_no_chroot_is_pass_through() -> Result<()> {
    let store = MemoryStore::new();
    let conn = Connection::new(store.connect().await);
    for path in ["/", "/a", "/a/b/c"] {
        assert_eq!(conn.to_physical(path), path);
        assert_eq!(conn.to_logical(path), path);
    }
    Ok(())
}

#[tokio::test]
async fn test_set_chroot_to_missing_node_keeps_previous() -> Result<()> {
    let store = MemoryStore::new();
    let mut conn = seeded(&store, &["/svc"]).await?;
    conn.set_chroot("/svc/").await?;
    assert_eq!(conn.chroot().prefix(), "/svc");

    let err = conn.set_chroot("/missing").await.unwrap_err();
    assert_eq!(err, Error::ChrootNotFound("/missing".to_string()));
    assert_eq!(conn.chroot().prefix(), "/svc");
    Ok(())
}

#[tokio::test]
async fn test_set_chroot_existence_check_failure_is_wrapped() -> Result<()> {
    let store = MemoryStore::new();
    let zk = store.connect().await;
    zk.create("/svc", b"", CreateMode::Persistent, &world_acl(Perms::ALL))
        .await?;
    zk.inject_fault(OpKind::Exists, FaultTiming::Before, Error::ConnectionLoss)
        .await;
    let mut conn = Connection::new(zk);

    let err = conn.set_chroot("/svc").await.unwrap_err();
    assert_eq!(err, Error::chroot("/svc", Error::ConnectionLoss));
    assert!(!conn.chroot().is_set());

    // The fault was one-shot
    conn.set_chroot("/svc").await?;
    assert_eq!(conn.chroot().prefix(), "/svc");
    Ok(())
}

#[tokio::test]
async fn test_upsert_under_chroot_lands_at_physical_path() -> Result<()> {
    let store = MemoryStore::new();
    let mut conn = seeded(&store, &["/svc"]).await?;

    conn.set_chroot("/svc").await?;
    conn.upsert_with_ancestors("/cfg", CreateMode::Persistent, b"v1")
        .await?;
    conn.set_chroot("").await?;

    assert!(conn.exists("/svc/cfg").await?.is_some());
    let (data, _) = conn.get("/svc/cfg").await?;
    assert_eq!(data, b"v1");
    Ok(())
}

#[tokio::test]
async fn test_store_errors_carry_physical_paths() -> Result<()> {
    let store = MemoryStore::new();
    let conn = seeded(&store, &["/svc"]).await?.with_chroot("/svc").await?;

    let err = conn.get("/nope").await.unwrap_err();
    assert_eq!(err, Error::no_node("/svc/nope"));
    Ok(())
}

#[tokio::test]
async fn test_create_and_sync_report_logical_paths() -> Result<()> {
    let store = MemoryStore::new();
    let conn = seeded(&store, &["/app/queue"]).await?.with_chroot("/app").await?;

    let first = conn
        .create("/queue/item-", b"1", CreateMode::PersistentSequential, &world_acl(Perms::ALL))
        .await?;
    assert_eq!(first, "/queue/item-0000000000");
    assert_eq!(conn.sync("/queue").await?, "/queue");

    // Child names are names, not paths
    let (names, stat) = conn.children("/queue").await?;
    assert_eq!(names, vec!["item-0000000000"]);
    assert_eq!(stat.num_children, 1);

    assert!(store.paths().await.contains(&"/app/queue/item-0000000000".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_acl_pass_through() -> Result<()> {
    let store = MemoryStore::new();
    let conn = seeded(&store, &["/app/node"]).await?.with_chroot("/app").await?;

    let stat = conn.set_acl("/node", &world_acl(Perms::READ | Perms::ADMIN), 0).await?;
    assert_eq!(stat.aversion, 1);
    let (acl, _) = conn.get_acl("/node").await?;
    assert_eq!(acl, world_acl(Perms::READ | Perms::ADMIN));
    Ok(())
}

#[tokio::test]
async fn test_with_chroot_leaves_original_untouched() -> Result<()> {
    let store = MemoryStore::new();
    let base = seeded(&store, &["/tenants/a", "/tenants/b"]).await?;

    let tenant_a = base.with_chroot("/tenants/a").await?;
    let tenant_b = base.scope("/tenants").await?.scope("/b").await?;
    assert!(!base.chroot().is_set());
    assert_eq!(tenant_b.chroot().prefix(), "/tenants/b");

    assert!(matches!(
        base.with_chroot("/tenants/c").await,
        Err(Error::ChrootNotFound(_))
    ));

    tenant_a.upsert_with_ancestors("/k", CreateMode::Persistent, b"a").await?;
    tenant_b.upsert_with_ancestors("/k", CreateMode::Persistent, b"b").await?;
    assert_eq!(base.get("/tenants/a/k").await?.0, b"a");
    assert_eq!(base.get("/tenants/b/k").await?.0, b"b");
    Ok(())
}

#[tokio::test]
async fn test_scopes_are_safe_to_use_concurrently() -> Result<()> {
    let store = MemoryStore::new();
    let base = seeded(&store, &["/tenants/a", "/tenants/b"]).await?;
    let scopes = [
        base.with_chroot("/tenants/a").await?,
        base.with_chroot("/tenants/b").await?,
    ];

    let writes = scopes.iter().flat_map(|scope| {
        (0..10).map(move |i| async move {
            scope
                .upsert_with_ancestors(&format!("/keys/k{i}"), CreateMode::Persistent, b"v")
                .await
        })
    });
    for outcome in futures::future::join_all(writes).await {
        outcome?;
    }

    for tenant in ["a", "b"] {
        let (names, _) = base.children(&format!("/tenants/{tenant}/keys")).await?;
        assert_eq!(names.len(), 10);
    }
    Ok(())
}

#[tokio::test]
async fn test_watch_events_report_logical_paths() -> Result<()> {
    let store = MemoryStore::new();
    let conn = seeded(&store, &["/app"]).await?.with_chroot("/app").await?;
    let writer = Connection::new(store.connect().await);

    let (stat, created) = conn.exists_w("/flag").await?;
    assert!(stat.is_none());
    writer
        .create("/app/flag", b"", CreateMode::Persistent, &world_acl(Perms::ALL))
        .await?;
    let event = created.wait().await?;
    assert_eq!(event.event_type, EventType::NodeCreated);
    assert_eq!(event.path, "/flag");

    let (_, _, children) = conn.children_w("/").await?;
    let (_, _, data) = conn.get_w("/flag").await?;
    writer.set("/app/flag", b"up", ANY_VERSION).await?;
    writer.delete("/app/flag", ANY_VERSION).await?;

    let event = data.wait().await?;
    assert_eq!(event.event_type, EventType::NodeDataChanged);
    assert_eq!(event.path, "/flag");
    let event = children.wait().await?;
    assert_eq!(event.event_type, EventType::NodeChildrenChanged);
    assert_eq!(event.path, "/");
    Ok(())
}

#[tokio::test]
async fn test_protected_ephemeral_recovers_lost_reply() -> Result<()> {
    let store = MemoryStore::new();
    let zk = store.connect().await;
    let conn = Connection::new(zk.clone());
    conn.ensure_ancestors("/app/locks").await?;
    // The create lands but its reply is lost
    zk.inject_fault(OpKind::Create, FaultTiming::After, Error::ConnectionLoss)
        .await;
    let conn = conn.with_chroot("/app").await?;

    let path = conn
        .create_protected_ephemeral_sequential("/locks/lock-", b"me", &world_acl(Perms::ALL))
        .await?;
    let name = path.strip_prefix("/locks/").unwrap_or_default();
    assert!(name.starts_with(PROTECTED_PREFIX), "{path}");
    assert!(name.ends_with("-lock-0000000000"), "{path}");

    // Exactly one node was created, and it is ours
    let (names, _) = conn.children("/locks").await?;
    assert_eq!(names, vec![name.to_string()]);
    let stat = conn.exists(&path).await?.unwrap_or_default();
    assert_eq!(stat.ephemeral_owner, zk.session_id());
    Ok(())
}

#[tokio::test]
async fn test_protected_ephemeral_gives_up() -> Result<()> {
    let store = MemoryStore::new();
    let zk = store.connect().await;
    let conn = Connection::new(zk.clone());
    conn.ensure_ancestors("/locks").await?;
    for _ in 0..3 {
        zk.inject_fault(OpKind::Create, FaultTiming::Before, Error::ConnectionLoss)
            .await;
    }

    let err = conn
        .create_protected_ephemeral_sequential("/locks/lock-", b"", &world_acl(Perms::ALL))
        .await
        .unwrap_err();
    assert_eq!(err, Error::ConnectionLoss);
    assert!(conn.children("/locks").await?.0.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_open_applies_configured_chroot() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("zk.yaml");
    std::fs::write(&file, "servers:\n  - localhost:2181\nchroot: /svc\n")?;
    let options = ConnectOptions::from_path(&file)?;

    let store = MemoryStore::new();
    seeded(&store, &["/svc"]).await?;
    let conn = Connection::open(&options, store.connect().await).await?;
    assert_eq!(conn.chroot().prefix(), "/svc");

    let missing = options.clone().with_chroot("/elsewhere");
    assert!(matches!(
        Connection::open(&missing, store.connect().await).await,
        Err(Error::ChrootNotFound(_))
    ));
    Ok(())
}

#[test]
fn test_blocking_style_usage() -> Result<()> {
    tokio_test::block_on(async {
        let store = MemoryStore::new();
        let mut conn = Connection::new(store.connect().await);
        conn.ensure_ancestors("/jobs").await?;
        conn.set_chroot("/jobs").await?;
        conn.upsert_with_ancestors("/nightly/config", CreateMode::Persistent, b"cron")
            .await?;
        conn.delete_recursive("/nightly", ANY_VERSION).await?;
        assert_eq!(store.paths().await, vec!["/", "/jobs"]);
        Ok::<(), anyhow::Error>(())
    })
}

mod common;

use common::eventually;
use common::Bus;
use d_shared::SubjectType;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hash_updates_replicate_with_change_ids() {
    let bus = Bus::new();
    let fst = bus.join("/eos/node1/fst");
    let mgm = bus.join("/eos/mgm");

    fst.registry
        .create_subject("/eos/node1/fst", "/eos/*", SubjectType::Hash)
        .unwrap();
    let hash = fst.registry.hash("/eos/node1/fst").unwrap();
    hash.set("stat.boot", "booting", true, false);
    hash.set("stat.boot", "booted", true, false);

    eventually(|| {
        mgm.registry
            .hash("/eos/node1/fst")
            .and_then(|h| h.get("stat.boot"))
            .as_deref()
            == Some("booted")
    })
    .await;
    let replica = mgm.registry.hash("/eos/node1/fst").unwrap();
    assert_eq!(replica.get_change_id("stat.boot"), hash.get_change_id("stat.boot"));
    // auto-created replicas broadcast to the default target
    assert_eq!(replica.broadcast_target(), "/eos/*");

    assert_eq!(mgm.shutdown().await, 2);
    fst.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_transaction_replicates_updates_and_deletions() {
    let bus = Bus::new();
    let fst = bus.join("/eos/fst");
    let mgm = bus.join("/eos/mgm");

    fst.registry.create_subject("cfg", "/eos/mgm", SubjectType::Hash).unwrap();
    let hash = fst.registry.hash("cfg").unwrap();
    hash.set("stale", "x", true, false);
    eventually(|| mgm.registry.hash("cfg").is_some_and(|h| h.contains("stale"))).await;

    hash.open_transaction();
    hash.set("a", "1", true, false);
    hash.set("b", "2", true, false);
    hash.delete("stale", true, false);
    assert!(hash.close_transaction());

    eventually(|| mgm.registry.hash("cfg").is_some_and(|h| h.keys() == vec!["a", "b"])).await;

    mgm.shutdown().await;
    fst.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mux_transaction_replicates_several_subjects() {
    let bus = Bus::new();
    let mgm = bus.join("/eos/mgm");
    let fst = bus.join("/eos/fst");

    for subject in ["/eos/fs/1", "/eos/fs/2"] {
        mgm.registry.create_subject(subject, "/eos/*", SubjectType::Hash).unwrap();
    }
    let mux = mgm.registry.open_mux_transaction(SubjectType::Hash, "/eos/fst").unwrap();
    mgm.registry.hash("/eos/fs/1").unwrap().set("configstatus", "rw", true, false);
    mgm.registry.hash("/eos/fs/2").unwrap().set("configstatus", "drain", true, false);
    assert!(mux.close());

    eventually(|| {
        let value = |s: &str| fst.registry.hash(s).and_then(|h| h.get("configstatus"));
        value("/eos/fs/1").as_deref() == Some("rw") && value("/eos/fs/2").as_deref() == Some("drain")
    })
    .await;

    // one muxupdate for both subjects
    assert_eq!(fst.shutdown().await, 1);
    mgm.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_subject_removal_replicates() {
    let bus = Bus::new();
    let a = bus.join("/eos/a");
    let b = bus.join("/eos/b");

    a.registry.create_subject("gone", "/eos/*", SubjectType::Queue).unwrap();
    a.registry.queue("gone").unwrap().push_back(None, "job");
    eventually(|| b.registry.contains("gone", SubjectType::Queue)).await;

    a.registry.delete_subject("gone", SubjectType::Queue, true).unwrap();
    eventually(|| !b.registry.contains("gone", SubjectType::Queue)).await;

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_late_joiner_catches_up_through_broadcast_request() {
    let bus = Bus::new();
    let fst = bus.join("/eos/fst");
    for subject in ["/eos/fs/1", "/eos/fs/2", "/eos/other"] {
        fst.registry.create_subject(subject, "/nowhere", SubjectType::Hash).unwrap();
        fst.registry.hash(subject).unwrap().set("id", subject, true, false);
    }

    let mgm = bus.join("/eos/mgm");
    assert!(mgm
        .registry
        .request_broadcast("/eos/fs/*", SubjectType::Hash, &mgm.address, "/eos/fst")
        .unwrap());

    eventually(|| mgm.registry.subjects(SubjectType::Hash).len() == 2).await;
    assert_eq!(mgm.registry.subjects(SubjectType::Hash), vec!["/eos/fs/1", "/eos/fs/2"]);
    assert_eq!(
        mgm.registry.hash("/eos/fs/2").unwrap().get("id").as_deref(),
        Some("/eos/fs/2")
    );

    mgm.shutdown().await;
    fst.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_queue_order_replicates() {
    let bus = Bus::new();
    let producer = bus.join("/eos/producer");
    let consumer = bus.join("/eos/consumer");

    producer
        .registry
        .create_subject("jobs", "/eos/consumer", SubjectType::Queue)
        .unwrap();
    let queue = producer.registry.queue("jobs").unwrap();
    for job in ["first", "second", "third"] {
        queue.push_back(Some(job), job);
    }
    queue.pop_front();

    eventually(|| {
        consumer
            .registry
            .queue("jobs")
            .is_some_and(|q| q.keys_in_order() == vec!["second", "third"])
    })
    .await;

    consumer.shutdown().await;
    producer.shutdown().await;
}

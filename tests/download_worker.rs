mod support;

use std::fs;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use mailpipe::api::models::{DeleteMode, MessageRef};
use mailpipe::ingest::download::{DownloadOutcome, DownloadWorker};
use mailpipe::ingest::filter::MessageFilter;
use mailpipe::ingest::storage::{ArtifactStore, METADATA_FILE};
use mailpipe::queue::{Shutdown, work_queue};
use support::{FakeMailbox, file_attachment, message};

fn worker(
    mailbox: &Arc<FakeMailbox>,
    filter: MessageFilter,
    store: ArtifactStore,
) -> DownloadWorker {
    let (_tx, rx) = work_queue::<MessageRef>();
    DownloadWorker::new(
        mailbox.clone(),
        rx,
        Shutdown::new(),
        filter,
        store,
        DeleteMode::Soft,
    )
}

#[tokio::test]
async fn saves_remaining_attachments_and_deletes_when_one_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mailbox = Arc::new(FakeMailbox::new());
    let message_ref = mailbox.add_message(
        message(
            "m1",
            "Invoice March",
            vec![
                file_attachment("a1", "invoice.pdf"),
                file_attachment("a2", "missing.pdf"),
            ],
        ),
        "<m1@example.com>",
    );
    mailbox.add_attachment_bytes("a1", b"%PDF");

    let mut worker = worker(
        &mailbox,
        MessageFilter::new(vec!["invoice".to_string()], false),
        ArtifactStore::new(dir.path().to_path_buf(), false),
    );

    let outcome = worker.process(message_ref).await;

    assert_eq!(
        outcome,
        DownloadOutcome::Processed {
            saved: 1,
            failed: 1,
            metadata: false,
            deleted: true,
        }
    );
    assert_eq!(
        fs::read(dir.path().join("invoice.pdf")).expect("saved attachment"),
        b"%PDF"
    );
    assert!(!dir.path().join("missing.pdf").exists());
    assert_eq!(
        mailbox.deleted.lock().unwrap().clone(),
        vec![("m1".to_string(), DeleteMode::Soft)]
    );
}

#[tokio::test]
async fn leaves_non_matching_messages_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mailbox = Arc::new(FakeMailbox::new());
    let no_attachments = mailbox.add_message(message("m1", "Invoice", vec![]), "<m1>");
    let wrong_subject = mailbox.add_message(
        message("m2", "Newsletter", vec![file_attachment("a1", "x.pdf")]),
        "<m2>",
    );

    let mut worker = worker(
        &mailbox,
        MessageFilter::new(vec!["invoice".to_string()], false),
        ArtifactStore::new(dir.path().to_path_buf(), false),
    );

    assert_eq!(worker.process(no_attachments).await, DownloadOutcome::NotMatched);
    assert_eq!(worker.process(wrong_subject).await, DownloadOutcome::NotMatched);
    assert!(mailbox.deleted_ids().is_empty());
    assert_eq!(fs::read_dir(dir.path()).expect("list").count(), 0);
}

#[tokio::test]
async fn skips_a_unique_id_seen_recently() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mailbox = Arc::new(FakeMailbox::new());
    let first = mailbox.add_message(
        message("m1", "Report", vec![file_attachment("a1", "r.csv")]),
        "<same@example.com>",
    );
    mailbox.add_attachment_bytes("a1", b"a,b");
    // Same message reported again under another item id.
    let again = MessageRef::new("m1-copy", "<same@example.com>");

    let mut worker = worker(
        &mailbox,
        MessageFilter::new(vec![], false),
        ArtifactStore::new(dir.path().to_path_buf(), false),
    );

    assert!(matches!(
        worker.process(first).await,
        DownloadOutcome::Processed { .. }
    ));
    assert_eq!(worker.process(again).await, DownloadOutcome::Duplicate);
    assert_eq!(mailbox.bind_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mailbox.deleted_ids(), vec!["m1".to_string()]);
}

#[tokio::test]
async fn failed_bind_is_skipped_but_remembered() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mailbox = Arc::new(FakeMailbox::new());
    let unknown = MessageRef::new("gone", "<gone@example.com>");

    let mut worker = worker(
        &mailbox,
        MessageFilter::new(vec![], false),
        ArtifactStore::new(dir.path().to_path_buf(), false),
    );

    assert_eq!(worker.process(unknown.clone()).await, DownloadOutcome::BindFailed);
    assert_eq!(worker.process(unknown).await, DownloadOutcome::Duplicate);
    assert!(mailbox.deleted_ids().is_empty());
}

#[tokio::test]
async fn body_capture_writes_a_transaction_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mailbox = Arc::new(FakeMailbox::new());
    let with_file = mailbox.add_message(
        message("m1", "Report Q1", vec![file_attachment("a1", "q1.csv")]),
        "<m1>",
    );
    let body_only = mailbox.add_message(message("m2", "report q2", vec![]), "<m2>");
    mailbox.add_attachment_bytes("a1", b"1,2");

    let mut worker = worker(
        &mailbox,
        MessageFilter::new(vec!["report".to_string()], true),
        ArtifactStore::new(dir.path().to_path_buf(), true),
    );

    assert_eq!(
        worker.process(with_file).await,
        DownloadOutcome::Processed {
            saved: 1,
            failed: 0,
            metadata: true,
            deleted: true,
        }
    );
    assert!(matches!(
        worker.process(body_only).await,
        DownloadOutcome::Processed {
            saved: 0,
            metadata: true,
            ..
        }
    ));

    let mut transactions = fs::read_dir(dir.path())
        .expect("list")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    transactions.sort_by_key(|name| name.ends_with("EMAIL_2"));
    assert_eq!(transactions.len(), 2);
    assert!(transactions[0].ends_with("@EMAIL_1"));
    assert!(transactions[1].ends_with("@EMAIL_2"));

    let first = dir.path().join(&transactions[0]);
    assert_eq!(
        fs::read(first.join("1771236000@q1.csv")).expect("attachment"),
        b"1,2"
    );

    let record: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(first.join(METADATA_FILE)).expect("metadata"))
            .expect("metadata json");
    assert_eq!(record["id"], "m1");
    assert_eq!(record["subject"], "Report Q1");
    assert_eq!(record["body"], "<p>hello</p>");
    assert_eq!(record["attachments"][0]["name"], "q1.csv");
    assert_eq!(record["attachments"][0]["contentType"], "text/csv");

    let second = dir.path().join(&transactions[1]);
    assert!(second.join(METADATA_FILE).exists());
}

#[tokio::test]
async fn delete_failure_does_not_undo_the_download() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mailbox = Arc::new(FakeMailbox::new());
    let message_ref = mailbox.add_message(
        message("m1", "Scan", vec![file_attachment("a1", "scan.png")]),
        "<m1>",
    );
    mailbox.add_attachment_bytes("a1", b"png");
    mailbox.fail_delete.store(true, Ordering::SeqCst);

    let mut worker = worker(
        &mailbox,
        MessageFilter::new(vec![], false),
        ArtifactStore::new(dir.path().to_path_buf(), false),
    );

    assert_eq!(
        worker.process(message_ref).await,
        DownloadOutcome::Processed {
            saved: 1,
            failed: 0,
            metadata: false,
            deleted: false,
        }
    );
    assert!(dir.path().join("scan.png").exists());
}

#[tokio::test]
async fn run_drains_the_queue_until_shutdown() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mailbox = Arc::new(FakeMailbox::new());
    let first = mailbox.add_message(message("m1", "a", vec![file_attachment("a1", "1.txt")]), "<1>");
    let second = mailbox.add_message(message("m2", "b", vec![file_attachment("a2", "2.txt")]), "<2>");
    mailbox.add_attachment_bytes("a1", b"1");
    mailbox.add_attachment_bytes("a2", b"2");

    let (tx, rx) = work_queue();
    let shutdown = Shutdown::new();
    let worker = DownloadWorker::new(
        mailbox.clone(),
        rx,
        shutdown.clone(),
        MessageFilter::new(vec![], false),
        ArtifactStore::new(dir.path().to_path_buf(), false),
        DeleteMode::Hard,
    );
    let handle = tokio::spawn(worker.run());

    tx.push(first.clone());
    tx.push(second);
    tx.push(first);

    support::eventually("both messages deleted", || mailbox.deleted_ids().len() == 2).await;
    shutdown.trigger();
    handle.await.expect("worker task");

    assert_eq!(mailbox.deleted_ids(), vec!["m1".to_string(), "m2".to_string()]);
    assert_eq!(mailbox.bind_calls.load(Ordering::SeqCst), 2);
}

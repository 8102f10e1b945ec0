use anyhow::Result;
use dealdone::{DealDone, MessageDraft, StoreHandle};

fn draft(sender: &str, receiver: &str, content: &str) -> MessageDraft {
    MessageDraft {
        sender_id: sender.into(),
        receiver_id: receiver.into(),
        content: content.into(),
    }
}

#[tokio::test]
async fn unread_count_tracks_sends_and_reads() -> Result<()> {
    let client = DealDone::connect(StoreHandle::in_memory())?;
    let db = client.db();

    assert_eq!(db.unread_count("u1").await?, 0);

    let m1 = db.send_message(draft("u2", "u1", "first")).await?;
    let m2 = db.send_message(draft("u2", "u1", "second")).await?;
    db.send_message(draft("u1", "u2", "reply")).await?;
    assert_eq!(db.unread_count("u1").await?, 2);

    db.mark_as_read(&[m1.id.clone()]).await?;
    assert_eq!(db.unread_count("u1").await?, 1);

    db.mark_as_read(&[m2.id.clone()]).await?;
    assert_eq!(db.unread_count("u1").await?, 0);

    // Re-reading already-read messages cannot drive the count negative.
    db.mark_as_read(&[m1.id, m2.id]).await?;
    assert_eq!(db.unread_count("u1").await?, 0);
    Ok(())
}

#[tokio::test]
async fn messages_for_spans_both_directions_in_order() -> Result<()> {
    let client = DealDone::connect(StoreHandle::in_memory())?;
    let db = client.db();

    db.send_message(draft("u1", "u2", "out")).await?;
    db.send_message(draft("u3", "u4", "elsewhere")).await?;
    db.send_message(draft("u2", "u1", "in")).await?;

    let listed = db.messages_for("u1").await?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].content, "out");
    assert_eq!(listed[1].content, "in");
    assert!(listed[0].created_at <= listed[1].created_at);
    Ok(())
}

#[tokio::test]
async fn empty_mark_as_read_is_a_no_op() -> Result<()> {
    let client = DealDone::connect(StoreHandle::in_memory())?;
    let db = client.db();

    db.send_message(draft("u2", "u1", "unread")).await?;
    db.mark_as_read(&[]).await?;
    assert_eq!(db.unread_count("u1").await?, 1);
    Ok(())
}

#[tokio::test]
async fn sent_messages_start_unread_with_ids() -> Result<()> {
    let client = DealDone::connect(StoreHandle::in_memory())?;
    let sent = client.db().send_message(draft("u2", "u1", "hi")).await?;

    assert!(!sent.is_read);
    assert!(!sent.id.is_empty());
    assert!(sent.created_at > 0);
    Ok(())
}

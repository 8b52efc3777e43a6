//! Hub behavior tests driven through in-memory Sessions.

mod helpers;

use serde_json::json;

use chet_realtime::OutboundFrame;
use helpers::{ADMIN_SECRET, OWNER_SECRET, TestHub, ip};

#[test]
fn test_channel_post_reaches_history() {
    let hub = TestHub::new();
    let mut alice = hub.join("Alice");
    let mut bob = hub.join("Bob");
    hub.drain_all(&mut [&mut alice, &mut bob]);

    alice.send(json!({"type": "postMessage", "channel": "general", "body": "  hi  "}));

    let live = bob.expect("message");
    assert_eq!(live["author"], "Alice");
    assert_eq!(live["body"], "hi");
    assert_eq!(live["channel"], "general");
    assert_eq!(alice.frames_of("message").len(), 1);

    bob.send(json!({"type": "requestHistory", "channel": "general"}));
    let history = bob.expect("history");
    let messages = history["messages"].as_array().expect("messages array");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["author"], "Alice");
    assert_eq!(messages[0]["body"], "hi");
}

#[test]
fn test_history_is_capped_oldest_first() {
    let hub = TestHub::new();
    let capacity = hub.hub.config().channel_history_capacity;
    let mut alice = hub.join("Alice");

    for i in 0..=capacity {
        alice.send(json!({"type": "postMessage", "channel": "random", "body": format!("m{i}")}));
    }
    alice.drain();

    alice.send(json!({"type": "requestHistory", "channel": "random"}));
    let history = alice.expect("history");
    let bodies: Vec<String> = history["messages"]
        .as_array()
        .expect("messages array")
        .iter()
        .map(|m| m["body"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(bodies.len(), capacity);
    assert_eq!(bodies.first().map(String::as_str), Some("m1"));
    assert_eq!(bodies.last(), Some(&format!("m{capacity}")));
}

#[test]
fn test_unknown_channel_and_empty_post() {
    let hub = TestHub::new();
    let mut alice = hub.join("Alice");

    alice.send(json!({"type": "postMessage", "channel": "nowhere", "body": "hi"}));
    alice.expect_error("notFound");

    alice.send(json!({"type": "postMessage", "channel": "general", "body": "   "}));
    alice.expect_error("validation");

    alice.send(json!({"type": "requestHistory", "channel": "nowhere"}));
    alice.expect_error("notFound");
}

#[test]
fn test_frames_before_join_are_rejected() {
    let hub = TestHub::new();
    let mut anon = hub.connect(ip(9));

    anon.send(json!({"type": "postMessage", "channel": "general", "body": "hi"}));
    anon.expect_error("authentication");

    anon.send_raw("{not json");
    anon.expect_error("validation");

    anon.send(json!({"type": "teleport"}));
    anon.expect_error("validation");
}

#[test]
fn test_second_join_on_same_session_conflicts() {
    let hub = TestHub::new();
    let mut alice = hub.join("Alice");
    alice.send(json!({"type": "join", "displayName": "Other"}));
    alice.expect_error("conflict");
    assert_eq!(alice.name().as_deref(), Some("Alice"));
}

#[test]
fn test_display_names_are_unique() {
    let hub = TestHub::new();
    let first = hub.join_with("Alice", json!({"stableId": "one"}), ip(1));
    let second = hub.join_with("Alice", json!({"stableId": "two"}), ip(2));
    let third = hub.join_with("Al ice!", json!({"stableId": "three"}), ip(3));

    assert_eq!(first.name().as_deref(), Some("Alice"));
    assert_eq!(second.name().as_deref(), Some("Alice2"));
    assert_eq!(third.name().as_deref(), Some("Alice3"));
    assert_eq!(hub.hub.member_count(), 3);
}

#[test]
fn test_reconnect_with_stable_id_replaces_session() {
    let hub = TestHub::new();
    let mut old = hub.join_with("Alice", json!({"stableId": "device-1"}), ip(1));
    old.drain();

    let fresh = hub.join_with("Alice", json!({"stableId": "device-1"}), ip(1));
    assert_eq!(fresh.name().as_deref(), Some("Alice"));
    assert_eq!(old.name(), None);
    assert_eq!(hub.hub.member_count(), 1);
    assert_eq!(hub.hub.connection_count(), 1);

    let frames = old.drain_frames();
    assert!(frames.iter().any(|f| matches!(
        f,
        OutboundFrame::Text(text) if text.contains("sessionReplaced")
    )));
    assert!(matches!(frames.last(), Some(OutboundFrame::Close)));
    assert!(!old.handle.is_alive());

    // The replaced Session closing later must not unbind the new one.
    hub.hub.disconnect(&old.handle.id);
    assert_eq!(fresh.name().as_deref(), Some("Alice"));
}

#[test]
fn test_presence_lists_members_by_rank() {
    let hub = TestHub::new();
    let mut bob = hub.join("Bob");
    let _owner = hub.join_owner("Zed");
    let _admin = hub.join_admin("Amy");

    let presence = bob.frames_of("presence");
    let latest = presence.last().expect("presence frame");
    let names: Vec<&str> = latest["members"]
        .as_array()
        .expect("members array")
        .iter()
        .filter_map(|m| m["displayName"].as_str())
        .collect();
    assert_eq!(names, vec!["Zed", "Amy", "Bob"]);

    let bob_entry = &latest["members"][2];
    assert_eq!(bob_entry["role"], "none");
    assert_eq!(bob_entry["muted"], false);
}

#[test]
fn test_disconnect_publishes_presence() {
    let hub = TestHub::new();
    let mut alice = hub.join("Alice");
    let bob = hub.join("Bob");
    alice.drain();

    hub.hub.disconnect(&bob.handle.id);
    let presence = alice.expect("presence");
    assert_eq!(presence["members"].as_array().map(Vec::len), Some(1));

    hub.hub.disconnect(&bob.handle.id);
    assert!(alice.frames_of("presence").is_empty());
}

#[test]
fn test_typing_is_relayed_to_others_only() {
    let hub = TestHub::new();
    let mut alice = hub.join("Alice");
    let mut bob = hub.join("Bob");
    hub.drain_all(&mut [&mut alice, &mut bob]);

    alice.send(json!({"type": "typing", "channel": "general", "isTyping": true}));
    let typing = bob.expect("typing");
    assert_eq!(typing["displayName"], "Alice");
    assert_eq!(typing["isTyping"], true);
    assert!(alice.drain().is_empty());
}

#[test]
fn test_private_chat_flow() {
    let hub = TestHub::new();
    let mut alice = hub.join("Alice");
    let mut bob = hub.join("Bob");
    let mut carol = hub.join("Carol");
    hub.drain_all(&mut [&mut alice, &mut bob, &mut carol]);

    alice.send(json!({"type": "requestPrivateChat", "targetName": "Bob"}));
    let request = bob.expect("privateChatRequest");
    assert_eq!(request["from"], "Alice");

    bob.send(json!({"type": "respondPrivateChat", "requesterName": "Alice", "accepted": true}));
    let accepted = alice.expect("privateChatAccepted");
    assert_eq!(accepted["with"], "Bob");
    let session_id = accepted["sessionId"].as_str().expect("session id").to_string();
    assert_eq!(session_id, "dm:Alice:Bob");
    assert_eq!(bob.expect("privateChatAccepted")["with"], "Alice");

    alice.send(json!({"type": "postPrivateMessage", "sessionId": session_id, "body": "psst"}));
    assert_eq!(bob.expect("privateMessage")["body"], "psst");
    assert_eq!(alice.expect("privateMessage")["body"], "psst");
    assert!(carol.drain().is_empty());

    carol.send(json!({"type": "postPrivateMessage", "sessionId": session_id, "body": "hey"}));
    carol.expect_error("authorization");

    carol.send(json!({"type": "requestPrivateHistory", "sessionId": session_id}));
    carol.expect_error("authorization");

    bob.send(json!({"type": "requestPrivateHistory", "sessionId": session_id}));
    let history = bob.expect("privateHistory");
    assert_eq!(history["messages"].as_array().map(Vec::len), Some(1));
}

#[test]
fn test_reused_name_is_not_a_private_participant() {
    let hub = TestHub::new();
    let mut alice = hub.join_with("Alice", json!({"stableId": "alice-device"}), ip(1));
    let mut bob = hub.join_with("Bob", json!({"stableId": "bob-device"}), ip(2));
    hub.drain_all(&mut [&mut alice, &mut bob]);

    alice.send(json!({"type": "requestPrivateChat", "targetName": "Bob"}));
    bob.send(json!({"type": "respondPrivateChat", "requesterName": "Alice", "accepted": true}));
    let session_id = bob.expect("privateChatAccepted")["sessionId"].clone();
    alice.send(json!({"type": "postPrivateMessage", "sessionId": session_id, "body": "secret"}));
    bob.drain();

    hub.hub.disconnect(&alice.handle.id);
    let mut mallory = hub.join_with("Alice", json!({"stableId": "mallory-device"}), ip(4));
    assert_eq!(mallory.name().as_deref(), Some("Alice"));
    mallory.drain();

    mallory.send(json!({"type": "requestPrivateHistory", "sessionId": session_id}));
    mallory.expect_error("authorization");

    mallory.send(json!({"type": "postPrivateMessage", "sessionId": session_id, "body": "hi Bob"}));
    mallory.expect_error("authorization");

    bob.send(json!({"type": "postPrivateMessage", "sessionId": session_id, "body": "still there?"}));
    assert_eq!(bob.expect("privateMessage")["body"], "still there?");
    assert!(mallory.frames_of("privateMessage").is_empty());
}

#[test]
fn test_reconnect_drops_pending_private_requests() {
    let hub = TestHub::new();
    let _alice = hub.join_with("Alice", json!({"stableId": "device-1"}), ip(1));
    let mut bob = hub.join("Bob");
    bob.drain();

    bob.send(json!({"type": "requestPrivateChat", "targetName": "Alice"}));
    assert!(hub.hub.private_sessions().is_pending("Bob", "Alice"));

    let mut fresh = hub.join_with("Alice", json!({"stableId": "device-1"}), ip(1));
    assert!(!hub.hub.private_sessions().is_pending("Bob", "Alice"));

    fresh.send(json!({"type": "respondPrivateChat", "requesterName": "Bob", "accepted": true}));
    fresh.expect_error("notFound");
}

#[test]
fn test_private_chat_rejection_and_edge_cases() {
    let hub = TestHub::new();
    let mut alice = hub.join("Alice");
    let mut bob = hub.join("Bob");
    hub.drain_all(&mut [&mut alice, &mut bob]);

    alice.send(json!({"type": "requestPrivateChat", "targetName": "Alice"}));
    alice.expect_error("validation");

    alice.send(json!({"type": "requestPrivateChat", "targetName": "Ghost"}));
    alice.expect_error("notFound");

    bob.send(json!({"type": "respondPrivateChat", "requesterName": "Alice", "accepted": true}));
    bob.expect_error("notFound");

    alice.send(json!({"type": "requestPrivateChat", "targetName": "Bob"}));
    bob.drain();
    bob.send(json!({"type": "respondPrivateChat", "requesterName": "Alice", "accepted": false}));
    assert_eq!(alice.expect("privateChatRejected")["by"], "Bob");
    assert_eq!(hub.hub.private_sessions().session_count(), 0);

    alice.send(json!({"type": "requestPrivateHistory", "sessionId": "dm:Alice:Nobody"}));
    let history = alice.expect("privateHistory");
    assert_eq!(history["messages"], json!([]));
}

#[test]
fn test_reactions_are_broadcast() {
    let hub = TestHub::new();
    let mut alice = hub.join("Alice");
    let mut bob = hub.join("Bob");
    hub.drain_all(&mut [&mut alice, &mut bob]);

    alice.send(json!({"type": "postMessage", "channel": "general", "body": "vote"}));
    let message_id = bob.expect("message")["id"].clone();
    alice.drain();

    bob.send(json!({"type": "reactAdd", "messageId": message_id, "emoji": "👍", "channel": "general"}));
    let update = alice.expect("reactionUpdate");
    assert_eq!(update["reactions"], json!({"👍": ["Bob"]}));
    assert_eq!(update["channel"], "general");
    bob.drain();

    // Adding the same reaction again changes nothing.
    bob.send(json!({"type": "reactAdd", "messageId": message_id, "emoji": "👍", "channel": "general"}));
    assert!(alice.frames_of("reactionUpdate").is_empty());

    bob.send(json!({"type": "reactRemove", "messageId": message_id, "emoji": "👍", "channel": "general"}));
    assert_eq!(alice.expect("reactionUpdate")["reactions"], json!({}));

    bob.send(json!({"type": "reactAdd", "messageId": message_id, "emoji": "<b>", "channel": "general"}));
    bob.expect_error("validation");
}

#[test]
fn test_mute_expires_with_clock() {
    let hub = TestHub::new();
    let mut admin = hub.join_admin("Mod");
    let mut bob = hub.join("Bob");
    hub.drain_all(&mut [&mut admin, &mut bob]);

    admin.send(json!({"type": "modMute", "target": "Bob", "durationSeconds": 5}));
    let result = admin.expect("adminActionResult");
    assert_eq!(result["ok"], true);

    let status = bob.expect("moderationStatus");
    assert_eq!(status["muted"], true);
    assert_eq!(status["by"], "Mod");

    bob.send(json!({"type": "postMessage", "channel": "general", "body": "let me talk"}));
    let err = bob.expect_error("policyDenied");
    assert_eq!(err["remainingSeconds"], 5);

    // Muted members can still type and react.
    bob.send(json!({"type": "typing", "channel": "general", "isTyping": true}));
    assert!(bob.frames_of("error").is_empty());

    hub.clock.advance_secs(6);
    bob.send(json!({"type": "postMessage", "channel": "general", "body": "free"}));
    assert_eq!(admin.expect("message")["body"], "free");
}

#[test]
fn test_timeout_blocks_typing_and_reactions() {
    let hub = TestHub::new();
    let mut admin = hub.join_admin("Mod");
    let mut bob = hub.join("Bob");
    hub.drain_all(&mut [&mut admin, &mut bob]);

    admin.send(json!({"type": "modTimeout", "target": "Bob", "durationSeconds": 30}));
    assert_eq!(admin.expect("adminActionResult")["ok"], true);
    assert_eq!(bob.expect("moderationStatus")["timedOut"], true);

    bob.send(json!({"type": "typing", "channel": "general", "isTyping": true}));
    assert_eq!(bob.expect_error("policyDenied")["remainingSeconds"], 30);
    assert!(admin.frames_of("typing").is_empty());

    admin.send(json!({"type": "modUntimeout", "target": "Bob"}));
    assert_eq!(admin.expect("adminActionResult")["ok"], true);
    bob.send(json!({"type": "postMessage", "channel": "general", "body": "back"}));
    assert_eq!(admin.expect("message")["body"], "back");

    admin.send(json!({"type": "modUntimeout", "target": "Bob"}));
    assert_eq!(admin.expect("adminActionResult")["ok"], false);
}

#[test]
fn test_admin_can_kick_member() {
    let hub = TestHub::new();
    let mut admin = hub.join_admin("Mod");
    let mut bob = hub.join("Bob");
    hub.drain_all(&mut [&mut admin, &mut bob]);

    admin.send(json!({"type": "modKick", "target": "Bob", "reason": "spam"}));
    assert_eq!(admin.expect("adminActionResult")["ok"], true);

    let frames = bob.drain_frames();
    assert!(frames.iter().any(|f| matches!(
        f,
        OutboundFrame::Text(text) if text.contains("\"kicked\"") && text.contains("spam")
    )));
    assert!(matches!(frames.last(), Some(OutboundFrame::Close)));
    assert_eq!(bob.name(), None);
    assert_eq!(hub.hub.member_count(), 1);

    admin.send(json!({"type": "modKick", "target": "Bob"}));
    assert_eq!(admin.expect("adminActionResult")["ok"], false);
}

#[test]
fn test_non_admin_cannot_moderate() {
    let hub = TestHub::new();
    let mut alice = hub.join("Alice");
    let mut bob = hub.join("Bob");
    hub.drain_all(&mut [&mut alice, &mut bob]);

    alice.send(json!({"type": "modMute", "target": "Bob"}));
    assert_eq!(alice.expect("adminActionResult")["ok"], false);
    assert!(bob.frames_of("moderationStatus").is_empty());
}

#[test]
fn test_role_hierarchy_for_bans() {
    let hub = TestHub::new();
    let mut admin = hub.join_admin("Mod");
    let mut other_admin = hub.join_with("Mod2", json!({"secrets": [ADMIN_SECRET]}), ip(7));
    let mut owner = hub.join_owner("Boss");
    hub.drain_all(&mut [&mut admin, &mut other_admin, &mut owner]);

    admin.send(json!({"type": "modBan", "target": "Mod2"}));
    assert_eq!(admin.expect("adminActionResult")["ok"], false);
    assert_eq!(other_admin.name().as_deref(), Some("Mod2"));

    admin.send(json!({"type": "modMute", "target": "Boss"}));
    assert_eq!(admin.expect("adminActionResult")["ok"], false);

    owner.send(json!({"type": "modBan", "target": "Mod2", "durationSeconds": 60}));
    assert_eq!(owner.expect("adminActionResult")["ok"], true);
    let banned = other_admin.expect("banned");
    assert_eq!(banned["remainingSeconds"], 60);
    assert_eq!(other_admin.name(), None);
}

#[test]
fn test_ban_blocks_origin_and_name_until_unbanned() {
    let hub = TestHub::new();
    let mut admin = hub.join_admin("Mod");
    let bob = hub.join_with("Bob", json!({}), ip(2));
    admin.drain();

    admin.send(json!({"type": "modBan", "target": "Bob", "reason": "trolling"}));
    assert_eq!(admin.expect("adminActionResult")["ok"], true);
    assert!(!bob.handle.is_alive());

    // Same origin is refused at connect time, before any join.
    let connections = hub.hub.connection_count();
    let mut retry = hub.connect(ip(2));
    let frames = retry.drain_frames();
    assert_eq!(frames.len(), 2);
    assert!(matches!(&frames[0], OutboundFrame::Text(text) if text.contains("banned")));
    assert!(matches!(frames[1], OutboundFrame::Close));
    assert!(!retry.handle.is_alive());
    assert_eq!(hub.hub.connection_count(), connections);

    // Same name from another origin is refused at join time.
    let mut elsewhere = hub.connect(ip(3));
    elsewhere.send(json!({"type": "join", "displayName": "Bob"}));
    let banned = elsewhere.expect("banned");
    assert!(banned["reason"].as_str().unwrap_or_default().contains("trolling"));
    assert!(banned.get("remainingSeconds").is_none());
    assert_eq!(elsewhere.name(), None);

    admin.send(json!({"type": "modUnban", "target": "Bob"}));
    assert_eq!(admin.expect("adminActionResult")["ok"], true);
    let back = hub.join_with("Bob", json!({}), ip(2));
    assert_eq!(back.name().as_deref(), Some("Bob"));

    admin.send(json!({"type": "modUnban", "target": "Bob"}));
    assert_eq!(admin.expect("adminActionResult")["ok"], false);
}

#[test]
fn test_timed_ban_expires() {
    let hub = TestHub::new();
    let mut admin = hub.join_admin("Mod");
    let _bob = hub.join_with("Bob", json!({}), ip(2));
    admin.drain();

    admin.send(json!({"type": "modBan", "target": "Bob", "durationSeconds": 10, "scope": "name"}));
    assert_eq!(admin.expect("adminActionResult")["ok"], true);

    let mut early = hub.connect(ip(2));
    early.send(json!({"type": "join", "displayName": "Bob"}));
    assert_eq!(early.expect("banned")["remainingSeconds"], 10);

    hub.clock.advance_secs(10);
    let late = hub.join_with("Bob", json!({}), ip(2));
    assert_eq!(late.name().as_deref(), Some("Bob"));
}

#[test]
fn test_elevate_with_secret() {
    let hub = TestHub::new();
    let mut bob = hub.join("Bob");
    bob.drain();

    bob.send(json!({"type": "elevate", "secret": "guess"}));
    bob.expect_error("authentication");

    bob.send(json!({"type": "elevate", "secret": OWNER_SECRET}));
    assert_eq!(bob.expect("roleUpdated")["role"], "owner");

    // A lower secret never demotes.
    bob.send(json!({"type": "elevate", "secret": ADMIN_SECRET}));
    assert_eq!(bob.expect("roleUpdated")["role"], "owner");
}

#[test]
fn test_shutdown_closes_sessions_and_refuses_new_ones() {
    let hub = TestHub::new();
    let mut alice = hub.join("Alice");
    alice.drain();

    hub.hub.shutdown();
    assert!(matches!(alice.drain_frames().last(), Some(OutboundFrame::Close)));

    let late = hub.connect(ip(5));
    assert!(!late.handle.is_alive());
}

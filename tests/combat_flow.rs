//! End-to-end combat over HTTP and WebSocket

mod common;

use std::time::Duration;

use common::{current_id, seed, SkirmishTest};
use serde_json::json;

#[tokio::test]
async fn test_health_and_root() {
    let server = SkirmishTest::start().await.expect("Failed to start server");

    let body: serde_json::Value = server.get("/health").await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["rooms"], 0);

    let body: serde_json::Value = server.get("/").await.unwrap().json().await.unwrap();
    assert_eq!(body["name"], "skirmish");
}

#[tokio::test]
async fn test_unknown_room_is_404() {
    let server = SkirmishTest::start().await.expect("Failed to start server");
    let resp = server.get("/rooms/nowhere").await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "room_not_found");
}

#[tokio::test]
async fn test_player_kills_goblin_and_round_advances() {
    let server = SkirmishTest::start().await.expect("Failed to start server");
    let mut gm = server.join("crypt", None).await.unwrap();

    gm.send_json(json!({
        "type": "start_combat",
        "seeds": [
            seed("fighter", "player", 16, 20, 30, None),
            seed("goblin", "monster", 13, 7, -30, Some((4, "1d6"))),
        ],
    }))
    .await
    .unwrap();
    let encounter = gm.expect_turn("fighter").await.unwrap();
    assert_eq!(encounter["round"], 1);

    gm.action(json!({
        "action": "attack",
        "actor_id": "fighter",
        "target_id": "goblin",
        "attack_bonus": 5,
        "damage": "1d4+10",
        "roll_override": 20,
    }))
    .await
    .unwrap();

    let result = gm.expect_event("combat_result").await.unwrap();
    assert_eq!(result["resolution"]["is_critical"], true);
    assert_eq!(result["damage"]["killed"], true);
    let defeated = gm.expect_event("defeated").await.unwrap();
    assert_eq!(defeated["combatant_id"], "goblin");

    // The dead goblin's turn is skipped by the driver
    let encounter = gm.expect_turn("fighter").await.unwrap();
    assert_eq!(encounter["round"], 2);
    assert!(encounter["threat"]["fighter"].as_u64().unwrap() >= 12);

    let snapshot: serde_json::Value =
        server.get("/rooms/crypt").await.unwrap().json().await.unwrap();
    assert_eq!(current_id(&snapshot).as_deref(), Some("fighter"));
}

#[tokio::test]
async fn test_monster_acts_on_its_own() {
    let server = SkirmishTest::start().await.expect("Failed to start server");
    let mut gm = server.join("cave", None).await.unwrap();

    gm.send_json(json!({
        "type": "start_combat",
        "seeds": [
            seed("fighter", "player", 10, 30, -30, None),
            seed("orc", "monster", 13, 15, 30, Some((5, "2"))),
        ],
    }))
    .await
    .unwrap();

    let result = gm.expect_event("combat_result").await.unwrap();
    assert_eq!(result["attacker_id"], "orc");
    assert_eq!(result["target_id"], "fighter");
    let narration = gm.expect_event("narration").await.unwrap();
    assert_eq!(narration["fallback"], true);
    assert!(narration["text"].as_str().unwrap().starts_with("orc"));

    // Continuation after the presentation delay hands the turn over
    let encounter = gm.expect_turn("fighter").await.unwrap();
    assert_eq!(encounter["action_log"][0]["actor_id"], "orc");
}

#[tokio::test]
async fn test_out_of_turn_and_foreign_actions_rejected() {
    let server = SkirmishTest::start().await.expect("Failed to start server");
    let mut gm = server.join("hall", None).await.unwrap();
    let mut rogue = server.join("hall", Some("rogue")).await.unwrap();

    gm.send_json(json!({
        "type": "start_combat",
        "seeds": [
            seed("fighter", "player", 16, 20, 30, None),
            seed("rogue", "player", 14, 12, 0, None),
            seed("goblin", "monster", 13, 7, -30, Some((4, "1d6"))),
        ],
    }))
    .await
    .unwrap();
    gm.expect_turn("fighter").await.unwrap();

    rogue
        .action(json!({ "action": "pass", "actor_id": "rogue" }))
        .await
        .unwrap();
    let error = rogue.expect("error").await.unwrap();
    assert_eq!(error["code"], "not_your_turn");

    rogue
        .action(json!({ "action": "pass", "actor_id": "fighter" }))
        .await
        .unwrap();
    let error = rogue.expect("error").await.unwrap();
    assert_eq!(error["code"], "forbidden");

    // Nothing changed
    gm.send_json(json!({ "type": "query" })).await.unwrap();
    let snapshot = gm.expect("snapshot").await.unwrap();
    assert_eq!(current_id(&snapshot["encounter"]).as_deref(), Some("fighter"));
    assert_eq!(snapshot["encounter"]["action_log"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_hold_fires_after_trigger() {
    let server = SkirmishTest::start().await.expect("Failed to start server");
    let mut gm = server.join("bridge", None).await.unwrap();

    gm.send_json(json!({
        "type": "start_combat",
        "seeds": [
            seed("fighter", "player", 16, 20, 30, None),
            seed("cleric", "player", 14, 12, 0, None),
            seed("goblin", "monster", 13, 7, -30, Some((4, "1"))),
        ],
    }))
    .await
    .unwrap();
    gm.expect_turn("fighter").await.unwrap();

    gm.action(json!({
        "action": "hold",
        "actor_id": "fighter",
        "trigger": { "kind": "on_actor_acts", "actor_id": "cleric" },
    }))
    .await
    .unwrap();
    gm.expect_turn("cleric").await.unwrap();

    gm.action(json!({ "action": "pass", "actor_id": "cleric" }))
        .await
        .unwrap();
    let fired = gm.expect_event("held_triggered").await.unwrap();
    assert_eq!(fired["holder_id"], "fighter");
    assert_eq!(fired["trigger_actor_id"], "cleric");
    gm.expect_turn("fighter").await.unwrap();

    gm.action(json!({ "action": "pass", "actor_id": "fighter" }))
        .await
        .unwrap();
    let result = gm.expect_event("combat_result").await.unwrap();
    assert_eq!(result["attacker_id"], "goblin");
}

#[tokio::test]
async fn test_party_defeat_ends_combat() {
    let server = SkirmishTest::start().await.expect("Failed to start server");
    let mut gm = server.join("pit", None).await.unwrap();

    gm.send_json(json!({
        "type": "start_combat",
        "seeds": [
            seed("wizard", "player", 12, 10, 30, None),
            seed("ogre", "monster", 11, 40, -30, Some((6, "2d8+4"))),
        ],
    }))
    .await
    .unwrap();
    gm.expect_turn("wizard").await.unwrap();

    // The wizard walks away without disengaging and the ogre takes its reaction
    gm.action(json!({ "action": "move", "actor_id": "wizard", "description": "flees" }))
        .await
        .unwrap();
    gm.action(json!({
        "action": "opportunity_attack",
        "actor_id": "ogre",
        "target_id": "wizard",
        "damage": "100",
        "roll_override": 20,
    }))
    .await
    .unwrap();

    let defeated = gm.expect_event("defeated").await.unwrap();
    assert_eq!(defeated["combatant_id"], "wizard");
    let ended = gm.expect_event("combat_ended").await.unwrap();
    assert_eq!(ended["reason"], "party_defeated");

    gm.action(json!({ "action": "pass", "actor_id": "wizard" }))
        .await
        .unwrap();
    let error = gm.expect("error").await.unwrap();
    assert_eq!(error["code"], "no_active_encounter");
}

#[tokio::test]
async fn test_viewers_reconnect_to_running_encounter() {
    let server = SkirmishTest::start().await.expect("Failed to start server");
    let mut gm = server.join("keep", None).await.unwrap();
    gm.send_json(json!({
        "type": "start_combat",
        "seeds": [
            seed("fighter", "player", 16, 20, 30, None),
            seed("goblin", "monster", 13, 7, -30, Some((4, "1d6"))),
        ],
    }))
    .await
    .unwrap();
    gm.expect_turn("fighter").await.unwrap();
    gm.close().await.unwrap();
    drop(gm);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut viewer = server.connect_ws().await.unwrap();
    viewer
        .send_json(json!({ "type": "join", "room_id": "keep" }))
        .await
        .unwrap();
    let joined = viewer.expect("joined").await.unwrap();
    assert_eq!(joined["encounter"]["active"], true);
    assert_eq!(current_id(&joined["encounter"]).as_deref(), Some("fighter"));

    viewer
        .send_json(json!({ "type": "advise", "max": 2 }))
        .await
        .unwrap();
    let advice = viewer.expect("advice").await.unwrap();
    assert_eq!(advice["decisions"][0]["actor_id"], "goblin");
    assert_eq!(advice["decisions"][0]["target_id"], "fighter");
}

#[tokio::test]
async fn test_join_rejects_bad_room_id() {
    let server = SkirmishTest::start().await.expect("Failed to start server");
    let mut client = server.connect_ws().await.unwrap();
    client
        .send_json(json!({ "type": "join", "room_id": "no spaces/allowed" }))
        .await
        .unwrap();
    let error = client.expect("error").await.unwrap();
    assert_eq!(error["code"], "invalid_room_id");

    let body: serde_json::Value = server.get("/health").await.unwrap().json().await.unwrap();
    assert_eq!(body["rooms"], 0);
}

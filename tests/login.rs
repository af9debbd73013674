//! Integration tests for the login dialogue.

mod common;
use common::{TestClient, TestServer};
use std::time::Duration;

#[tokio::test]
async fn test_login_success_announces_join() {
    let server = TestServer::spawn()
        .await
        .expect("Failed to spawn test server");

    let mut bob = server.login("bob", "bobpw").await.expect("bob login");

    let mut alice = server.connect().await.expect("Failed to connect");
    let nick = alice.login("alice", "alicepw").await.expect("alice login");
    assert_eq!(nick, "alice");

    bob.expect("alice has joined the chat")
        .await
        .expect("bob should see the join notice");
    assert!(server.matrix().registry.find("ALICE").is_some());
}

#[tokio::test]
async fn test_login_attempts_exhausted() {
    let server = TestServer::spawn()
        .await
        .expect("Failed to spawn test server");
    let mut client = server.connect().await.expect("Failed to connect");

    let banner = client.recv().await.expect("banner");
    assert!(banner.starts_with("Welcome to ChatServer."));

    for attempt in 1..=3 {
        if attempt > 1 {
            client
                .expect("Please enter your username:")
                .await
                .expect("username prompt");
        }
        client.send_raw("alice").await.expect("send username");
        client
            .expect("Please enter your password:")
            .await
            .expect("password prompt");
        client.send_raw("wrong").await.expect("send password");
        client
            .expect("Invalid username or password. Please try again.")
            .await
            .expect("failure notice");
    }

    let rest = client
        .recv_until_closed(Duration::from_secs(5))
        .await
        .expect("server should close the connection");
    assert_eq!(rest, vec!["Login attempts exhausted, closing connection."]);
    assert!(server.matrix().registry.is_empty());
}

#[tokio::test]
async fn test_malformed_username_consumes_attempt() {
    let server = TestServer::spawn_with(|c| c.login.max_attempts = 1)
        .await
        .expect("Failed to spawn test server");
    let mut client = server.connect().await.expect("Failed to connect");

    client.recv().await.expect("banner");
    client.send_raw("1x").await.expect("send username");
    client
        .expect("Please enter your password:")
        .await
        .expect("password prompt");
    client.send_raw("whatever").await.expect("send password");

    let rest = client
        .recv_until_closed(Duration::from_secs(5))
        .await
        .expect("server should close the connection");
    assert_eq!(
        rest,
        vec![
            "Invalid username or password. Please try again.",
            "Login attempts exhausted, closing connection.",
        ]
    );
}

#[tokio::test]
async fn test_login_timeout_closes_connection() {
    let server = TestServer::spawn_with(|c| c.login.timeout_secs = 1)
        .await
        .expect("Failed to spawn test server");
    let mut client = server.connect().await.expect("Failed to connect");

    client.recv().await.expect("banner");
    client.send_raw("alice").await.expect("send username");
    // Never answer the password prompt.
    let rest = client
        .recv_until_closed(Duration::from_secs(5))
        .await
        .expect("server should close the connection");
    assert_eq!(
        rest,
        vec![
            "Please enter your password:",
            "Login period exceeded, connection closed."
        ]
    );
}

#[tokio::test]
async fn test_duplicate_nickname_prompts_for_another() {
    let server = TestServer::spawn()
        .await
        .expect("Failed to spawn test server");
    let mut first = server.login("carol", "carolpw").await.expect("first login");

    let mut second = server.connect().await.expect("Failed to connect");
    second.recv().await.expect("banner");
    second.send_raw("carol").await.expect("send username");
    second
        .expect("Please enter your password:")
        .await
        .expect("password prompt");
    second.send_raw("carolpw").await.expect("send password");
    second
        .expect("Username already in use. Please enter a different nickname:")
        .await
        .expect("nickname prompt");

    second.send_raw("x").await.expect("send bad nickname");
    second.expect("illegal nickname").await.expect("rejection");
    second.send_raw("carol_2").await.expect("send nickname");
    second
        .expect("Welcome to ChatServer! You are now known as carol_2.")
        .await
        .expect("welcome");

    first
        .expect("carol_2 has joined the chat")
        .await
        .expect("join notice");

    let profile = server
        .matrix()
        .registry
        .find("carol_2")
        .expect("registered");
    assert_eq!(profile.session.username(), "carol");
}

#[tokio::test]
async fn test_concurrent_logins_same_account() {
    let server = TestServer::spawn()
        .await
        .expect("Failed to spawn test server");

    async fn attempt(mut client: TestClient) -> (TestClient, String) {
        client.recv().await.expect("banner");
        client.send_raw("carol").await.expect("send username");
        client
            .expect("Please enter your password:")
            .await
            .expect("password prompt");
        client.send_raw("carolpw").await.expect("send password");
        let outcome = client.recv().await.expect("outcome");
        (client, outcome)
    }

    let a = server.connect().await.expect("Failed to connect");
    let b = server.connect().await.expect("Failed to connect");
    let ((_a, first), (_b, second)) = tokio::join!(attempt(a), attempt(b));

    let outcomes = [first, second];
    let welcomed = outcomes
        .iter()
        .filter(|l| *l == "Welcome to ChatServer! You are now known as carol.")
        .count();
    let prompted = outcomes
        .iter()
        .filter(|l| *l == "Username already in use. Please enter a different nickname:")
        .count();
    assert_eq!((welcomed, prompted), (1, 1), "outcomes: {outcomes:?}");
    assert_eq!(server.matrix().registry.len(), 1);
}

#[tokio::test]
async fn test_disconnect_during_login_leaves_no_session() {
    let server = TestServer::spawn()
        .await
        .expect("Failed to spawn test server");
    let mut client = server.connect().await.expect("Failed to connect");
    client.recv().await.expect("banner");
    drop(client);

    let mut alice = server.login("alice", "alicepw").await.expect("alice login");
    alice.send_raw("/who").await.expect("send who");
    let lines = alice.expect("(end of list)").await.expect("listing");
    assert_eq!(lines, vec!["Current Users:", "alice (user)", "(end of list)"]);
}

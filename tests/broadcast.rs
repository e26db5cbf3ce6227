use std::time::Duration;

use axum::extract::ws::Message;
use futures::{channel::mpsc, StreamExt};
use roomcast::{
    chat::{ChatSession, ConnectionId, Envelope, Identity, Registry, RoomId},
    rooms::drive,
};
use tokio::{task::JoinHandle, time::timeout};

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(100);

struct Client {
    id: ConnectionId,
    to_server: mpsc::UnboundedSender<Result<Message, axum::Error>>,
    from_server: mpsc::UnboundedReceiver<Message>,
    task: JoinHandle<()>,
}

impl Client {
    fn connect(registry: &Registry, room: &str, name: Option<&str>) -> Client {
        let identity = Identity::from_username(name.map(str::to_owned));
        let mut chat = ChatSession::local(RoomId::from(room), identity, registry.clone());
        let outbox = chat.join().unwrap();
        let id = chat.id();

        let (to_server, stream) = mpsc::unbounded();
        let (sink, from_server) = mpsc::unbounded();
        let task = tokio::spawn(drive(chat, outbox, sink, stream, None));

        Client { id, to_server, from_server, task }
    }

    fn send(&self, text: &str) {
        self.to_server.unbounded_send(Ok(Message::Text(text.into()))).unwrap();
    }

    async fn recv(&mut self) -> Envelope {
        let frame = timeout(WAIT, self.from_server.next())
            .await
            .expect("no envelope arrived")
            .expect("server side closed");
        let Message::Text(text) = frame else {
            panic!("expected a text frame, got {frame:?}");
        };
        serde_json::from_str(text.as_str()).unwrap()
    }

    async fn assert_silent(&mut self) {
        assert!(
            timeout(QUIET, self.from_server.next()).await.is_err(),
            "unexpected frame"
        );
    }

    async fn disconnect(self) {
        self.to_server.unbounded_send(Ok(Message::Close(None))).unwrap();
        timeout(WAIT, self.task).await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn message_reaches_its_room_only() {
    let registry = Registry::new();
    let mut a = Client::connect(&registry, "general", Some("alice"));
    let mut b = Client::connect(&registry, "general", None);
    let mut c = Client::connect(&registry, "random", Some("carol"));

    a.send(r#"{"message":"hi"}"#);

    let for_a = a.recv().await;
    let for_b = b.recv().await;
    for envelope in [&for_a, &for_b] {
        assert_eq!(envelope.message, "hi");
        assert_eq!(envelope.sender, "alice");
        assert_eq!(envelope.room_id.as_str(), "general");
    }
    assert_eq!(for_a.id, for_b.id);

    a.assert_silent().await;
    b.assert_silent().await;
    c.assert_silent().await;
}

#[tokio::test]
async fn anonymous_sender() {
    let registry = Registry::new();
    let mut a = Client::connect(&registry, "general", Some("alice"));
    let b = Client::connect(&registry, "general", None);

    b.send(r#"{"message":"who am i","sender":"alice"}"#);
    assert_eq!(a.recv().await.sender, "Anonymous");
}

#[tokio::test]
async fn malformed_frames_are_dropped() {
    let registry = Registry::new();
    let mut a = Client::connect(&registry, "general", Some("alice"));
    let mut b = Client::connect(&registry, "general", Some("bob"));

    a.send("definitely not json");
    a.send(r#"{"text":"wrong field"}"#);
    a.to_server
        .unbounded_send(Ok(Message::Binary(vec![1, 2, 3].into())))
        .unwrap();
    a.send(r#"{"message":"still alive"}"#);

    assert_eq!(b.recv().await.message, "still alive");
    assert_eq!(a.recv().await.message, "still alive");
    b.assert_silent().await;
}

#[tokio::test]
async fn members_see_publish_order() {
    let registry = Registry::new();
    let a = Client::connect(&registry, "general", Some("alice"));
    let mut b = Client::connect(&registry, "general", Some("bob"));

    for i in 0..20 {
        a.send(&format!(r#"{{"message":"{i}"}}"#));
    }
    for i in 0..20 {
        assert_eq!(b.recv().await.message, i.to_string());
    }
}

#[tokio::test]
async fn late_joiner_gets_no_backlog() {
    let registry = Registry::new();
    let room = RoomId::from("general");
    let mut a = Client::connect(&registry, "general", Some("alice"));

    a.send(r#"{"message":"before you came"}"#);
    assert_eq!(a.recv().await.message, "before you came");
    let a_id = a.id;
    a.disconnect().await;

    assert_eq!(registry.room_of(a_id), None);
    assert!(registry.members(&room).is_empty());

    let mut d = Client::connect(&registry, "general", Some("dave"));
    d.assert_silent().await;
}

#[tokio::test]
async fn never_joined_never_receives() {
    let registry = Registry::new();
    let mut a = Client::connect(&registry, "general", Some("alice"));

    let bystander = ChatSession::local(RoomId::from("general"), Identity::Anonymous, registry.clone());
    a.send(r#"{"message":"hello?"}"#);
    a.recv().await;

    assert!(!registry.members(&RoomId::from("general")).contains(&bystander.id()));
    assert_eq!(registry.connection_count(), 1);
}

#[tokio::test]
async fn failed_push_closes_the_session() {
    let registry = Registry::new();
    let a = Client::connect(&registry, "general", Some("alice"));
    let gone = Client::connect(&registry, "general", Some("ghost"));
    let Client { id, to_server: _keep_open, from_server, task } = gone;
    drop(from_server);

    a.send(r#"{"message":"anyone there"}"#);

    timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(registry.room_of(id), None);
    assert_eq!(registry.members(&RoomId::from("general")), vec![a.id]);
}

#[tokio::test]
async fn stream_end_leaves_the_room() {
    let registry = Registry::new();
    let a = Client::connect(&registry, "general", Some("alice"));
    let Client { id, to_server, from_server: _from_server, task } = a;

    drop(to_server);
    timeout(WAIT, task).await.unwrap().unwrap();

    assert_eq!(registry.room_of(id), None);
    assert_eq!(registry.room_count(), 0);
}

//! End-to-end session flows over the service seam: login, play, logout.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use bancho_protocol::config::{BanchoConfig, REJECTION_TOKEN};
use bancho_protocol::service::BanchoService;
use bancho_protocol::session::make_safe_name;
use bancho_protocol::session::privileges::Privileges;
use bancho_protocol::session::stats::GameMode;
use bancho_protocol::storage::{Account, AccountStore, MemoryAccountStore};

const IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn account(id: i32, name: &str, privileges: Privileges) -> Account {
    Account {
        id,
        name: name.to_string(),
        safe_name: make_safe_name(name),
        privileges,
        country: "PL".to_string(),
        silence_end: 0,
        donor_end: 0,
        creation_time: 0,
        latest_activity: 0,
        clan_id: None,
        clan_tag: None,
        preferred_mode: GameMode::Osu,
    }
}

fn login_body(username: &str) -> Bytes {
    Bytes::from(format!(
        "{username}\n0123456789abcdef0123456789abcdef\nb20230101|1|0|p:a1.a2:b:c:d:|0\n"
    ))
}

fn packet(type_id: u16, payload: &[u8]) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_u16_le(type_id);
    buf.put_u8(0);
    buf.put_u32_le(payload.len() as u32);
    buf.put_slice(payload);
    buf
}

fn string_field(value: &str) -> BytesMut {
    let mut buf = BytesMut::new();
    if value.is_empty() {
        buf.put_u8(0);
    } else {
        buf.put_u8(0x0b);
        buf.put_u8(value.len() as u8); // fine below 128 bytes
        buf.put_slice(value.as_bytes());
    }
    buf
}

/// Type ids of every frame in a response stream, in order.
fn packet_ids(body: &[u8]) -> Vec<u16> {
    let mut ids = Vec::new();
    let mut offset = 0;
    while offset + 7 <= body.len() {
        ids.push(u16::from_le_bytes([body[offset], body[offset + 1]]));
        let len = u32::from_le_bytes([
            body[offset + 3],
            body[offset + 4],
            body[offset + 5],
            body[offset + 6],
        ]) as usize;
        offset += 7 + len;
    }
    assert_eq!(offset, body.len(), "response stream is cleanly framed");
    ids
}

fn two_player_service() -> (BanchoService, Arc<MemoryAccountStore>) {
    let store = Arc::new(MemoryAccountStore::new());
    store.insert_account(account(10, "Host Player", Privileges::UNRESTRICTED));
    store.insert_account(account(11, "Watcher", Privileges::UNRESTRICTED));
    let service = BanchoService::new(BanchoConfig::default(), store.clone()).unwrap();
    (service, store)
}

#[test]
fn login_stream_has_the_expected_shape() {
    let (service, _) = two_player_service();

    let response = service.handle_request(None, login_body("Host Player"), IP).unwrap();
    let token = response.token.unwrap();
    assert_ne!(token, REJECTION_TOKEN);

    let ids = packet_ids(&response.body);
    // protocol version, user id, privileges, welcome notification first
    assert_eq!(&ids[..4], &[75, 5, 71, 24]);
    // channel listing is terminated
    assert!(ids.contains(&64)); // join success for auto-join channels
    assert!(ids.contains(&89)); // channel info end
    // own presence and stats are present
    assert!(ids.contains(&83));
    assert!(ids.contains(&11));

    // the authenticated user id rides in the user-id packet
    let user_id_offset = 7 + 4 + 7; // after protocol-version frame + header
    let id = i32::from_le_bytes(
        response.body[user_id_offset..user_id_offset + 4]
            .try_into()
            .unwrap(),
    );
    assert_eq!(id, 10);
}

#[test]
fn garbage_version_is_rejected_before_any_account_lookup() {
    let store = Arc::new(MemoryAccountStore::new());
    store.insert_account(account(10, "Someone", Privileges::UNRESTRICTED));
    let service = BanchoService::new(BanchoConfig::default(), store.clone()).unwrap();

    let body = Bytes::from("Someone\nhash\ngarbage|0|0|p:a:b:c:d:|0\n");
    let response = service.handle_request(None, body, IP).unwrap();

    assert_eq!(response.token.unwrap(), REJECTION_TOKEN);
    assert_eq!(store.lookup_count(), 0);
}

#[test]
fn empty_adapters_rejected_unless_under_wine() {
    let (service, _) = two_player_service();

    let body = Bytes::from("Host Player\nhash\nb20230101|0|0|p::b:c:d:|0\n");
    let response = service.handle_request(None, body, IP).unwrap();
    assert_eq!(response.token.unwrap(), REJECTION_TOKEN);
    let ids = packet_ids(&response.body);
    assert_eq!(ids[0], 5); // user id sentinel
    assert_eq!(ids[1], 24); // notification

    let body = Bytes::from("Host Player\nhash\nb20230101|0|0|p:runningunderwine:b:c:d:|0\n");
    let response = service.handle_request(None, body, IP).unwrap();
    assert_ne!(response.token.unwrap(), REJECTION_TOKEN);
}

#[test]
fn duplicate_login_is_rejected_within_grace_window() {
    let (service, _) = two_player_service();

    let first = service.handle_request(None, login_body("Host Player"), IP).unwrap();
    assert_ne!(first.token.clone().unwrap(), REJECTION_TOKEN);

    let second = service.handle_request(None, login_body("Host Player"), IP).unwrap();
    assert_eq!(second.token.unwrap(), REJECTION_TOKEN);

    // the first session is untouched
    assert!(service.registry().get_by_token(&first.token.unwrap()).is_some());
}

#[test]
fn stale_session_is_replaced_when_grace_expired() {
    let store = Arc::new(MemoryAccountStore::new());
    store.insert_account(account(10, "Host Player", Privileges::UNRESTRICTED));
    let config = BanchoConfig::default_with_overrides(|c| c.relogin_grace = Duration::ZERO);
    let service = BanchoService::new(config, store).unwrap();

    let first = service.handle_request(None, login_body("Host Player"), IP).unwrap();
    let first_token = first.token.unwrap();

    let second = service.handle_request(None, login_body("Host Player"), IP).unwrap();
    let second_token = second.token.unwrap();

    assert_ne!(second_token, REJECTION_TOKEN);
    assert_ne!(second_token, first_token);
    assert!(service.registry().get_by_token(&first_token).is_none());
    assert!(service.registry().get_by_token(&second_token).is_some());
}

#[test]
fn unknown_account_gets_authentication_failure() {
    let (service, store) = two_player_service();

    let response = service.handle_request(None, login_body("Nobody Here"), IP).unwrap();
    assert_eq!(response.token.unwrap(), REJECTION_TOKEN);
    assert!(store.lookup_count() > 0);

    let body = &response.body;
    let code = i32::from_le_bytes(body[7..11].try_into().unwrap());
    assert_eq!(code, -1);
}

#[test]
fn restricted_login_is_not_announced() {
    let store = Arc::new(MemoryAccountStore::new());
    store.insert_account(account(10, "Watcher", Privileges::UNRESTRICTED));
    store.insert_account(account(66, "Shady", Privileges::VERIFIED)); // restricted
    let service = BanchoService::new(BanchoConfig::default(), store).unwrap();

    let watcher_token = service
        .handle_request(None, login_body("Watcher"), IP)
        .unwrap()
        .token
        .unwrap();
    // drain the watcher's queue
    service
        .handle_request(Some(&watcher_token), Bytes::new(), IP)
        .unwrap();

    let response = service.handle_request(None, login_body("Shady"), IP).unwrap();
    let ids = packet_ids(&response.body);
    assert!(ids.contains(&104)); // account restricted

    // the watcher heard nothing about the restricted login
    let watcher_view = service
        .handle_request(Some(&watcher_token), Bytes::new(), IP)
        .unwrap();
    assert!(watcher_view.body.is_empty());
}

#[test]
fn unrestricted_login_is_announced_to_others() {
    let (service, _) = two_player_service();

    let watcher_token = service
        .handle_request(None, login_body("Watcher"), IP)
        .unwrap()
        .token
        .unwrap();
    service
        .handle_request(Some(&watcher_token), Bytes::new(), IP)
        .unwrap();

    service.handle_request(None, login_body("Host Player"), IP).unwrap();

    let watcher_view = service
        .handle_request(Some(&watcher_token), Bytes::new(), IP)
        .unwrap();
    let ids = packet_ids(&watcher_view.body);
    assert!(ids.contains(&83)); // presence of the new login
    assert!(ids.contains(&11)); // and their stats
}

#[test]
fn chat_round_trip_between_two_sessions() {
    let (service, _) = two_player_service();

    let host_token = service
        .handle_request(None, login_body("Host Player"), IP)
        .unwrap()
        .token
        .unwrap();
    let watcher_token = service
        .handle_request(None, login_body("Watcher"), IP)
        .unwrap()
        .token
        .unwrap();

    // watcher sends a private message to the host
    let mut message = BytesMut::new();
    message.extend_from_slice(&string_field("")); // sender, server fills it
    message.extend_from_slice(&string_field("hello there"));
    message.extend_from_slice(&string_field("Host Player"));
    message.put_i32_le(0);
    let body = packet(25, &message).freeze();

    service.handle_request(Some(&watcher_token), body, IP).unwrap();

    let host_view = service.handle_request(Some(&host_token), Bytes::new(), IP).unwrap();
    let ids = packet_ids(&host_view.body);
    assert!(ids.contains(&7)); // send message
}

#[test]
fn logout_removes_every_trace_of_the_session() {
    let (service, _) = two_player_service();

    let host_token = service
        .handle_request(None, login_body("Host Player"), IP)
        .unwrap()
        .token
        .unwrap();
    let watcher_token = service
        .handle_request(None, login_body("Watcher"), IP)
        .unwrap()
        .token
        .unwrap();

    // watcher spectates the host, then logs out
    let mut spectate = BytesMut::new();
    spectate.put_i32_le(10);
    let body = packet(16, &spectate).freeze();
    service.handle_request(Some(&watcher_token), body, IP).unwrap();

    let host = service.registry().get_by_id(10).unwrap();
    assert_eq!(host.spectators(), vec![11]);

    let mut logout = BytesMut::new();
    logout.put_i32_le(0);
    let body = packet(2, &logout).freeze();
    service.handle_request(Some(&watcher_token), body, IP).unwrap();

    assert!(host.spectators().is_empty());
    assert!(service.registry().get_by_id(11).is_none());
    assert!(service.registry().get_by_token(&watcher_token).is_none());

    // the host is told their spectator left, and that the session logged out
    let host_view = service.handle_request(Some(&host_token), Bytes::new(), IP).unwrap();
    let ids = packet_ids(&host_view.body);
    assert!(ids.contains(&14)); // spectator left
    assert!(ids.contains(&12)); // user logout
}

#[test]
fn restriction_logs_out_and_audits() {
    let (service, store) = two_player_service();

    service.handle_request(None, login_body("Host Player"), IP).unwrap();
    let player = service.registry().get_by_id(10).unwrap();

    player
        .restrict(1, "multiaccounting", service.store(), service.registry(), service.channels())
        .unwrap();

    assert!(player.is_restricted());
    assert!(!player.is_online());
    assert!(service.registry().get_by_id(10).is_none());

    let audit = store.audit_entries();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].target_id, 10);
    assert_eq!(audit[0].action, "restrict");
    assert_eq!(audit[0].reason, "multiaccounting");

    // the persisted record lost the unrestricted bit
    let record = store.find_by_id(10).unwrap().unwrap();
    assert!(!record.privileges.intersects(Privileges::UNRESTRICTED));
}

#[test]
fn tournament_clients_may_hold_parallel_sessions() {
    let (service, _) = two_player_service();

    let tourney_body = |name: &str| {
        Bytes::from(format!(
            "{name}\n0123456789abcdef0123456789abcdef\nb20230101.1tourney|0|0|p:a1:b:c:d:|0\n"
        ))
    };

    let first = service.handle_request(None, tourney_body("Host Player"), IP).unwrap();
    assert_ne!(first.token.clone().unwrap(), REJECTION_TOKEN);

    let second = service.handle_request(None, tourney_body("Host Player"), IP).unwrap();
    assert_ne!(second.token.unwrap(), REJECTION_TOKEN);
}

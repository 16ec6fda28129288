//! End-to-end flows through the portal and services over the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use helpdesk_core::backend::{AuthBackend, Backend};
use helpdesk_core::config::HelpdeskConfig;
use helpdesk_core::schema::{Role, TicketPriority, TicketSeverity, TicketStatus, TicketUpdate};
use helpdesk_core::testing::new_client;
use helpdesk_core::{assert_api_err, assert_api_ok, PortalKind};
use helpdesk_runtime::backend::{
    DEMO_ADMIN_EMAIL, DEMO_CONTACT_EMAIL, DEMO_INVITED_EMAIL, DEMO_PASSWORD,
};
use helpdesk_runtime::pages::AddClientPage;
use helpdesk_runtime::services::{CreateTicketParams, INVITE_FAILED_WARNING};
use helpdesk_runtime::{
    MemoryBackend, Operation, Portal, Screen, Services, View, ADD_CLIENT_PATH, SIGN_IN_PATH,
};

async fn signed_in(portal: &Portal, email: &str) {
    assert_api_ok!(portal.services().auth.sign_in(email, DEMO_PASSWORD).await);
    portal
        .session()
        .wait_until(|s| s.is_authenticated())
        .await
        .expect("session store stopped");
}

fn redirect_target(view: View) -> String {
    match view {
        View::Redirect(nav) => nav.to,
        other => panic!("expected a redirect, got {:?}", other),
    }
}

fn admin_services() -> (Arc<MemoryBackend>, Services) {
    let memory = Arc::new(MemoryBackend::new());
    memory.add_user("admin@example.com", "pw", Some(Role::Admin), None, None);
    let services = Services::new(
        Backend::from_shared(memory.clone()),
        chrono::Duration::days(7),
    );
    (memory, services)
}

#[tokio::test]
async fn signed_in_user_skips_sign_in_form() {
    let (portal, _, _) = Portal::demo(PortalKind::Client);
    portal.ready().await;
    assert!(matches!(
        portal.open("/auth/sign-in").await,
        View::Screen(screen) if matches!(*screen, Screen::SignIn(_))
    ));

    signed_in(&portal, DEMO_CONTACT_EMAIL).await;
    assert_eq!(redirect_target(portal.open("/auth/sign-in").await), "/");
    assert_eq!(redirect_target(portal.open("/auth/sign-up").await), "/");
}

#[tokio::test]
async fn pages_wait_for_session_restore() {
    let memory = Arc::new(MemoryBackend::new());
    memory.add_user("grace@example.com", "pw", Some(Role::ClientContact), None, None);
    memory
        .sign_in_with_password("grace@example.com", "pw")
        .await
        .unwrap();
    let portal = Portal::new(
        HelpdeskConfig::memory(PortalKind::Client),
        Backend::from_shared(memory.clone()),
    );

    for path in ["/auth/sign-in", "/auth/sign-up", "/auth/callback", "/nowhere", "/"] {
        assert!(
            matches!(portal.open(path).await, View::Loading),
            "{} mounted before the session was restored",
            path
        );
    }

    portal.ready().await;
    assert_eq!(redirect_target(portal.open("/auth/sign-in").await), "/");
}

#[tokio::test]
async fn guarded_pages_redirect_anonymous_users() {
    let (portal, _, _) = Portal::demo(PortalKind::Admin);
    portal.ready().await;

    for path in ["/", "/protected", "/dashboard", "/tickets", "/add-client"] {
        assert_eq!(redirect_target(portal.open(path).await), SIGN_IN_PATH, "{}", path);
    }
}

#[tokio::test]
async fn invite_failure_is_a_warning() {
    let (memory, services) = admin_services();
    memory
        .sign_in_with_password("admin@example.com", "pw")
        .await
        .unwrap();
    memory.fail_next(Operation::InsertInvite, "duplicate key value");

    let result = services
        .clients
        .create_client_with_invite(new_client("Acme"))
        .await;
    assert!(result.error.is_none());
    assert_eq!(result.warning.as_deref(), Some(INVITE_FAILED_WARNING));
    let client = result.data.unwrap();
    assert_eq!(memory.invites_snapshot().len(), 0);

    let fetched = assert_api_ok!(services.clients.get_client_by_id(client.id).await).unwrap();
    assert_eq!(fetched.name, "Acme");
}

#[tokio::test]
async fn failed_client_insert_sends_no_invite() {
    let (memory, services) = admin_services();
    memory
        .sign_in_with_password("admin@example.com", "pw")
        .await
        .unwrap();
    memory.fail_next(Operation::InsertClient, "new row violates row-level security policy");

    let result = services
        .clients
        .create_client_with_invite(new_client("Acme"))
        .await;
    assert!(result.data.is_none());
    assert!(result.error.is_some());
    memory.assert_not_called(Operation::InsertInvite);
}

#[tokio::test]
async fn update_of_unknown_ticket_stops_early() {
    let (portal, memory, _) = Portal::demo(PortalKind::Admin);
    portal.ready().await;
    signed_in(&portal, DEMO_ADMIN_EMAIL).await;
    memory.clear_calls();

    let updates = TicketUpdate {
        status: Some(TicketStatus::Closed),
        ..Default::default()
    };
    assert_api_err!(
        portal
            .services()
            .tickets
            .update_ticket(Uuid::new_v4(), updates)
            .await
    );
    assert_eq!(memory.call_count(Operation::FindTicket), 1);
    memory.assert_not_called(Operation::UpdateTicket);
}

#[tokio::test]
async fn dashboard_without_clients_goes_to_add_client() {
    let memory = Arc::new(MemoryBackend::new());
    memory.add_user("admin@example.com", "pw", Some(Role::Admin), None, None);
    let portal = Portal::new(
        HelpdeskConfig::memory(PortalKind::Admin),
        Backend::from_shared(memory.clone()),
    );
    portal.ready().await;
    memory
        .sign_in_with_password("admin@example.com", "pw")
        .await
        .unwrap();
    portal
        .session()
        .wait_until(|s| s.is_authenticated())
        .await
        .unwrap();

    assert_eq!(redirect_target(portal.open("/dashboard").await), ADD_CLIENT_PATH);
    assert_eq!(redirect_target(portal.open("/clients").await), ADD_CLIENT_PATH);

    let mut page = AddClientPage::new(portal.services().clients.clone());
    page.name = "Acme".into();
    page.first_name = "Grace".into();
    page.last_name = "Hopper".into();
    page.email = "grace@acme.example.com".into();
    assert!(page.submit().await.is_some());

    portal.refresh_scope().await;
    match portal.open("/dashboard").await {
        View::Screen(screen) => match *screen {
            Screen::Dashboard(page) => {
                assert_eq!(page.client_name.as_deref(), Some("Acme"));
                assert_eq!(page.stats.data().unwrap().total, 0);
            }
            other => panic!("unexpected screen {:?}", other),
        },
        other => panic!("unexpected view {:?}", other),
    }
}

#[tokio::test]
async fn created_ticket_reads_back_as_new() {
    let (portal, _, demo) = Portal::demo(PortalKind::Client);
    portal.ready().await;
    signed_in(&portal, DEMO_CONTACT_EMAIL).await;
    let tickets = &portal.services().tickets;

    let created = assert_api_ok!(
        tickets
            .create_ticket(CreateTicketParams {
                ticket_type_id: Some(1),
                title: "VPN drops every hour".into(),
                description: "Since the last update".into(),
                priority: TicketPriority::High,
                severity: Some(TicketSeverity::Major),
                client_id: None,
            })
            .await
    )
    .unwrap();

    let fetched = assert_api_ok!(tickets.get_ticket_by_id(created.id).await).unwrap();
    assert_eq!(fetched.status, TicketStatus::New);
    assert_eq!(fetched.requester_id, demo.contact_id);
    assert_eq!(fetched.client_id, Some(demo.acme_id));
    assert_eq!(fetched.severity, Some(TicketSeverity::Major));

    // Newest first in the contact's list.
    let list = assert_api_ok!(tickets.get_tickets().await).unwrap();
    assert_eq!(list[0].id, created.id);
}

#[tokio::test]
async fn sent_message_is_listed_last() {
    let (portal, _, demo) = Portal::demo(PortalKind::Admin);
    portal.ready().await;
    signed_in(&portal, DEMO_ADMIN_EMAIL).await;
    let tickets = &portal.services().tickets;
    let ticket_id = demo.ticket_ids[0];

    let sent = assert_api_ok!(tickets.create_message(ticket_id, "Looking into it").await).unwrap();
    assert_eq!(sent.author_id, demo.admin_id);

    let messages = assert_api_ok!(tickets.get_messages(ticket_id).await).unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages.last().unwrap().id, sent.id);
    assert!(messages
        .windows(2)
        .all(|pair| pair[0].created_at <= pair[1].created_at));
}

#[tokio::test]
async fn contact_only_sees_own_tenant() {
    let (portal, _, demo) = Portal::demo(PortalKind::Client);
    portal.ready().await;
    signed_in(&portal, DEMO_CONTACT_EMAIL).await;
    let tickets = &portal.services().tickets;

    let globex_ticket = demo.ticket_ids[3];
    assert_api_err!(tickets.get_ticket_by_id(globex_ticket).await, "NOT_FOUND");
    assert!(assert_api_ok!(tickets.get_client_tickets(demo.globex_id).await)
        .unwrap()
        .is_empty());
    assert_api_err!(
        tickets
            .update_ticket(
                demo.ticket_ids[0],
                TicketUpdate {
                    status: Some(TicketStatus::Closed),
                    ..Default::default()
                },
            )
            .await
    );
}

#[tokio::test]
async fn invited_contact_signs_up_and_sees_tenant_tickets() {
    let (portal, memory, demo) = Portal::demo(PortalKind::Client);
    portal.ready().await;
    let auth = &portal.services().auth;

    assert_api_ok!(auth.validate_invite(DEMO_INVITED_EMAIL).await);
    let outcome = assert_api_ok!(
        auth.sign_up_with_invite(DEMO_INVITED_EMAIL, "penguin42", "Linus Torvalds")
            .await
    )
    .unwrap();
    assert_eq!(outcome.user.client_id, Some(demo.globex_id));
    assert!(memory
        .invites_snapshot()
        .iter()
        .all(|invite| invite.used_at.is_some()));

    portal
        .session()
        .wait_until(|s| s.is_authenticated())
        .await
        .unwrap();
    let list = assert_api_ok!(portal.services().tickets.get_tickets().await).unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].client_id, Some(demo.globex_id));

    // The invite cannot be used twice.
    assert_api_err!(auth.validate_invite(DEMO_INVITED_EMAIL).await, "NOT_FOUND");
}

#[tokio::test]
async fn auth_callback_establishes_session() {
    let (portal, memory, demo) = Portal::demo(PortalKind::Client);
    portal.ready().await;

    let contact = memory
        .sign_in_with_password(DEMO_CONTACT_EMAIL, DEMO_PASSWORD)
        .await
        .unwrap()
        .user;
    memory.sign_out().await.unwrap();
    portal
        .session()
        .wait_until(|s| s.resolved && !s.is_authenticated())
        .await
        .unwrap();
    assert_eq!(contact.id, demo.contact_id);

    let (access, refresh) = memory.issue_tokens(&contact).unwrap();
    let url = format!(
        "/auth/callback#access_token={}&refresh_token={}&type=magiclink",
        access, refresh
    );
    match portal.open(&url).await {
        View::Screen(screen) => match *screen {
            Screen::AuthCallback { page, next } => {
                assert!(page.error.is_none());
                assert_eq!(next.to, "/");
                assert!(next.delay.is_none());
            }
            other => panic!("unexpected screen {:?}", other),
        },
        other => panic!("unexpected view {:?}", other),
    }

    let snapshot = portal
        .session()
        .wait_until(|s| s.is_authenticated())
        .await
        .unwrap();
    assert_eq!(snapshot.role, Some(Role::ClientContact));
}

#[tokio::test]
async fn auth_callback_without_tokens_returns_to_sign_in() {
    let (portal, _, _) = Portal::demo(PortalKind::Admin);
    portal.ready().await;

    match portal.open("/auth/callback").await {
        View::Screen(screen) => match *screen {
            Screen::AuthCallback { page, next } => {
                assert!(page.error.is_some());
                assert_eq!(next.to, SIGN_IN_PATH);
                assert_eq!(next.delay, Some(Duration::from_millis(3000)));
            }
            other => panic!("unexpected screen {:?}", other),
        },
        other => panic!("unexpected view {:?}", other),
    }
}

#[tokio::test]
async fn closing_the_portal_stops_the_session_listener() {
    let (mut portal, _, _) = Portal::demo(PortalKind::Admin);
    portal.ready().await;
    assert!(!portal.session().is_closed());

    portal.close();
    assert!(portal.session().is_closed());
}

//! Terminal rendering of mounted pages.
//!
//! Each renderer prompts, drives the page controller, and returns the next
//! location, or `None` to quit.

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, Input, Password, Select};
use std::time::Duration;

use helpdesk_core::schema::{Ticket, TicketPriority, TicketSeverity, TicketStatus};
use helpdesk_core::PortalKind;
use helpdesk_runtime::pages::{
    AddClientPage, AddTicketPage, AdminSignUpPage, ClientDetailPage, ClientsPage, DashboardPage,
    HomePage, InviteSignUpPage, SignInPage, SignUpPage, SignUpStep, TicketDetailPage,
    TicketsPage,
};
use helpdesk_runtime::{Navigation, Portal, Screen, SIGN_IN_PATH};

use super::run::spinner;

const QUIT: &str = "Quit";
const HOME: &str = "Home";

/// How long to wait for the session stream after signing in or out.
const SESSION_SETTLE: Duration = Duration::from_secs(5);

pub async fn render(portal: &Portal, screen: Screen, location: &str) -> Result<Option<String>> {
    match screen {
        Screen::Home(page) => home(portal, page).await,
        Screen::Protected(page) => {
            heading("Protected Page");
            println!("  Email: {}", page.email.as_deref().unwrap_or("-"));
            println!("  Role:  {}", page.role.as_deref().unwrap_or("-"));
            back_or_quit("/")
        }
        Screen::Dashboard(page) => dashboard(portal, page),
        Screen::Clients(page) => clients(page),
        Screen::ClientDetail(page) => client_detail(portal, page),
        Screen::AddClient(page) => add_client(portal, page).await,
        Screen::Tickets(page) => tickets(portal, page),
        Screen::AddTicket(page) => add_ticket(page).await,
        Screen::TicketDetail(page) => ticket_detail(page, location).await,
        Screen::SignIn(page) => sign_in(portal, page).await,
        Screen::SignUp(SignUpPage::Admin(page)) => admin_sign_up(portal, page).await,
        Screen::SignUp(SignUpPage::Invite(page)) => invite_sign_up(portal, page).await,
        Screen::AuthCallback { page, next } => {
            heading("Signing you in");
            if let Some(err) = &page.error {
                failure(err);
                if let Some(delay) = next.delay {
                    println!("  Redirecting to sign in in {}s...", delay.as_secs());
                }
            } else {
                wait_for_session(portal, true).await;
            }
            Ok(Some(follow(next).await))
        }
        Screen::NotFound(page) => {
            failure(&page.message());
            back_or_quit(&page.home().to)
        }
    }
}

// =========================================================================
// PROMPTS
// =========================================================================

fn heading(title: &str) {
    println!();
    println!("  {}", style(title).bold().cyan());
    println!();
}

fn failure(message: &str) {
    println!("  {} {}", style("✗").red(), style(message).red());
}

fn choose<S: std::fmt::Display>(prompt: &str, items: &[S]) -> Result<usize> {
    Ok(Select::new()
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact()?)
}

fn text(prompt: &str, initial: &str, allow_empty: bool) -> Result<String> {
    let input = Input::<String>::new()
        .with_prompt(prompt)
        .allow_empty(allow_empty);
    let input = if initial.is_empty() {
        input
    } else {
        input.with_initial_text(initial)
    };
    Ok(input.interact_text()?)
}

fn secret(prompt: &str) -> Result<String> {
    Ok(Password::new().with_prompt(prompt).interact()?)
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new().with_prompt(prompt).default(true).interact()?)
}

/// Menu of `(label, location)` pairs plus Quit.
fn menu(entries: Vec<(String, String)>) -> Result<Option<String>> {
    let mut labels: Vec<String> = entries.iter().map(|(label, _)| label.clone()).collect();
    labels.push(QUIT.to_string());
    let picked = choose("Go to", &labels)?;
    Ok(entries.into_iter().nth(picked).map(|(_, to)| to))
}

fn back_or_quit(to: &str) -> Result<Option<String>> {
    menu(vec![(HOME.to_string(), to.to_string())])
}

async fn follow(nav: Navigation) -> String {
    if let Some(delay) = nav.delay {
        tokio::time::sleep(delay).await;
    }
    nav.to
}

/// The session store updates from the auth stream; wait so the guard sees it.
async fn wait_for_session(portal: &Portal, signed_in: bool) {
    let settled = portal
        .session()
        .wait_until(|s| s.resolved && s.is_authenticated() == signed_in);
    if tokio::time::timeout(SESSION_SETTLE, settled).await.is_err() {
        tracing::warn!(signed_in, "Session change not observed in time");
    }
}

fn ticket_line(ticket: &Ticket) -> String {
    format!(
        "{:<8} {:<7} {}",
        ticket.status.as_str(),
        ticket.priority.as_str(),
        ticket.title
    )
}

fn index_of<T: PartialEq>(all: &[T], value: &T) -> usize {
    all.iter().position(|v| v == value).unwrap_or(0)
}

// =========================================================================
// PAGES
// =========================================================================

async fn home(portal: &Portal, mut page: HomePage) -> Result<Option<String>> {
    heading(page.title());
    if let Some(email) = &page.email {
        println!("  Signed in as {}", style(email).bold());
    }

    let links = page.links();
    let mut labels: Vec<&str> = links.iter().map(|l| l.label).collect();
    labels.push("Sign out");
    labels.push(QUIT);

    let picked = choose("Go to", &labels)?;
    if let Some(link) = links.get(picked) {
        return Ok(Some(link.to.to_string()));
    }
    if picked == links.len() {
        return match page.sign_out(&portal.services().auth).await {
            Ok(nav) => {
                wait_for_session(portal, false).await;
                println!("  {} Signed out", style("✓").green());
                Ok(Some(nav.to))
            }
            Err(message) => {
                failure(&message);
                Ok(Some("/".to_string()))
            }
        };
    }
    Ok(None)
}

fn dashboard(portal: &Portal, page: DashboardPage) -> Result<Option<String>> {
    heading("Dashboard");
    let scope = portal.scope();
    println!(
        "  Client: {}",
        style(page.client_name.as_deref().unwrap_or("-")).bold()
    );
    if let Some(err) = &page.stats.error {
        failure(err);
    } else if let Some(stats) = page.stats.data() {
        println!("  Total tickets:      {}", stats.total);
        println!("  Awaiting response:  {}", stats.awaiting_response);
        println!("  Urgent:             {}", stats.urgent);
    }
    println!();

    let clients = scope.clients();
    let mut entries = vec![
        ("Clients".to_string(), "/clients".to_string()),
        ("Tickets".to_string(), "/tickets".to_string()),
        ("Add client".to_string(), "/add-client".to_string()),
        (HOME.to_string(), "/".to_string()),
    ];
    if clients.len() > 1 {
        entries.insert(0, ("Switch client".to_string(), String::new()));
    }

    match menu(entries)? {
        Some(to) if to.is_empty() => {
            let names: Vec<&str> = clients.iter().map(|c| c.name.as_str()).collect();
            let picked = choose("Active client", &names)?;
            if let Some(client) = clients.get(picked) {
                scope.set_active_client(client.id);
            }
            Ok(Some("/dashboard".to_string()))
        }
        other => Ok(other),
    }
}

fn clients(page: ClientsPage) -> Result<Option<String>> {
    heading("Clients");
    if let Some(err) = &page.list.error {
        failure(err);
    }
    let mut entries: Vec<(String, String)> = page
        .list
        .data()
        .map(|clients| {
            clients
                .iter()
                .map(|c| {
                    (
                        format!("{} ({})", c.name, c.contact_info.full_name()),
                        format!("/clients/{}", c.id),
                    )
                })
                .collect()
        })
        .unwrap_or_default();
    entries.push(("Add client".to_string(), "/add-client".to_string()));
    entries.push(("Dashboard".to_string(), "/dashboard".to_string()));
    menu(entries)
}

fn client_detail(portal: &Portal, page: ClientDetailPage) -> Result<Option<String>> {
    let back = match portal.kind() {
        PortalKind::Admin => "/clients",
        PortalKind::Client => "/",
    };
    let Some(client) = page.client.data() else {
        failure(page.client.error.as_deref().unwrap_or("Client not found"));
        return back_or_quit(back);
    };

    heading(&client.name);
    let contact = &client.contact_info;
    println!("  Contact: {} <{}>", contact.full_name(), contact.email);
    if let Some(phone) = &contact.phone {
        println!("  Phone:   {}", phone);
    }
    if let Some(notes) = &client.notes {
        println!("  Notes:   {}", notes);
    }
    println!();

    if let Some(err) = &page.client_tickets.error {
        failure(err);
    }
    let mut entries: Vec<(String, String)> = page
        .client_tickets
        .data()
        .map(|tickets| {
            tickets
                .iter()
                .map(|t| (ticket_line(t), format!("/tickets/{}", t.id)))
                .collect()
        })
        .unwrap_or_default();
    if portal.kind() == PortalKind::Client {
        if let Some(nav) = page.new_ticket_link() {
            entries.push(("New ticket for this client".to_string(), nav.to));
        }
    }
    entries.push(("Back".to_string(), back.to_string()));
    menu(entries)
}

async fn add_client(portal: &Portal, mut page: AddClientPage) -> Result<Option<String>> {
    heading("Add Client");
    loop {
        page.name = text("Organization name", &page.name, false)?;
        page.first_name = text("Contact first name", &page.first_name, false)?;
        page.last_name = text("Contact last name", &page.last_name, false)?;
        page.email = text("Contact email", &page.email, false)?;
        page.phone = text("Phone (optional)", &page.phone, true)?;
        page.notes = text("Notes (optional)", &page.notes, true)?;

        let pb = spinner("Creating client...")?;
        let nav = page.submit().await;
        pb.finish_and_clear();

        if let Some(nav) = nav {
            println!("  {} Client created", style("✓").green());
            if let Some(warning) = &page.warning {
                println!("  {} {}", style("⚠").yellow(), style(warning).yellow());
            }
            portal.refresh_scope().await;
            return Ok(Some(nav.to));
        }
        if let Some(err) = &page.error {
            failure(err);
        }
        if !confirm("Try again?")? {
            return Ok(Some("/".to_string()));
        }
    }
}

fn tickets(portal: &Portal, page: TicketsPage) -> Result<Option<String>> {
    heading(match portal.kind() {
        PortalKind::Admin => "All Tickets",
        PortalKind::Client => "My Tickets",
    });
    if let Some(err) = &page.list.error {
        failure(err);
    }
    let mut entries: Vec<(String, String)> = page
        .list
        .data()
        .map(|tickets| {
            tickets
                .iter()
                .map(|t| (ticket_line(t), format!("/tickets/{}", t.id)))
                .collect()
        })
        .unwrap_or_default();
    if portal.kind() == PortalKind::Client {
        entries.push(("Create new ticket".to_string(), "/tickets/new".to_string()));
    }
    entries.push((HOME.to_string(), "/".to_string()));
    menu(entries)
}

async fn add_ticket(mut page: AddTicketPage) -> Result<Option<String>> {
    heading("New Ticket");
    if let Some(err) = &page.types.error {
        failure(err);
    }
    let types = page.types.data().cloned().unwrap_or_default();

    loop {
        if !types.is_empty() {
            let names: Vec<&str> = types.iter().map(|t| t.name.as_str()).collect();
            let current = types
                .iter()
                .position(|t| Some(t.id) == page.ticket_type_id)
                .unwrap_or(0);
            let picked = Select::new()
                .with_prompt("Type")
                .items(&names)
                .default(current)
                .interact()?;
            page.ticket_type_id = types.get(picked).map(|t| t.id);
        }
        page.title = text("Title", &page.title, false)?;
        page.description = text("Description", &page.description, false)?;

        let picked = Select::new()
            .with_prompt("Priority")
            .items(&TicketPriority::ALL)
            .default(index_of(&TicketPriority::ALL, &page.priority))
            .interact()?;
        page.priority = TicketPriority::ALL[picked];

        let picked = Select::new()
            .with_prompt("Severity")
            .items(&TicketSeverity::ALL)
            .default(index_of(&TicketSeverity::ALL, &page.severity))
            .interact()?;
        page.severity = TicketSeverity::ALL[picked];

        let pb = spinner("Filing ticket...")?;
        let nav = page.submit().await;
        pb.finish_and_clear();

        if let Some(nav) = nav {
            println!("  {} Ticket created", style("✓").green());
            return Ok(Some(nav.to));
        }
        if let Some(err) = &page.error {
            failure(err);
        }
        if !confirm("Try again?")? {
            return Ok(Some("/tickets".to_string()));
        }
    }
}

fn print_ticket(page: &TicketDetailPage, ticket: &Ticket) {
    heading(&ticket.title);
    println!(
        "  Status: {}   Priority: {}   Severity: {}",
        style(ticket.status).bold(),
        ticket.priority,
        ticket
            .severity
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("  Type:     {}", page.type_name().unwrap_or("-"));
    println!(
        "  Assignee: {}",
        ticket
            .assigned_agent_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unassigned".to_string())
    );
    println!("  Opened:   {}", ticket.created_at.format("%Y-%m-%d %H:%M"));
    if let Some(description) = &ticket.description {
        println!();
        println!("  {}", description);
    }

    println!();
    println!("  {}", style("Messages").bold());
    if let Some(err) = &page.messages.error {
        failure(err);
    }
    match page.messages.data() {
        Some(messages) if !messages.is_empty() => {
            for message in messages {
                println!(
                    "  {} {}: {}",
                    style(message.created_at.format("%m-%d %H:%M")).dim(),
                    &message.author_id.simple().to_string()[..8],
                    message.content
                );
            }
        }
        _ => println!("  {}", style("No messages yet").dim()),
    }
    println!();
}

async fn ticket_detail(mut page: TicketDetailPage, location: &str) -> Result<Option<String>> {
    loop {
        let Some(ticket) = page.ticket.data().cloned() else {
            failure(page.ticket.error.as_deref().unwrap_or("Ticket not found"));
            return back_or_quit("/tickets");
        };
        print_ticket(&page, &ticket);

        let mut actions = vec!["Reply"];
        if page.is_editable() {
            actions.push("Edit");
        }
        actions.extend(["Refresh", "Back", QUIT]);

        match actions[choose("Action", &actions)?] {
            "Reply" => {
                page.new_message = text("Message", &page.new_message, false)?;
                page.send_message().await;
                if let Some(err) = &page.msg_error {
                    failure(err);
                }
            }
            "Edit" => {
                edit_ticket(&mut page)?;
                let pb = spinner("Saving...")?;
                page.update().await;
                pb.finish_and_clear();
                match &page.update_error {
                    Some(err) => failure(err),
                    None => println!("  {} Ticket updated", style("✓").green()),
                }
            }
            "Refresh" => return Ok(Some(location.to_string())),
            "Back" => return Ok(Some("/tickets".to_string())),
            _ => return Ok(None),
        }
    }
}

fn edit_ticket(page: &mut TicketDetailPage) -> Result<()> {
    let Some(form) = page.form.as_mut() else {
        return Ok(());
    };

    let picked = Select::new()
        .with_prompt("Status")
        .items(&TicketStatus::ALL)
        .default(index_of(&TicketStatus::ALL, &form.status))
        .interact()?;
    form.status = TicketStatus::ALL[picked];

    let picked = Select::new()
        .with_prompt("Priority")
        .items(&TicketPriority::ALL)
        .default(index_of(&TicketPriority::ALL, &form.priority))
        .interact()?;
    form.priority = TicketPriority::ALL[picked];

    let picked = Select::new()
        .with_prompt("Severity")
        .items(&TicketSeverity::ALL)
        .default(index_of(&TicketSeverity::ALL, &form.severity))
        .interact()?;
    form.severity = TicketSeverity::ALL[picked];

    form.assignee = text("Assigned agent id (blank to unassign)", &form.assignee, true)?;
    Ok(())
}

async fn sign_in(portal: &Portal, mut page: SignInPage) -> Result<Option<String>> {
    heading("Sign In");
    loop {
        page.email = text("Email", &page.email, false)?;
        page.password = secret("Password")?;

        let pb = spinner("Signing in...")?;
        let nav = page.submit().await;
        pb.finish_and_clear();

        if let Some(nav) = nav {
            wait_for_session(portal, true).await;
            return Ok(Some(nav.to));
        }
        if let Some(err) = &page.error {
            failure(err);
        }
        match choose("Next", &["Try again", "Sign up", QUIT])? {
            0 => continue,
            1 => return Ok(Some("/auth/sign-up".to_string())),
            _ => return Ok(None),
        }
    }
}

async fn admin_sign_up(portal: &Portal, mut page: AdminSignUpPage) -> Result<Option<String>> {
    heading("Create Account");
    loop {
        page.email = text("Email", &page.email, false)?;
        page.password = secret("Password")?;

        let pb = spinner("Creating account...")?;
        let nav = page.submit().await;
        pb.finish_and_clear();

        if let Some(nav) = nav {
            if let Some(notice) = &page.notice {
                println!("  {} {}", style("ℹ").blue(), notice);
            } else {
                wait_for_session(portal, true).await;
            }
            return Ok(Some(nav.to));
        }
        if let Some(err) = &page.error {
            failure(err);
        }
        if !confirm("Try again?")? {
            return Ok(Some(SIGN_IN_PATH.to_string()));
        }
    }
}

async fn invite_sign_up(portal: &Portal, mut page: InviteSignUpPage) -> Result<Option<String>> {
    heading("Create Account");
    while page.step == SignUpStep::Email {
        page.email = text("Invited email", &page.email, false)?;
        page.check_invite().await;
        if let Some(err) = &page.error {
            failure(err);
            if !confirm("Try another email?")? {
                return Ok(Some(SIGN_IN_PATH.to_string()));
            }
        }
    }

    println!("  {} Invite found for {}", style("✓").green(), page.email);
    loop {
        page.full_name = text("Full name", &page.full_name, false)?;
        page.password = secret("Password")?;

        let pb = spinner("Creating account...")?;
        let nav = page.submit().await;
        pb.finish_and_clear();

        if let Some(nav) = nav {
            if nav.to == SIGN_IN_PATH {
                println!(
                    "  {} Check your email to confirm your account, then sign in.",
                    style("ℹ").blue()
                );
            } else {
                wait_for_session(portal, true).await;
            }
            return Ok(Some(nav.to));
        }
        if let Some(err) = &page.error {
            failure(err);
        }
        if !confirm("Try again?")? {
            return Ok(Some(SIGN_IN_PATH.to_string()));
        }
    }
}

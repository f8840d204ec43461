//! Demo driver: two people share a household, build a list and dissolve it.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;
use std::sync::Arc;

use clap::Parser;
use household::domain::{DomainResult, ItemDraft, ListDraft, RandomShareTokenSource, TraceId};
use household::{HouseholdServices, HouseholdSettings};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_ITEMS: [&str; 3] = ["Milk", "Eggs", "Bread"];

/// `household-demo` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "household-demo",
    about = "Walk through a shared household against the in-memory store",
    version
)]
struct DemoArgs {
    /// Name of the shared list to create.
    #[arg(long = "list-name", value_name = "name", default_value = "Groceries")]
    list_name: String,
    /// Item to add to the list. Repeat for several items.
    #[arg(long = "item", value_name = "description")]
    items: Vec<String>,
}

fn main() -> io::Result<()> {
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(%error, "tracing init failed");
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = DemoArgs::try_parse().map_err(io::Error::other)?;
    // Flags belong to the demo; settings come from the environment and files.
    let settings = HouseholdSettings::load_from_iter([OsString::from("household-demo")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;

    let services = HouseholdServices::in_memory(
        &settings,
        Arc::new(DefaultClock),
        Arc::new(RandomShareTokenSource),
    )
    .map_err(|error| io::Error::other(format!("build services: {error}")))?;

    let outcome = TraceId::within(run_scenario(&services, args)).await;
    let processed = services.shutdown().await;
    info!(cleanup_jobs = processed, "demo finished");
    outcome.map_err(|error| io::Error::other(format!("scenario failed: {error}")))
}

async fn run_scenario(services: &HouseholdServices, args: DemoArgs) -> DomainResult<()> {
    let alice = services.accounts.register("Alice", None).await?;
    let bob = services.accounts.register("Bob", None).await?;

    let token = services.membership.rotate_share_token(&alice).await?;
    let room = services
        .membership
        .join_room_by_token(&bob, token.as_ref())
        .await?;
    info!(room_id = %room.id, members = room.member_ids.len(), "household formed");

    let alice = services.accounts.find_user(&alice.id).await?;
    let bob = services.accounts.find_user(&bob.id).await?;

    let list = services
        .lists
        .create_list(
            &alice,
            &room.id,
            ListDraft {
                name: args.list_name,
                ..ListDraft::default()
            },
        )
        .await?;

    let descriptions = if args.items.is_empty() {
        DEFAULT_ITEMS.into_iter().map(String::from).collect()
    } else {
        args.items
    };
    let mut created = Vec::with_capacity(descriptions.len());
    for description in descriptions {
        let item = services
            .items
            .create_item(
                &bob,
                &room.id,
                &list.id,
                ItemDraft {
                    description,
                    ..ItemDraft::default()
                },
            )
            .await?;
        created.push(item);
    }

    if let (Some(first), Some(last)) = (created.first(), created.last())
        && first.id != last.id
    {
        services
            .items
            .reposition_item(&alice, &room.id, &list.id, &last.id, None, Some(first.id))
            .await?;
    }

    let items = services
        .items
        .list_items(&alice, &room.id, &list.id, false)
        .await?;
    let order: Vec<&str> = items.iter().map(|item| item.description.as_ref()).collect();
    info!(list_id = %list.id, ?order, "list contents");

    let dissolved = services.membership.vote_deletion(&alice).await?;
    info!(dissolved, "first deletion vote recorded");
    let dissolved = services.membership.vote_deletion(&bob).await?;
    info!(dissolved, "second deletion vote recorded");
    Ok(())
}

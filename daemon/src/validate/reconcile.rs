use futures::stream::StreamExt;
use kube::{
    Api, ResourceExt,
    client::Client,
    runtime::{Controller, controller::Action},
};
use kube_leader_election::{LeaseLock, LeaseLockParams, LeaseLockResult};
use owo_colors::OwoColorize;
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use krang_types::Validation;

use super::actions;
use crate::util::{
    Error,
    colors::{FG1, FG2},
};

#[cfg(feature = "metrics")]
use crate::util::metrics::ControllerMetrics;

const LEASE_ID: &str = "krangd-leader-election.k8s.cni.cncf.io";

/// Entrypoint for the Validation controller. Leader-elected: exactly one
/// active replica cluster-wide runs reconciliation at any time.
pub async fn run(client: Client, shutdown: CancellationToken) -> Result<(), Error> {
    println!("{}", "⚙️ Starting Validation controller...".green());

    let context: Arc<ContextData> = Arc::new(ContextData::new(client.clone()));

    let lease_namespace = std::env::var("NAMESPACE").unwrap_or_else(|_| "kube-system".to_string());
    let holder_id = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("krangd-validation-{}", uuid::Uuid::new_v4()));
    let lease_ttl = Duration::from_secs(15);
    let renew_every = Duration::from_secs(5);
    let leadership = LeaseLock::new(
        client.clone(),
        &lease_namespace,
        LeaseLockParams {
            holder_id,
            lease_name: LEASE_ID.to_string(),
            lease_ttl,
        },
    );

    let mut controller_task: Option<tokio::task::JoinHandle<()>> = None;
    let mut tick = tokio::time::interval(renew_every);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                if let Some(task) = controller_task.take() {
                    task.abort();
                    task.await.ok();
                }
                break Ok(())
            },
            _ = tick.tick() => {}
        }

        let lease = match leadership.try_acquire_or_renew().await {
            Ok(l) => l,
            Err(e) => {
                eprintln!("leader election renew/acquire failed: {e}");
                if let Some(task) = controller_task.take() {
                    task.abort();
                    eprintln!("aborted Validation controller due to leader election error");
                }
                continue;
            }
        };

        if matches!(lease, LeaseLockResult::Acquired(_)) {
            if controller_task.is_none() {
                println!("{}", "👑 Acquired leadership; starting Validation controller".green());
                let client_for_controller = client.clone();
                let context_for_controller = context.clone();
                let crd_api: Api<Validation> = Api::all(client_for_controller);
                controller_task = Some(tokio::spawn(async move {
                    Controller::new(crd_api, Default::default())
                        .run(reconcile, on_error, context_for_controller)
                        .for_each(|_res| async move {})
                        .await;
                }));
            }
        } else if let Some(task) = controller_task.take() {
            eprintln!("lost leadership; stopping Validation controller");
            task.abort();
        }
    }
}

struct ContextData {
    client: Client,
    #[cfg(feature = "metrics")]
    metrics: ControllerMetrics,
}

impl ContextData {
    fn new(client: Client) -> Self {
        ContextData {
            client,
            #[cfg(feature = "metrics")]
            metrics: ControllerMetrics::new("validate"),
        }
    }
}

async fn reconcile(instance: Arc<Validation>, context: Arc<ContextData>) -> Result<Action, Error> {
    let client = context.client.clone();
    let name = instance.name_any();
    let namespace = instance.namespace().unwrap_or_default();

    #[cfg(feature = "metrics")]
    context
        .metrics
        .reconcile_counter
        .with_label_values(&[&name, &namespace])
        .inc();
    #[cfg(feature = "metrics")]
    let start = std::time::Instant::now();

    let types_found = match actions::resolve_plugin_types(client.clone(), &instance).await {
        Ok(types) => types,
        Err(e) => {
            println!(
                "🔧 {}{}{}{}{}",
                namespace.color(FG2),
                "/".color(FG1),
                name.color(FG2),
                " ACTION: ".color(FG1),
                "Failed".color(FG2),
            );
            actions::fail(client, &instance, e.to_string()).await?;
            return Ok(Action::await_change());
        }
    };

    let plugins_installed = actions::plugins_ready(client.clone(), &types_found).await?;

    println!(
        "🔧 {}{}{}{}{}",
        namespace.color(FG2),
        "/".color(FG1),
        name.color(FG2),
        " ACTION: ".color(FG1),
        "Complete".color(FG2),
    );

    actions::complete(client, &instance, types_found, plugins_installed).await?;

    #[cfg(feature = "metrics")]
    context
        .metrics
        .read_histogram
        .with_label_values(&[&name, &namespace, "reconcile"])
        .observe(start.elapsed().as_secs_f64());
    #[cfg(feature = "metrics")]
    context
        .metrics
        .action_counter
        .with_label_values(&[&name, &namespace, "reconcile"])
        .inc();

    Ok(Action::await_change())
}

fn on_error(instance: Arc<Validation>, error: &Error, _context: Arc<ContextData>) -> Action {
    eprintln!(
        "{}",
        format!(
            "Validation reconciliation error on '{}': {:?}",
            instance.name_any(),
            error
        )
        .red()
    );
    Action::requeue(Duration::from_secs(5))
}

use futures::stream::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    Api, ResourceExt,
    api::ListParams,
    client::Client,
    runtime::{Controller, controller::Action},
};
use owo_colors::OwoColorize;
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use krang_types::MutationRequest;

use super::actions;
use crate::util::{
    Error,
    colors::{FG1, FG2},
};

#[cfg(feature = "metrics")]
use crate::util::metrics::ControllerMetrics;

/// Entrypoint for the Live Mutation controller. Runs on every node; each
/// node only acts on pods scheduled locally.
pub async fn run(client: Client, shutdown: CancellationToken) -> Result<(), Error> {
    println!("{}", "⚙️ Starting Live Mutation controller...".green());

    let context: Arc<ContextData> = Arc::new(ContextData::new(client.clone()));
    let api: Api<MutationRequest> = Api::all(client);

    Controller::new(api, Default::default())
        .run(reconcile, on_error, context)
        .take_until(shutdown.cancelled())
        .for_each(|_res| async move {})
        .await;

    Ok(())
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
            metrics: ControllerMetrics::new("mutate"),
        }
    }
}

fn node_name() -> Result<String, Error> {
    std::env::var("NODE_NAME").map_err(|_| Error::MissingEnv("NODE_NAME"))
}

/// Processes one pod, tolerating and logging any failure rather than
/// propagating it: per-pod errors must not stop other pods from being
/// mutated, and must not fail the MutationRequest reconcile (see design
/// notes — the request's status is never written either way).
async fn process_pod(pod: &Pod, instance: &MutationRequest) {
    let pod_name = pod.name_any();
    let pod_namespace = pod.namespace().unwrap_or_default();

    let Some(statuses) = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .filter(|cs| !cs.is_empty())
    else {
        return;
    };
    let container_id = &statuses[0].container_id;
    let Some(container_id) = container_id else {
        return;
    };

    let cached = match actions::find_cached_result(&pod_name, &pod_namespace) {
        Ok(Some(cached)) => cached,
        Ok(None) => {
            println!(
                "{}",
                format!("no CNI result cache entry found for pod '{pod_name}'").yellow()
            );
            return;
        }
        Err(e) => {
            eprintln!("{}", format!("reading CNI result cache for pod '{pod_name}': {e}").red());
            return;
        }
    };

    match actions::mutate_pod(
        container_id,
        &cached,
        &instance.spec.interface,
        &instance.spec.config,
    )
    .await
    {
        Ok(_) => println!("{}", format!("CNI ADD completed for pod '{pod_name}'").green()),
        Err(e) => eprintln!("{}", format!("CNI ADD failed for pod '{pod_name}': {e}").red()),
    }
}

async fn reconcile(
    instance: Arc<MutationRequest>,
    context: Arc<ContextData>,
) -> Result<Action, Error> {
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

    let node = node_name()?;
    let query = actions::selector_to_query(&instance.spec.pod_selector);
    let pods: Api<Pod> = Api::all(client);
    let list_params = ListParams::default().labels(&query);
    let matched = pods.list(&list_params).await?;

    let mut processed = 0usize;
    for pod in &matched.items {
        if pod.spec.as_ref().and_then(|s| s.node_name.as_deref()) != Some(node.as_str()) {
            continue;
        }
        process_pod(pod, &instance).await;
        processed += 1;
    }

    println!(
        "🔧 {}{}{}{}{}",
        namespace.color(FG2),
        "/".color(FG1),
        name.color(FG2),
        " matched local pods: ".color(FG1),
        processed.to_string().color(FG2),
    );

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

    // Fire-and-forget: no requeue, no status write (see design notes).
    Ok(Action::await_change())
}

fn on_error(instance: Arc<MutationRequest>, error: &Error, _context: Arc<ContextData>) -> Action {
    eprintln!(
        "{}",
        format!(
            "Live Mutation reconciliation error on '{}': {:?}",
            instance.name_any(),
            error
        )
        .red()
    );
    Action::requeue(Duration::from_secs(5))
}

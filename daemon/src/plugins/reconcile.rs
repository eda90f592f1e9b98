use futures::stream::StreamExt;
use kube::{
    Api, Resource, ResourceExt,
    client::Client,
    runtime::{Controller, controller::Action},
};
use owo_colors::OwoColorize;
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use krang_types::{PLUGIN_CLEANUP_FINALIZER, PluginPhase, PluginRegistration};

use super::actions;
use super::job;
use crate::util::{
    Error, JOB_POLL_INTERVAL, PROBE_INTERVAL,
    colors::{FG1, FG2},
};

#[cfg(feature = "metrics")]
use crate::util::metrics::ControllerMetrics;

/// Entrypoint for the Plugin Installer controller. Runs on every node; not
/// leader-elected, since it only ever acts on this node's own slice of
/// state.
pub async fn run(client: Client, shutdown: CancellationToken) -> Result<(), Error> {
    println!("{}", "⚙️ Starting Plugin Installer controller...".green());

    let context: Arc<ContextData> = Arc::new(ContextData::new(client.clone()));
    let api: Api<PluginRegistration> = Api::all(client);

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
            metrics: ControllerMetrics::new("plugins"),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
enum PluginAction {
    /// Another reconciler's cleanup already finalized; nothing to do.
    NoOp,
    /// Deletion requested, cleanup finalizer present.
    Finalize,
    CreateJob,
    AwaitJob,
    /// Job is complete; check the binary and converge status.
    Converge,
}

impl PluginAction {
    fn to_str(&self) -> &str {
        match self {
            PluginAction::NoOp => "NoOp",
            PluginAction::Finalize => "Finalize",
            PluginAction::CreateJob => "CreateJob",
            PluginAction::AwaitJob => "AwaitJob",
            PluginAction::Converge => "Converge",
        }
    }
}

fn node_name() -> Result<String, Error> {
    std::env::var("NODE_NAME").map_err(|_| Error::MissingEnv("NODE_NAME"))
}

async fn reconcile(
    instance: Arc<PluginRegistration>,
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

    // Step 2 of the algorithm (finalizer-add) is idempotent and unconditional
    // here, so a brand-new registration falls through to Job lookup/create
    // (steps 3-4) in this same reconcile instead of waiting on a second one.
    if instance.meta().deletion_timestamp.is_none() {
        actions::ensure_finalizer(client.clone(), &instance).await?;
    }

    let action = determine_action(client.clone(), &instance, &node).await?;

    println!(
        "🔧 {}{}{}{}{}",
        namespace.color(FG2),
        "/".color(FG1),
        name.color(FG2),
        " ACTION: ".color(FG1),
        action.to_str().color(FG2),
    );

    #[cfg(feature = "metrics")]
    context
        .metrics
        .read_histogram
        .with_label_values(&[&name, &namespace, action.to_str()])
        .observe(start.elapsed().as_secs_f64());
    #[cfg(feature = "metrics")]
    context
        .metrics
        .action_counter
        .with_label_values(&[&name, &namespace, action.to_str()])
        .inc();
    #[cfg(feature = "metrics")]
    let timer = (action != PluginAction::NoOp).then(|| {
        context
            .metrics
            .write_histogram
            .with_label_values(&[&name, &namespace, action.to_str()])
            .start_timer()
    });

    let result = match action {
        PluginAction::NoOp => Action::await_change(),
        PluginAction::Finalize => {
            actions::set_node_status(
                client.clone(),
                &instance,
                &node,
                PluginPhase::Removing,
                false,
                None,
            )
            .await?;
            actions::remove_binary(&instance)?;
            actions::remove_finalizer(client, &instance).await?;
            Action::await_change()
        }
        PluginAction::CreateJob => {
            actions::create_install_job(client.clone(), &instance, &node).await?;
            actions::set_node_status(
                client,
                &instance,
                &node,
                PluginPhase::Installing,
                false,
                None,
            )
            .await?;
            Action::requeue(JOB_POLL_INTERVAL)
        }
        PluginAction::AwaitJob => Action::requeue(JOB_POLL_INTERVAL),
        PluginAction::Converge => {
            let ready = std::path::Path::new(&job::installed_binary_path(&instance)).exists();
            actions::set_node_status(
                client,
                &instance,
                &node,
                if ready {
                    PluginPhase::Ready
                } else {
                    PluginPhase::Installing
                },
                ready,
                None,
            )
            .await?;
            Action::await_change()
        }
    };

    #[cfg(feature = "metrics")]
    if let Some(timer) = timer {
        timer.observe_duration();
    }

    Ok(result)
}

async fn determine_action(
    client: Client,
    instance: &PluginRegistration,
    node: &str,
) -> Result<PluginAction, Error> {
    if instance.meta().deletion_timestamp.is_some() {
        return Ok(if has_finalizer(instance) {
            PluginAction::Finalize
        } else {
            PluginAction::NoOp
        });
    }

    match actions::get_install_job(client, instance, node).await? {
        None => Ok(PluginAction::CreateJob),
        Some(job) if job::is_complete(&job) => Ok(PluginAction::Converge),
        Some(_) => Ok(PluginAction::AwaitJob),
    }
}

fn has_finalizer(instance: &PluginRegistration) -> bool {
    instance
        .finalizers()
        .iter()
        .any(|f| f == PLUGIN_CLEANUP_FINALIZER)
}

fn on_error(instance: Arc<PluginRegistration>, error: &Error, _context: Arc<ContextData>) -> Action {
    eprintln!(
        "{}",
        format!(
            "Plugin Installer reconciliation error on '{}': {:?}",
            instance.name_any(),
            error
        )
        .red()
    );
    Action::requeue(Duration::from_secs(5))
}

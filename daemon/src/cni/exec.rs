use std::path::Path;
use std::process::Stdio;

use serde_json::Value;
use tokio::io::{AsyncWriteExt, copy_buf};
use tokio::process::Command;

use super::conflist::ConfList;
use crate::util::Error;

/// Per-invocation runtime arguments passed to a CNI plugin via its
/// `CNI_*` environment variables.
#[derive(Clone, Debug)]
pub struct RuntimeConf {
    pub container_id: String,
    pub netns: String,
    pub ifname: String,
    pub args: Vec<(String, String)>,
}

fn encode_args(args: &[(String, String)]) -> String {
    args.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(";")
}

/// Executes every plugin in `conflist` in order against the same runtime
/// conf, feeding each plugin's result into the next as `prevResult`, and
/// returns the final plugin's result.
pub async fn add_network_list(
    conflist: &ConfList,
    rt: &RuntimeConf,
    cni_path: &str,
    cni_conf_dir: &str,
) -> Result<Value, Error> {
    let mut prev_result: Option<Value> = None;
    for index in 0..conflist.plugins.len() {
        let plugin_type = conflist.plugin_type(index)?.to_string();
        let config = conflist.plugin_config(index, prev_result.as_ref())?;
        let result = exec_plugin(cni_path, cni_conf_dir, &plugin_type, "ADD", rt, &config).await?;
        prev_result = Some(result);
    }
    prev_result.ok_or_else(|| Error::Cni("ConfList has no plugins".to_string()))
}

async fn exec_plugin(
    cni_path: &str,
    cni_conf_dir: &str,
    plugin_type: &str,
    command: &str,
    rt: &RuntimeConf,
    config: &Value,
) -> Result<Value, Error> {
    let plugin_bin = Path::new(cni_path).join(plugin_type);
    let stdin_bytes = serde_json::to_vec(config)?;

    let mut child = Command::new(&plugin_bin)
        .env("CNI_COMMAND", command)
        .env("CNI_CONTAINERID", &rt.container_id)
        .env("CNI_NETNS", &rt.netns)
        .env("CNI_IFNAME", &rt.ifname)
        .env("CNI_PATH", cni_path)
        .env("CNI_ARGS", encode_args(&rt.args))
        .env("NETCONFPATH", cni_conf_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| Error::Cni(format!("spawning {}: {e}", plugin_bin.display())))?;

    {
        let mut stdin = child.stdin.take().expect("stdin configured above");
        let mut bytes: &[u8] = &stdin_bytes;
        copy_buf(&mut bytes, &mut stdin)
            .await
            .map_err(|e| Error::Cni(format!("writing stdin to {plugin_type}: {e}")))?;
        stdin
            .shutdown()
            .await
            .map_err(|e| Error::Cni(format!("closing stdin to {plugin_type}: {e}")))?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| Error::Cni(format!("waiting on {plugin_type}: {e}")))?;

    if !output.status.success() {
        return Err(Error::Cni(format!(
            "plugin {plugin_type} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stdout)
        )));
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::Cni(format!("parsing {plugin_type} result: {e}")))
}

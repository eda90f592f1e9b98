use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The subset of a CNI result-cache file this system reads.
#[derive(Clone, Debug, Deserialize)]
pub struct CachedResult {
    pub netns: String,
    #[serde(rename = "ifName")]
    pub if_name: String,
}

/// Finds the first regular file under `dir` whose name ends with
/// `-<iface_suffix>` and whose contents contain both `pod_name` and
/// `pod_namespace` as substrings.
///
/// This is a heuristic, not a structural match: two pods with overlapping
/// names in overlapping namespaces can false-positive here. Preserved
/// intentionally — see the design notes on cache-file matching.
pub fn find_result_file(
    dir: &Path,
    iface_suffix: &str,
    pod_name: &str,
    pod_namespace: &str,
) -> std::io::Result<Option<PathBuf>> {
    let suffix = format!("-{iface_suffix}");
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.ends_with(&suffix) {
            continue;
        }
        let path = entry.path();
        let Ok(contents) = std::fs::read_to_string(&path) else {
            continue;
        };
        if contents.contains(pod_name) && contents.contains(pod_namespace) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

pub fn parse_cached_result(contents: &str) -> Result<CachedResult, serde_json::Error> {
    serde_json::from_str(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_matching_result_file_by_substring() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("multus-cni-network-deadbeef-eth0"),
            r#"{"netns":"/var/run/netns/fake","ifName":"eth0","pod":"mypod.default"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("unrelated-eth0"), "nothing relevant here").unwrap();

        let found = find_result_file(dir.path(), "eth0", "mypod", "default")
            .unwrap()
            .unwrap();
        assert_eq!(found.file_name().unwrap(), "multus-cni-network-deadbeef-eth0");
    }

    #[test]
    fn ignores_files_with_wrong_suffix() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("multus-cni-network-deadbeef-net1"),
            r#"{"netns":"/var/run/netns/fake","ifName":"net1","pod":"mypod.default"}"#,
        )
        .unwrap();

        assert!(
            find_result_file(dir.path(), "eth0", "mypod", "default")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn missing_directory_returns_none_not_error() {
        let missing = Path::new("/no/such/path/at/all");
        assert!(find_result_file(missing, "eth0", "mypod", "default").unwrap().is_none());
    }

    #[test]
    fn parses_cached_result_json() {
        let parsed =
            parse_cached_result(r#"{"netns":"/var/run/netns/fake","ifName":"eth0"}"#).unwrap();
        assert_eq!(parsed.netns, "/var/run/netns/fake");
        assert_eq!(parsed.if_name, "eth0");
    }
}

use krang_types::*;
use kube::CustomResourceExt;
use std::fs;

fn main() {
    let _ = fs::create_dir("../crds");
    fs::write(
        "../crds/k8s.cni.cncf.io_pluginregistrations_crd.yaml",
        serde_yaml::to_string(&PluginRegistration::crd()).unwrap(),
    )
    .unwrap();
    fs::write(
        "../crds/k8s.cni.cncf.io_mutationrequests_crd.yaml",
        serde_yaml::to_string(&MutationRequest::crd()).unwrap(),
    )
    .unwrap();
    fs::write(
        "../crds/k8s.cni.cncf.io_validations_crd.yaml",
        serde_yaml::to_string(&Validation::crd()).unwrap(),
    )
    .unwrap();
}

//! Prints the MyApp CustomResourceDefinition as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/myapp.yaml`

use crds::MyApp;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&MyApp::crd())?);
    Ok(())
}
